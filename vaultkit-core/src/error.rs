//! Error types for the protected key store.

use thiserror::Error;

use crate::types::ProtectionClass;

/// Result type for key store operations.
pub type KeyStoreResult<T> = Result<T, KeyStoreError>;

/// Errors raised by the protected key store and its collaborators.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// An operation requiring key material ran before `initialize_key_store`.
    #[error("key store is not initialized")]
    NotInitialized,

    /// `initialize_key_store` ran on a store that already holds a key hierarchy.
    #[error("key store is already initialized")]
    AlreadyInitialized,

    /// The underlying hardware or software key creation failed.
    #[error("key generation failed: {0}")]
    KeyGenerationFailure(String),

    /// The supplied password/biometry did not satisfy the KEK's access policy.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// A wrap blob or secret ciphertext failed to decrypt after successful
    /// authentication.
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),

    /// Stored data is structurally invalid.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// A secure item store primitive itself failed.
    #[error("secure item store failure: {0}")]
    StorageFailure(String),

    /// Serialization/deserialization failures.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unsupported wrapped-key envelope version.
    #[error("unsupported envelope version: {0}")]
    UnsupportedEnvelopeVersion(u32),

    /// A `DataId` was addressed to a store scoped to a different protection
    /// class.
    #[error("protection class mismatch: store is scoped to {expected}, got {found}")]
    ProtectionClassMismatch {
        /// The class this store instance is scoped to.
        expected: ProtectionClass,
        /// The class carried by the offending `DataId`.
        found: ProtectionClass,
    },

    /// Failed to acquire the per-instance serialization lock.
    #[error("lock error: {0}")]
    Lock(String),
}

impl KeyStoreError {
    /// Creates a key generation error.
    pub fn key_generation<S: Into<String>>(context: S) -> Self {
        Self::KeyGenerationFailure(context.into())
    }

    /// Creates a decryption error.
    pub fn decryption<S: Into<String>>(context: S) -> Self {
        Self::DecryptionFailure(context.into())
    }

    /// Creates a corrupted data error.
    pub fn corrupted<S: Into<String>>(context: S) -> Self {
        Self::CorruptedData(context.into())
    }

    /// Creates a secure item store error.
    pub fn storage<S: Into<String>>(context: S) -> Self {
        Self::StorageFailure(context.into())
    }

    /// Creates a serialization error.
    pub fn serialization<S: Into<String>>(context: S) -> Self {
        Self::Serialization(context.into())
    }

    /// Creates a lock error.
    pub fn lock<S: Into<String>>(context: S) -> Self {
        Self::Lock(context.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KeyStoreError::NotInitialized;
        assert_eq!(format!("{err}"), "key store is not initialized");

        let err = KeyStoreError::key_generation("enclave unavailable");
        assert!(format!("{err}").contains("enclave unavailable"));

        let err = KeyStoreError::ProtectionClassMismatch {
            expected: ProtectionClass::Sensitive,
            found: ProtectionClass::Data,
        };
        assert!(format!("{err}").contains("sensitive"));
        assert!(format!("{err}").contains("data"));
    }
}
