//! Platform secure storage abstraction.
//!
//! The protected key store treats the platform's secure storage facility as an
//! external collaborator: a key/blob store that can create, find, and delete
//! typed security objects, some of which are backed by tamper-resistant
//! hardware. Each platform (iOS, Android, desktop) provides an implementation
//! of [`SecureItemStore`]:
//!
//! - iOS: Keychain Services, with Secure Enclave keys for the
//!   access-controlled kind
//! - Android: Android Keystore with hardware-backed keys
//! - Desktop/server: a file- or keyring-backed store (reduced security
//!   guarantee; no tamper-resistant hardware)
//!
//! An in-memory implementation, [`MemorySecureItemStore`], is provided for
//! tests.

pub mod memory;

pub use memory::{BiometricOutcome, MemorySecureItemStore};

use zeroize::Zeroizing;

use crate::{
    crypto::{EncryptionKeyPair, PUBLIC_KEY_SIZE},
    error::KeyStoreResult,
    types::AccessPolicy,
};

/// An opaque handle to an access-controlled private key.
///
/// Obtained from [`SecureItemStore::create_access_controlled_key`] or
/// [`SecureItemStore::find_access_controlled_key`] after the key's access
/// policy has been satisfied. The private key itself never leaves the store
/// implementation; the handle only exposes authenticated decryption.
pub trait AccessControlledKey {
    /// Returns the public half of the key pair.
    fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE];

    /// Decrypts a sealed envelope with the access-controlled private key.
    ///
    /// `label` must match the domain label the envelope was sealed with.
    ///
    /// # Errors
    ///
    /// Returns a `DecryptionFailure` or `CorruptedData` error if the envelope
    /// does not open under this key and label.
    fn decrypt(&self, label: &[u8], sealed: &[u8]) -> KeyStoreResult<Zeroizing<Vec<u8>>>;
}

/// Typed security-object storage provided by the platform.
///
/// Four object kinds are exposed: opaque named blobs, software asymmetric key
/// pairs, raw public keys, and access-controlled asymmetric keys whose private
/// part is usable only after satisfying an [`AccessPolicy`]. Blobs and keys
/// are addressed by namespace (and, for blobs, an account within the
/// namespace); a `put`/`create` at an occupied address overwrites.
///
/// # Security Requirements
///
/// - Access-controlled private keys MUST be non-exportable; implementations
///   return only an [`AccessControlledKey`] handle, and only after the stored
///   policy is satisfied (all-or-nothing: a wrong credential grants nothing).
/// - A user dismissing a platform biometric prompt MUST surface as an
///   `AuthenticationFailure` error, not block indefinitely.
/// - Implementations MUST be safe to call from multiple threads.
pub trait SecureItemStore: Send + Sync {
    /// Handle type for access-controlled keys.
    type KeyHandle: AccessControlledKey;

    /// Stores a blob at `namespace`/`account`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the write fails.
    fn put_blob(&self, namespace: &str, account: &str, bytes: &[u8]) -> KeyStoreResult<()>;

    /// Returns the blob at `namespace`/`account`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the read fails.
    fn find_blob(&self, namespace: &str, account: &str) -> KeyStoreResult<Option<Vec<u8>>>;

    /// Deletes the blob at `namespace`/`account`. Deleting an absent blob is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the delete fails.
    fn delete_blob(&self, namespace: &str, account: &str) -> KeyStoreResult<()>;

    /// Deletes every blob in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the delete fails.
    fn delete_blob_namespace(&self, namespace: &str) -> KeyStoreResult<()>;

    /// Generates a software asymmetric key pair.
    ///
    /// The private half is returned in-process and nothing is persisted;
    /// persistence (in wrapped form) is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns a `KeyGenerationFailure` error if key generation fails.
    fn generate_key_pair(&self) -> KeyStoreResult<EncryptionKeyPair>;

    /// Stores a raw public key at `namespace`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the write fails.
    fn put_public_key(
        &self,
        namespace: &str,
        public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> KeyStoreResult<()>;

    /// Returns the raw public key at `namespace`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the read fails.
    fn find_public_key(&self, namespace: &str) -> KeyStoreResult<Option<[u8; PUBLIC_KEY_SIZE]>>;

    /// Deletes the raw public key at `namespace`. Deleting an absent key is
    /// not an error.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the delete fails.
    fn delete_public_key(&self, namespace: &str) -> KeyStoreResult<()>;

    /// Creates an access-controlled key pair at `namespace` gated by
    /// `policy`, replacing any existing key there.
    ///
    /// `password` seeds the credential verifier when the policy requires a
    /// password and must be `None` otherwise.
    ///
    /// # Errors
    ///
    /// Returns a `KeyGenerationFailure` error if the key cannot be created
    /// (hardware unavailable, policy/credential mismatch) and a
    /// `StorageFailure` error if persisting it fails.
    fn create_access_controlled_key(
        &self,
        namespace: &str,
        policy: AccessPolicy,
        password: Option<&str>,
    ) -> KeyStoreResult<Self::KeyHandle>;

    /// Authenticates against the access-controlled key at `namespace` and
    /// returns a handle to it, or `None` if no key exists there.
    ///
    /// # Errors
    ///
    /// Returns an `AuthenticationFailure` error if the supplied credential
    /// does not satisfy the stored policy, including a denied or dismissed
    /// biometric prompt.
    fn find_access_controlled_key(
        &self,
        namespace: &str,
        password: Option<&str>,
    ) -> KeyStoreResult<Option<Self::KeyHandle>>;

    /// Deletes the access-controlled key at `namespace`. Deleting an absent
    /// key is not an error.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the delete fails.
    fn delete_access_controlled_key(&self, namespace: &str) -> KeyStoreResult<()>;
}
