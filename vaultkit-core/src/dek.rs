//! Data-encryption-key management.
//!
//! The DEK is the software asymmetric key pair that directly encrypts
//! individual secrets. Its public half is persisted in clear; its private
//! half is persisted only inside [`WrappedDataKey`], sealed under the KEK
//! public key, and exists in plaintext only transiently in memory while a
//! lookup or rotation is in flight.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::{
    crypto::{self, EncryptionKeyPair, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    error::{KeyStoreError, KeyStoreResult},
    item_store::{AccessControlledKey, SecureItemStore},
    types::ProtectionClass,
};

/// Domain label for the DEK private key sealed under a KEK public key.
const DATA_KEY_WRAP_LABEL: &[u8] = b"vaultkit:data-key-wrap";

/// Domain label for secret bytes sealed under the DEK public key.
const SECRET_ITEM_LABEL: &[u8] = b"vaultkit:secret-item";

/// Blob account under which the wrapped data key is stored.
const DATA_KEY_ACCOUNT: &str = "data-key";

const WRAPPED_KEY_VERSION: u32 = 1;

/// The DEK private key in its persisted form: sealed under the KEK public
/// key. Exactly one exists per protection class.
#[derive(Clone, Serialize, Deserialize)]
pub struct WrappedDataKey {
    version: u32,
    sealed_secret_key: Vec<u8>,
}

impl WrappedDataKey {
    const fn new(sealed_secret_key: Vec<u8>) -> Self {
        Self {
            version: WRAPPED_KEY_VERSION,
            sealed_secret_key,
        }
    }

    /// Encodes the envelope as CBOR.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if encoding fails.
    pub fn serialize(&self) -> KeyStoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::ser::into_writer(self, &mut bytes)
            .map_err(|err| KeyStoreError::serialization(err.to_string()))?;
        Ok(bytes)
    }

    /// Decodes a CBOR envelope.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if decoding fails and an
    /// `UnsupportedEnvelopeVersion` error on a version mismatch.
    pub fn deserialize(bytes: &[u8]) -> KeyStoreResult<Self> {
        let wrapped: Self = ciborium::de::from_reader(bytes)
            .map_err(|err| KeyStoreError::serialization(err.to_string()))?;
        if wrapped.version != WRAPPED_KEY_VERSION {
            return Err(KeyStoreError::UnsupportedEnvelopeVersion(wrapped.version));
        }
        Ok(wrapped)
    }
}

/// Manages the DEK of one protection class: generation, wrap/unwrap under the
/// KEK, persistence, and the per-secret encrypt/decrypt operations.
pub struct DekManager<S: SecureItemStore> {
    item_store: Arc<S>,
    data_key_namespace: String,
    public_key_namespace: String,
}

impl<S: SecureItemStore> DekManager<S> {
    /// Creates a manager scoped to `protection_class`.
    #[must_use]
    pub fn new(item_store: Arc<S>, protection_class: ProtectionClass) -> Self {
        Self {
            item_store,
            data_key_namespace: protection_class.data_key_namespace(),
            public_key_namespace: protection_class.public_key_namespace(),
        }
    }

    /// Generates a fresh software DEK pair. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns a `KeyGenerationFailure` error if generation fails.
    pub fn generate(&self) -> KeyStoreResult<EncryptionKeyPair> {
        self.item_store.generate_key_pair()
    }

    /// Returns whether both halves of the persisted DEK exist: the wrapped
    /// private key blob and the clear public key.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the store cannot be read.
    pub fn exists(&self) -> KeyStoreResult<bool> {
        let wrapped = self
            .item_store
            .find_blob(&self.data_key_namespace, DATA_KEY_ACCOUNT)?
            .is_some();
        let public = self
            .item_store
            .find_public_key(&self.public_key_namespace)?
            .is_some();
        Ok(wrapped && public)
    }

    /// Persists both halves of `dek`: the private key wrapped under
    /// `kek_public`, the public key in clear.
    ///
    /// # Errors
    ///
    /// Returns a `KeyGenerationFailure` error if wrapping fails and a
    /// `StorageFailure` error if persistence fails.
    pub fn persist(
        &self,
        dek: &EncryptionKeyPair,
        kek_public: &[u8; PUBLIC_KEY_SIZE],
    ) -> KeyStoreResult<()> {
        self.rewrap(dek, kek_public)?;
        self.item_store
            .put_public_key(&self.public_key_namespace, dek.public_key())
    }

    /// Re-seals the DEK private key under a new KEK public key, overwriting
    /// the wrapped blob. The clear public key is left untouched.
    ///
    /// # Errors
    ///
    /// Returns a `KeyGenerationFailure` error if wrapping fails and a
    /// `StorageFailure` error if persistence fails.
    pub fn rewrap(
        &self,
        dek: &EncryptionKeyPair,
        kek_public: &[u8; PUBLIC_KEY_SIZE],
    ) -> KeyStoreResult<()> {
        let sealed = crypto::seal(kek_public, DATA_KEY_WRAP_LABEL, dek.secret_key())?;
        let bytes = WrappedDataKey::new(sealed).serialize()?;
        self.item_store
            .put_blob(&self.data_key_namespace, DATA_KEY_ACCOUNT, &bytes)
    }

    /// Loads the wrapped blob and recovers the DEK pair through one
    /// authenticated decrypt on the KEK handle.
    ///
    /// # Errors
    ///
    /// Returns a `NotInitialized` error if no wrapped blob exists, a
    /// `DecryptionFailure` or `CorruptedData` error if it does not open
    /// cleanly, and an `UnsupportedEnvelopeVersion` error on a version
    /// mismatch.
    pub fn unwrap_with(&self, kek: &S::KeyHandle) -> KeyStoreResult<EncryptionKeyPair> {
        let bytes = self
            .item_store
            .find_blob(&self.data_key_namespace, DATA_KEY_ACCOUNT)?
            .ok_or(KeyStoreError::NotInitialized)?;
        let wrapped = WrappedDataKey::deserialize(&bytes)?;

        let secret_bytes = kek.decrypt(DATA_KEY_WRAP_LABEL, &wrapped.sealed_secret_key)?;
        let secret = parse_secret_key(&secret_bytes)?;
        Ok(EncryptionKeyPair::from_secret(secret))
    }

    /// Returns the persisted DEK public key, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the store cannot be read.
    pub fn public_key(&self) -> KeyStoreResult<Option<[u8; PUBLIC_KEY_SIZE]>> {
        self.item_store.find_public_key(&self.public_key_namespace)
    }

    /// Deletes the wrapped blob and the clear public key. Deleting an absent
    /// DEK is not an error.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if a delete fails.
    pub fn delete(&self) -> KeyStoreResult<()> {
        self.item_store
            .delete_blob(&self.data_key_namespace, DATA_KEY_ACCOUNT)?;
        self.item_store.delete_public_key(&self.public_key_namespace)
    }
}

/// Encrypts one secret under the DEK public key.
///
/// # Errors
///
/// Returns a `KeyGenerationFailure` error if sealing fails.
pub fn encrypt_secret(
    dek_public: &[u8; PUBLIC_KEY_SIZE],
    secret: &[u8],
) -> KeyStoreResult<Vec<u8>> {
    crypto::seal(dek_public, SECRET_ITEM_LABEL, secret)
}

/// Decrypts one secret ciphertext with the transient DEK pair.
///
/// # Errors
///
/// Returns a `DecryptionFailure` or `CorruptedData` error if the ciphertext
/// does not open under the DEK.
pub fn decrypt_secret(
    dek: &EncryptionKeyPair,
    ciphertext: &[u8],
) -> KeyStoreResult<Zeroizing<Vec<u8>>> {
    crypto::open(dek.secret_key(), SECRET_ITEM_LABEL, ciphertext)
}

fn parse_secret_key(bytes: &[u8]) -> KeyStoreResult<[u8; SECRET_KEY_SIZE]> {
    if bytes.len() != SECRET_KEY_SIZE {
        return Err(KeyStoreError::corrupted(format!(
            "unwrapped data key length mismatch: expected {SECRET_KEY_SIZE}, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; SECRET_KEY_SIZE];
    out.copy_from_slice(bytes);
    Ok(out)
}
