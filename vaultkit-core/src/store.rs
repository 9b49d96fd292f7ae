//! Protected key store orchestration.
//!
//! [`ProtectedKeyStore`] is the unit external callers use: one instance per
//! protection class, constructed over a platform [`SecureItemStore`]. It wires
//! the KEK and DEK managers into the envelope-encryption protocol:
//!
//! - [`import`] seals a secret under the DEK public key and stores it. No
//!   credential is required: writing is always possible once initialized;
//!   only reading requires proof of the gating credential.
//! - [`find`] authenticates against the KEK, unwraps the DEK private key for
//!   the duration of the call, opens the requested item, and discards the
//!   transient key material.
//! - [`change_password`] rotates the KEK and re-wraps the DEK private key.
//!   Stored item ciphertexts are never read or rewritten, so rotation cost is
//!   independent of the number of stored secrets.
//!
//! All operations on one instance are serialized by an internal mutex. A
//! biometry-gated authentication may block on a platform prompt, so callers
//! on a UI thread should dispatch these calls off it.
//!
//! [`import`]: ProtectedKeyStore::import
//! [`find`]: ProtectedKeyStore::find
//! [`change_password`]: ProtectedKeyStore::change_password

// Lock guards are held for whole operation bodies to serialize them.
#![allow(clippy::significant_drop_tightening)]

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;
use zeroize::Zeroizing;

use crate::{
    crypto::PUBLIC_KEY_SIZE,
    dek::{self, DekManager},
    error::{KeyStoreError, KeyStoreResult},
    item_store::{AccessControlledKey, SecureItemStore},
    kek::KekManager,
    types::{AccessPolicy, DataId, ProtectionClass},
};

/// Credential-gated secret store scoped to one protection class.
///
/// Secrets are encrypted directly under a software data-encryption key (DEK)
/// whose private half is persisted only in wrapped form, sealed under a
/// credential-gated key-encrypting key (KEK) held by the secure item store.
/// Two stores over the same item store but different protection classes share
/// no key material and cannot read or affect each other's state.
pub struct ProtectedKeyStore<S: SecureItemStore> {
    item_store: Arc<S>,
    protection_class: ProtectionClass,
    kek: KekManager<S>,
    dek: DekManager<S>,
    item_namespace: String,
    lock: Mutex<()>,
}

impl<S: SecureItemStore> ProtectedKeyStore<S> {
    /// Creates a store scoped to `protection_class`.
    ///
    /// Construction is cheap and touches no storage; the hierarchy is created
    /// by [`initialize_key_store`](Self::initialize_key_store).
    #[must_use]
    pub fn new(item_store: Arc<S>, protection_class: ProtectionClass) -> Self {
        Self {
            kek: KekManager::new(Arc::clone(&item_store), protection_class),
            dek: DekManager::new(Arc::clone(&item_store), protection_class),
            item_namespace: protection_class.item_namespace(),
            item_store,
            protection_class,
            lock: Mutex::new(()),
        }
    }

    /// The protection class this store is scoped to.
    #[must_use]
    pub const fn protection_class(&self) -> ProtectionClass {
        self.protection_class
    }

    /// Returns whether a key hierarchy exists for this protection class:
    /// both the wrapped data key and the clear DEK public key are present.
    ///
    /// No side effects, no authentication. A store that cannot be read (or a
    /// poisoned lock) reads as not initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        let Ok(_guard) = self.lock.lock() else {
            return false;
        };
        self.dek.exists().unwrap_or(false)
    }

    /// Creates the key hierarchy for this protection class: a KEK with no
    /// credential requirement, a fresh DEK pair, and the wrapped data key.
    ///
    /// The initial KEK carries [`AccessPolicy::None`]; a credential is added
    /// afterwards with [`change_password`](Self::change_password).
    ///
    /// # Errors
    ///
    /// Returns an `AlreadyInitialized` error if a hierarchy already exists
    /// (re-initialization is an explicit caller error, not a no-op) and a
    /// `KeyGenerationFailure` error if the underlying key creation fails.
    pub fn initialize_key_store(&self) -> KeyStoreResult<()> {
        let _guard = self.guard()?;
        if self.dek.exists()? {
            return Err(KeyStoreError::AlreadyInitialized);
        }

        let kek = self.kek.create(AccessPolicy::None, None)?;
        let data_key = self.dek.generate()?;
        self.dek.persist(&data_key, &kek.public_key())?;

        info!(protection_class = %self.protection_class, "key store initialized");
        Ok(())
    }

    /// Encrypts `secret` under the current DEK public key and stores it at
    /// `id`, fully replacing any existing item there.
    ///
    /// Requires no authentication: encryption needs only the clear public
    /// key. Reading the secret back is what requires the credential.
    ///
    /// # Errors
    ///
    /// Returns a `NotInitialized` error if no key hierarchy exists, a
    /// `ProtectionClassMismatch` error if `id` is scoped to another class,
    /// and a `StorageFailure` error if the write fails.
    pub fn import(&self, id: &DataId, secret: &[u8]) -> KeyStoreResult<()> {
        self.check_class(id)?;
        let _guard = self.guard()?;

        let dek_public = self.require_dek_public()?;
        let ciphertext = dek::encrypt_secret(&dek_public, secret)?;
        self.item_store
            .put_blob(&self.item_namespace, &id.id, &ciphertext)
    }

    /// Returns the decrypted secret stored at `id`, or `None` if no item
    /// exists there.
    ///
    /// Absence is answered before any credential check, so callers can tell
    /// "no such secret" from "wrong credential". When the item exists, the
    /// KEK is authenticated with `password` (and the platform biometric
    /// prompt, if the access policy requires it), the DEK private key is
    /// unwrapped for the duration of this call, and the item is opened.
    ///
    /// # Errors
    ///
    /// Returns a `NotInitialized` error if no key hierarchy exists, an
    /// `AuthenticationFailure` error if the credential does not satisfy the
    /// KEK's access policy, and a `DecryptionFailure` or `CorruptedData`
    /// error if a stored blob does not open under an authenticated key.
    pub fn find(
        &self,
        id: &DataId,
        password: Option<&str>,
    ) -> KeyStoreResult<Option<Zeroizing<Vec<u8>>>> {
        self.check_class(id)?;
        let _guard = self.guard()?;

        if !self.dek.exists()? {
            return Err(KeyStoreError::NotInitialized);
        }
        let Some(ciphertext) = self.item_store.find_blob(&self.item_namespace, &id.id)? else {
            return Ok(None);
        };

        let kek = self.kek.authenticate(password)?;
        let data_key = self.dek.unwrap_with(&kek)?;
        let plaintext = dek::decrypt_secret(&data_key, &ciphertext)?;
        Ok(Some(plaintext))
    }

    /// Rotates the KEK: authenticates with `from`, then replaces the KEK
    /// with a fresh one whose access policy is derived from `(to,
    /// use_biometry)` and re-wraps the same DEK private key under it.
    ///
    /// `from` must be `None` if the current KEK has no password requirement.
    /// Stored items are untouched; their ciphertexts remain byte-for-byte
    /// identical across any number of rotations.
    ///
    /// On authentication failure every object is left unchanged. The
    /// delete-then-create replacement runs under the instance lock, so no
    /// concurrent operation can observe the window between the old KEK
    /// disappearing and the new wrap landing.
    ///
    /// # Errors
    ///
    /// Returns a `NotInitialized` error if no key hierarchy exists, an
    /// `AuthenticationFailure` error if `from` does not satisfy the current
    /// access policy, and a `KeyGenerationFailure` error if the replacement
    /// KEK cannot be created.
    pub fn change_password(
        &self,
        from: Option<&str>,
        to: Option<&str>,
        use_biometry: bool,
    ) -> KeyStoreResult<()> {
        let _guard = self.guard()?;

        if !self.dek.exists()? {
            return Err(KeyStoreError::NotInitialized);
        }
        let old_kek = self.kek.authenticate(from)?;
        let data_key = self.dek.unwrap_with(&old_kek)?;

        // Nothing above this point mutates state.
        self.kek.delete()?;
        let policy = AccessPolicy::for_credentials(to, use_biometry);
        let new_kek = self.kek.create(policy, to)?;
        self.dek.rewrap(&data_key, &new_kek.public_key())?;

        info!(protection_class = %self.protection_class, ?policy, "key-encrypting key rotated");
        Ok(())
    }

    /// Removes the KEK, the wrapped data key, the DEK public key, and every
    /// stored item in this protection class, resetting the store to
    /// uninitialized.
    ///
    /// Items are deleted along with the key material: without their DEK they
    /// are permanently undecryptable, and leaving them behind would only
    /// leak ciphertext volume. Deleting an uninitialized store is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if a delete fails.
    pub fn delete_all_keys(&self) -> KeyStoreResult<()> {
        let _guard = self.guard()?;

        self.kek.delete()?;
        self.dek.delete()?;
        self.item_store.delete_blob_namespace(&self.item_namespace)?;

        info!(protection_class = %self.protection_class, "key hierarchy deleted");
        Ok(())
    }

    fn guard(&self) -> KeyStoreResult<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| KeyStoreError::lock("key store mutex poisoned"))
    }

    fn check_class(&self, id: &DataId) -> KeyStoreResult<()> {
        if id.protection_class == self.protection_class {
            Ok(())
        } else {
            Err(KeyStoreError::ProtectionClassMismatch {
                expected: self.protection_class,
                found: id.protection_class,
            })
        }
    }

    fn require_dek_public(&self) -> KeyStoreResult<[u8; PUBLIC_KEY_SIZE]> {
        if !self.dek.exists()? {
            return Err(KeyStoreError::NotInitialized);
        }
        self.dek
            .public_key()?
            .ok_or(KeyStoreError::NotInitialized)
    }
}
