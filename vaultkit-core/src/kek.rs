//! Key-encrypting-key management.
//!
//! The KEK is the credential-gated asymmetric key at the top of a protection
//! class's hierarchy. Its private half lives inside the secure item store
//! (hardware-backed where the platform offers it) and is only ever exercised
//! through an [`AccessControlledKey`] handle, never as raw bytes.

use std::sync::Arc;

use crate::{
    error::{KeyStoreError, KeyStoreResult},
    item_store::SecureItemStore,
    types::{AccessPolicy, ProtectionClass},
};

/// Creates, locates, authenticates, and deletes the access-controlled KEK of
/// one protection class.
pub struct KekManager<S: SecureItemStore> {
    item_store: Arc<S>,
    namespace: String,
}

impl<S: SecureItemStore> KekManager<S> {
    /// Creates a manager scoped to `protection_class`.
    #[must_use]
    pub fn new(item_store: Arc<S>, protection_class: ProtectionClass) -> Self {
        Self {
            item_store,
            namespace: protection_class.kek_namespace(),
        }
    }

    /// Creates a fresh KEK gated by `policy`, replacing any existing one.
    ///
    /// # Errors
    ///
    /// Returns a `KeyGenerationFailure` error if the underlying store cannot
    /// create the key.
    pub fn create(
        &self,
        policy: AccessPolicy,
        password: Option<&str>,
    ) -> KeyStoreResult<S::KeyHandle> {
        self.item_store
            .create_access_controlled_key(&self.namespace, policy, password)
            .map_err(|err| match err {
                KeyStoreError::StorageFailure(context) => {
                    KeyStoreError::KeyGenerationFailure(context)
                }
                other => other,
            })
    }

    /// Authenticates against the current KEK and returns a usable handle.
    ///
    /// All-or-nothing: a credential that does not satisfy the KEK's access
    /// policy grants nothing.
    ///
    /// # Errors
    ///
    /// Returns an `AuthenticationFailure` error on a credential/policy
    /// mismatch and a `CorruptedData` error if the KEK is missing while the
    /// rest of the hierarchy exists.
    pub fn authenticate(&self, password: Option<&str>) -> KeyStoreResult<S::KeyHandle> {
        self.item_store
            .find_access_controlled_key(&self.namespace, password)?
            .ok_or_else(|| KeyStoreError::corrupted("key-encrypting key missing"))
    }

    /// Deletes the current KEK. Deleting an absent KEK is not an error.
    ///
    /// # Errors
    ///
    /// Returns a `StorageFailure` error if the delete fails.
    pub fn delete(&self) -> KeyStoreResult<()> {
        self.item_store.delete_access_controlled_key(&self.namespace)
    }
}
