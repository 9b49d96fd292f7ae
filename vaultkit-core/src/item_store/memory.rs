//! In-memory secure item store for testing.
//!
//! This implementation is NOT secure for production use. Key material lives
//! in process memory and the "hardware" access-controlled keys are ordinary
//! software keys behind a password verifier. It is designed for unit and
//! integration testing of the protected key store.

// Allow certain clippy lints for test-only code
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::sync::RwLock;

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{
    crypto::{self, EncryptionKeyPair, PUBLIC_KEY_SIZE},
    error::{KeyStoreError, KeyStoreResult},
    types::AccessPolicy,
};

use super::{AccessControlledKey, SecureItemStore};

const SALT_SIZE: usize = 16;

/// Simulated outcome of the platform biometric prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BiometricOutcome {
    /// The user passes the biometric check.
    #[default]
    Approve,
    /// The user fails or dismisses the biometric prompt.
    Deny,
}

/// Salted password verifier. Holds a digest, never the password itself.
struct PasswordVerifier {
    salt: [u8; SALT_SIZE],
    digest: [u8; 32],
}

impl PasswordVerifier {
    fn new(password: &str) -> Self {
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        Self {
            digest: digest_password(&salt, password),
            salt,
        }
    }

    fn verify(&self, password: &str) -> bool {
        let candidate = digest_password(&self.salt, password);
        candidate.ct_eq(&self.digest).into()
    }
}

fn digest_password(salt: &[u8; SALT_SIZE], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

/// An access-controlled key record: the key material plus its gate.
struct StoredAccessKey {
    key_pair: EncryptionKeyPair,
    policy: AccessPolicy,
    verifier: Option<PasswordVerifier>,
}

/// Handle to an access-controlled key after successful authentication.
pub struct MemoryKeyHandle {
    key_pair: EncryptionKeyPair,
}

impl AccessControlledKey for MemoryKeyHandle {
    fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        *self.key_pair.public_key()
    }

    fn decrypt(&self, label: &[u8], sealed: &[u8]) -> KeyStoreResult<Zeroizing<Vec<u8>>> {
        crypto::open(self.key_pair.secret_key(), label, sealed)
    }
}

/// In-memory [`SecureItemStore`] backed by `RwLock`-protected hash maps.
///
/// **FOR TESTING ONLY.** Password gates use salted SHA-256 verifiers compared
/// in constant time; the biometric factor is simulated by a configurable
/// [`BiometricOutcome`]. Blobs are readable through [`find_blob`] like any
/// other implementation, which lets tests assert stored ciphertext bytes
/// directly.
///
/// [`find_blob`]: SecureItemStore::find_blob
#[derive(Default)]
pub struct MemorySecureItemStore {
    /// Blobs keyed by (namespace, account).
    blobs: RwLock<HashMap<(String, String), Vec<u8>>>,
    /// Raw public keys keyed by namespace.
    public_keys: RwLock<HashMap<String, [u8; PUBLIC_KEY_SIZE]>>,
    /// Access-controlled keys keyed by namespace.
    access_keys: RwLock<HashMap<String, StoredAccessKey>>,
    /// What the simulated biometric prompt will answer.
    biometric_outcome: RwLock<BiometricOutcome>,
}

impl MemorySecureItemStore {
    /// Creates a new empty store. The biometric prompt defaults to
    /// [`BiometricOutcome::Approve`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the outcome of subsequent simulated biometric prompts.
    pub fn set_biometric_outcome(&self, outcome: BiometricOutcome) {
        *self.biometric_outcome.write().unwrap() = outcome;
    }

    /// Returns the accounts holding a blob in `namespace`.
    #[must_use]
    pub fn blob_accounts(&self, namespace: &str) -> Vec<String> {
        self.blobs
            .read()
            .unwrap()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, account)| account.clone())
            .collect()
    }

    fn check_policy(&self, key: &StoredAccessKey, password: Option<&str>) -> KeyStoreResult<()> {
        // All-or-nothing: the supplied credential must match the stored
        // policy exactly. A password where none is expected fails too.
        match (&key.verifier, password) {
            (Some(verifier), Some(password)) if verifier.verify(password) => {}
            (None, None) => {}
            _ => return Err(KeyStoreError::AuthenticationFailure),
        }

        if key.policy.requires_biometry()
            && *self.biometric_outcome.read().unwrap() == BiometricOutcome::Deny
        {
            return Err(KeyStoreError::AuthenticationFailure);
        }

        Ok(())
    }
}

impl SecureItemStore for MemorySecureItemStore {
    type KeyHandle = MemoryKeyHandle;

    fn put_blob(&self, namespace: &str, account: &str, bytes: &[u8]) -> KeyStoreResult<()> {
        self.blobs
            .write()
            .unwrap()
            .insert((namespace.to_string(), account.to_string()), bytes.to_vec());
        Ok(())
    }

    fn find_blob(&self, namespace: &str, account: &str) -> KeyStoreResult<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .read()
            .unwrap()
            .get(&(namespace.to_string(), account.to_string()))
            .cloned())
    }

    fn delete_blob(&self, namespace: &str, account: &str) -> KeyStoreResult<()> {
        self.blobs
            .write()
            .unwrap()
            .remove(&(namespace.to_string(), account.to_string()));
        Ok(())
    }

    fn delete_blob_namespace(&self, namespace: &str) -> KeyStoreResult<()> {
        self.blobs
            .write()
            .unwrap()
            .retain(|(ns, _), _| ns != namespace);
        Ok(())
    }

    fn generate_key_pair(&self) -> KeyStoreResult<EncryptionKeyPair> {
        Ok(EncryptionKeyPair::generate())
    }

    fn put_public_key(
        &self,
        namespace: &str,
        public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> KeyStoreResult<()> {
        self.public_keys
            .write()
            .unwrap()
            .insert(namespace.to_string(), *public_key);
        Ok(())
    }

    fn find_public_key(&self, namespace: &str) -> KeyStoreResult<Option<[u8; PUBLIC_KEY_SIZE]>> {
        Ok(self.public_keys.read().unwrap().get(namespace).copied())
    }

    fn delete_public_key(&self, namespace: &str) -> KeyStoreResult<()> {
        self.public_keys.write().unwrap().remove(namespace);
        Ok(())
    }

    fn create_access_controlled_key(
        &self,
        namespace: &str,
        policy: AccessPolicy,
        password: Option<&str>,
    ) -> KeyStoreResult<Self::KeyHandle> {
        if policy.requires_password() != password.is_some() {
            return Err(KeyStoreError::key_generation(
                "access policy and supplied credential disagree",
            ));
        }

        let key_pair = EncryptionKeyPair::generate();
        let stored = StoredAccessKey {
            key_pair: key_pair.clone(),
            policy,
            verifier: password.map(PasswordVerifier::new),
        };
        self.access_keys
            .write()
            .unwrap()
            .insert(namespace.to_string(), stored);

        Ok(MemoryKeyHandle { key_pair })
    }

    fn find_access_controlled_key(
        &self,
        namespace: &str,
        password: Option<&str>,
    ) -> KeyStoreResult<Option<Self::KeyHandle>> {
        let keys = self.access_keys.read().unwrap();
        let Some(stored) = keys.get(namespace) else {
            return Ok(None);
        };

        self.check_policy(stored, password)?;

        Ok(Some(MemoryKeyHandle {
            key_pair: stored.key_pair.clone(),
        }))
    }

    fn delete_access_controlled_key(&self, namespace: &str) -> KeyStoreResult<()> {
        self.access_keys.write().unwrap().remove(namespace);
        Ok(())
    }
}
