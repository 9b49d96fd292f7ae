//! Envelope-encrypted on-device secret store.
//!
//! `vaultkit-core` persists sensitive byte-strings (wallet private keys) so
//! that plaintext key material never touches durable storage and access is
//! gated by a user credential and/or the platform biometric factor. Each
//! [`ProtectionClass`] owns a two-tier key hierarchy:
//!
//! - a credential-gated **key-encrypting key** (KEK), held by the platform's
//!   secure item store, hardware-backed where available;
//! - a software **data-encryption key** (DEK) that directly encrypts
//!   individual secrets, its private half persisted only in wrapped form
//!   sealed under the KEK public key.
//!
//! Importing a secret needs only the clear DEK public key, so it never
//! prompts for a credential. Finding a secret authenticates against the KEK,
//! unwraps the DEK transiently, and decrypts. Changing the credential
//! replaces the KEK and re-wraps the DEK once; stored secrets are never
//! rewritten.
//!
//! Platform secure storage is consumed through the [`SecureItemStore`]
//! trait. [`MemorySecureItemStore`] is an in-memory implementation for
//! tests.

pub mod crypto;
pub mod dek;
pub mod error;
pub mod item_store;
pub mod kek;
pub mod store;
pub mod types;

pub use error::{KeyStoreError, KeyStoreResult};
pub use item_store::{AccessControlledKey, MemorySecureItemStore, SecureItemStore};
pub use store::ProtectedKeyStore;
pub use types::{AccessPolicy, DataId, ProtectionClass};
