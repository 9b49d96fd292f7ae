//! Asymmetric encryption primitives for the key hierarchy.
//!
//! Both tiers of the envelope hierarchy use the same ECIES-style sealed box
//! (similar to libsodium's `crypto_box_seal`):
//!
//! 1. The sender generates an ephemeral X25519 key pair
//! 2. ECDH is performed between the ephemeral secret and the recipient's
//!    public key
//! 3. An encryption key is derived with HKDF-SHA256
//! 4. The payload is encrypted with XChaCha20-Poly1305
//!
//! # Envelope Format
//!
//! ```text
//! version: u32 (4 bytes, little-endian)
//! ephemeral_public: [u8; 32]
//! nonce: [u8; 24]
//! ciphertext: [u8; ...] (variable length, includes auth tag)
//! ```
//!
//! The domain `label` is mixed into both the HKDF info string and the AEAD
//! associated data, so a blob sealed for one purpose never opens under
//! another.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{KeyStoreError, KeyStoreResult};

/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Size of an X25519 secret key in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Current sealed envelope format version.
const SEALED_VERSION: u32 = 1;

/// Size of the XChaCha20-Poly1305 nonce.
const NONCE_SIZE: usize = 24;

/// Minimum envelope size (version + ephemeral pubkey + nonce + auth tag).
const MIN_SEALED_SIZE: usize = 4 + PUBLIC_KEY_SIZE + NONCE_SIZE + 16;

/// An X25519 key pair used for envelope encryption.
///
/// Serves as both the software data-encryption key pair and, inside store
/// implementations, the key material behind an access-controlled key. The
/// secret half is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKeyPair {
    /// Private key (secret).
    secret: [u8; SECRET_KEY_SIZE],
    /// Public key.
    #[zeroize(skip)]
    public: [u8; PUBLIC_KEY_SIZE],
}

impl EncryptionKeyPair {
    /// Generates a new random key pair.
    ///
    /// # Panics
    ///
    /// Panics if the system's random number generator fails.
    #[must_use]
    pub fn generate() -> Self {
        let mut secret_bytes = [0u8; SECRET_KEY_SIZE];
        OsRng.fill_bytes(&mut secret_bytes);
        Self::from_secret(secret_bytes)
    }

    /// Reconstructs a key pair from existing secret key bytes.
    #[must_use]
    pub fn from_secret(secret_bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(secret_bytes);
        let public = PublicKey::from(&secret);

        Self {
            secret: secret_bytes,
            public: *public.as_bytes(),
        }
    }

    /// Returns the public key bytes.
    #[must_use]
    pub const fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public
    }

    /// Returns the secret key bytes. Treat this as sensitive material.
    #[must_use]
    pub const fn secret_key(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.secret
    }
}

impl std::fmt::Debug for EncryptionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKeyPair")
            .field("secret", &"[REDACTED]")
            .field("public", &hex::encode(self.public))
            .finish()
    }
}

/// Encrypts `plaintext` to the holder of the private key matching
/// `recipient_public`.
///
/// # Errors
///
/// Returns an error if HKDF expansion or AEAD encryption fails.
///
/// # Panics
///
/// This function will not panic - the `expect` is for a condition that cannot
/// fail (the derived key is always 32 bytes by construction).
pub fn seal(
    recipient_public: &[u8; PUBLIC_KEY_SIZE],
    label: &[u8],
    plaintext: &[u8],
) -> KeyStoreResult<Vec<u8>> {
    let recipient = PublicKey::from(*recipient_public);

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let shared_secret = ephemeral_secret.diffie_hellman(&recipient);
    let key = derive_encryption_key(
        shared_secret.as_bytes(),
        ephemeral_public.as_bytes(),
        recipient_public,
        label,
    )?;

    let cipher = XChaCha20Poly1305::new_from_slice(&key).expect("key length is always 32");
    let nonce_bytes = generate_nonce();
    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad: label,
            },
        )
        .map_err(|_| KeyStoreError::key_generation("sealed envelope encryption failed"))?;

    let mut sealed = Vec::with_capacity(MIN_SEALED_SIZE + plaintext.len());
    sealed.extend_from_slice(&SEALED_VERSION.to_le_bytes());
    sealed.extend_from_slice(ephemeral_public.as_bytes());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(sealed)
}

/// Decrypts a sealed envelope with the recipient's private key.
///
/// # Errors
///
/// Returns an error if:
/// - The envelope is truncated or carries an unsupported version
/// - Authentication fails (tampered data, wrong key, or wrong `label`)
///
/// # Panics
///
/// This function will not panic - the `expect` is for a condition that cannot
/// fail (the derived key is always 32 bytes by construction).
pub fn open(
    recipient_secret: &[u8; SECRET_KEY_SIZE],
    label: &[u8],
    sealed: &[u8],
) -> KeyStoreResult<Zeroizing<Vec<u8>>> {
    if sealed.len() < MIN_SEALED_SIZE {
        return Err(KeyStoreError::corrupted("sealed envelope too short"));
    }

    let version = u32::from_le_bytes(
        sealed[0..4]
            .try_into()
            .map_err(|_| KeyStoreError::corrupted("invalid version bytes"))?,
    );
    if version != SEALED_VERSION {
        return Err(KeyStoreError::UnsupportedEnvelopeVersion(version));
    }

    let ephemeral_public_bytes: [u8; PUBLIC_KEY_SIZE] = sealed[4..4 + PUBLIC_KEY_SIZE]
        .try_into()
        .map_err(|_| KeyStoreError::corrupted("invalid ephemeral public key"))?;
    let nonce: [u8; NONCE_SIZE] = sealed[4 + PUBLIC_KEY_SIZE..4 + PUBLIC_KEY_SIZE + NONCE_SIZE]
        .try_into()
        .map_err(|_| KeyStoreError::corrupted("invalid nonce"))?;
    let ciphertext = &sealed[4 + PUBLIC_KEY_SIZE + NONCE_SIZE..];

    let secret = StaticSecret::from(*recipient_secret);
    let recipient_public = PublicKey::from(&secret);
    let ephemeral_public = PublicKey::from(ephemeral_public_bytes);

    let shared_secret = secret.diffie_hellman(&ephemeral_public);
    let key = derive_encryption_key(
        shared_secret.as_bytes(),
        &ephemeral_public_bytes,
        recipient_public.as_bytes(),
        label,
    )?;

    let cipher = XChaCha20Poly1305::new_from_slice(&key).expect("key length is always 32");
    let plaintext = cipher
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: ciphertext,
                aad: label,
            },
        )
        .map_err(|_| KeyStoreError::decryption("sealed envelope decryption failed"))?;

    Ok(Zeroizing::new(plaintext))
}

/// Derives the AEAD key from the ECDH shared secret.
///
/// Info = `label || ephemeral_public || recipient_public`.
fn derive_encryption_key(
    shared_secret: &[u8; 32],
    ephemeral_public: &[u8; PUBLIC_KEY_SIZE],
    recipient_public: &[u8; PUBLIC_KEY_SIZE],
    label: &[u8],
) -> KeyStoreResult<[u8; 32]> {
    let mut info = Vec::with_capacity(label.len() + 2 * PUBLIC_KEY_SIZE);
    info.extend_from_slice(label);
    info.extend_from_slice(ephemeral_public);
    info.extend_from_slice(recipient_public);

    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = [0u8; 32];
    hkdf.expand(&info, &mut key)
        .map_err(|_| KeyStoreError::key_generation("HKDF expansion failed"))?;

    Ok(key)
}

/// Generates a random nonce.
///
/// # Panics
///
/// Panics if the system's random number generator fails.
fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}
