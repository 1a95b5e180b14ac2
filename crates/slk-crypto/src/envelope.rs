//! Envelope sealing for phrase payloads: AES-256-GCM with a random
//! per-item key and a fresh nonce per encryption.
//!
//! Sealed blob layout: `[12-byte nonce][ciphertext][16-byte tag]`. Every
//! decryption failure surfaces as the same [`EnvelopeError::DecryptionFailed`]
//! so callers cannot tell a short blob from a bad tag or a wrong key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("encryption failed")]
    EncryptionFailed,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("invalid key length: {0} bytes (expected 32)")]
    InvalidKeyLength(usize),
}

/// A 256-bit content key for one sealed phrase. Zeroed on drop and
/// redacted in debug output.
#[derive(Clone)]
pub struct PhraseKey {
    bytes: [u8; KEY_SIZE],
}

impl PhraseKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Rebuild a key from raw bytes coming out of storage.
    pub fn from_slice(slice: &[u8]) -> Result<Self, EnvelopeError> {
        let bytes: [u8; KEY_SIZE] = slice
            .try_into()
            .map_err(|_| EnvelopeError::InvalidKeyLength(slice.len()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for PhraseKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for PhraseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhraseKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a fresh random content key.
pub fn generate_key() -> PhraseKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    PhraseKey::from_bytes(bytes)
}

/// Derive a backup key from a password: a single SHA-256 over the UTF-8
/// bytes, no salt. Offline guessing against a stolen backup file is
/// bounded only by password strength, so callers should insist on strong
/// passwords.
pub fn derive_password_key(password: &SecretString) -> PhraseKey {
    let digest = Sha256::digest(password.expose_secret().as_bytes());
    PhraseKey::from_bytes(digest.into())
}

/// Seal `plaintext` under `key`, returning `[nonce][ciphertext][tag]`.
pub fn encrypt(key: &PhraseKey, plaintext: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| EnvelopeError::EncryptionFailed)?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Open a sealed blob. Truncated input, a tampered byte anywhere, or the
/// wrong key all yield [`EnvelopeError::DecryptionFailed`].
pub fn decrypt(key: &PhraseKey, blob: &[u8]) -> Result<Vec<u8>, EnvelopeError> {
    if blob.len() < NONCE_SIZE + TAG_SIZE {
        return Err(EnvelopeError::DecryptionFailed);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EnvelopeError::DecryptionFailed)
}

/// Seal a phrase string.
pub fn encrypt_phrase(key: &PhraseKey, phrase: &str) -> Result<Vec<u8>, EnvelopeError> {
    encrypt(key, phrase.as_bytes())
}

/// Open a sealed phrase. Plaintext that is not valid UTF-8 is wiped and
/// reported as a decryption failure.
pub fn decrypt_phrase(key: &PhraseKey, blob: &[u8]) -> Result<String, EnvelopeError> {
    let plaintext = decrypt(key, blob)?;
    String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        EnvelopeError::DecryptionFailed
    })
}
