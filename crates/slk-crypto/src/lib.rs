//! Cryptography for seedlock: BIP-39 mnemonic encoding/validation and
//! AES-256-GCM envelope sealing for phrase payloads.
//!
//! Phrases are sealed with a random per-item key ([`envelope::PhraseKey`]);
//! key custody is the keystore crate's concern, not this one's.

pub mod envelope;
pub mod mnemonic;

pub use envelope::{
    decrypt, decrypt_phrase, derive_password_key, encrypt, encrypt_phrase, generate_key,
    EnvelopeError, PhraseKey,
};
pub use mnemonic::{
    clean_phrase, generate, generate_with, last_incomplete_word, suggest, validate, MnemonicError,
    MAX_SUGGESTIONS, VALID_WORD_COUNTS,
};

/// AES-256 key size in bytes
pub const KEY_SIZE: usize = 32;
/// AES-GCM nonce size in bytes
pub const NONCE_SIZE: usize = 12;
/// AES-GCM authentication tag size in bytes
pub const TAG_SIZE: usize = 16;
