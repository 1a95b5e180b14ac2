//! BIP-39 mnemonic codec: generation, validation, and typing helpers.
//!
//! N words carry N*11 bits, of which the trailing N/3 bits are a checksum
//! taken from the first byte of SHA-256 over the leading entropy bits.
//! Every supported word count keeps the checksum within that single byte.

use bip39::Language;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroize;

/// Word counts accepted for generation and validation.
pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// Cap on autocomplete suggestions returned by [`suggest`].
pub const MAX_SUGGESTIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MnemonicError {
    #[error("unsupported word count: {0} (expected 12, 15, 18, 21, or 24)")]
    InvalidWordCount(usize),
    #[error("unknown words: {}", .0.join(", "))]
    UnknownWords(Vec<String>),
    #[error("checksum mismatch")]
    ChecksumFailed,
    #[error("system entropy source failed")]
    EntropyGenerationFailed,
}

/// Generate a fresh mnemonic of `word_count` words from system entropy.
pub fn generate(word_count: usize) -> Result<String, MnemonicError> {
    generate_with(&mut rand::thread_rng(), word_count)
}

/// Generate a mnemonic from the given RNG. Split out from [`generate`] so
/// tests can drive it with a seeded generator.
pub fn generate_with<R: RngCore + CryptoRng>(
    rng: &mut R,
    word_count: usize,
) -> Result<String, MnemonicError> {
    if !VALID_WORD_COUNTS.contains(&word_count) {
        return Err(MnemonicError::InvalidWordCount(word_count));
    }

    // N*11 total bits minus the N/3 checksum bits leaves a whole number
    // of entropy bytes for every supported count.
    let entropy_bits = word_count * 11 - word_count / 3;
    let mut entropy = vec![0u8; entropy_bits / 8];
    rng.try_fill_bytes(&mut entropy)
        .map_err(|_| MnemonicError::EntropyGenerationFailed)?;

    let phrase = encode_entropy(&entropy, word_count);
    entropy.zeroize();
    Ok(phrase)
}

/// Map entropy bytes to words: entropy bits, then checksum bits, read off
/// in 11-bit groups as indices into the English word list.
fn encode_entropy(entropy: &[u8], word_count: usize) -> String {
    let checksum_bits = word_count / 3;
    let digest = Sha256::digest(entropy);

    let mut bits = Vec::with_capacity(entropy.len() * 8 + checksum_bits);
    for byte in entropy {
        for shift in (0..8).rev() {
            bits.push((byte >> shift) & 1 == 1);
        }
    }
    for i in 0..checksum_bits {
        bits.push((digest[0] >> (7 - i)) & 1 == 1);
    }

    let list = Language::English.word_list();
    let words: Vec<&str> = bits
        .chunks(11)
        .map(|chunk| {
            let index = chunk
                .iter()
                .fold(0usize, |acc, &bit| (acc << 1) | bit as usize);
            list[index]
        })
        .collect();
    words.join(" ")
}

/// Check a phrase: word count first, then vocabulary, then checksum.
///
/// Unknown words are collected across the whole phrase so a caller can
/// surface every offender at once rather than one per attempt. Case and
/// surrounding whitespace are ignored.
pub fn validate(phrase: &str) -> Result<(), MnemonicError> {
    let lowered = phrase.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    if !VALID_WORD_COUNTS.contains(&words.len()) {
        return Err(MnemonicError::InvalidWordCount(words.len()));
    }

    let list = Language::English.word_list();
    let mut indices = Vec::with_capacity(words.len());
    let mut unknown = Vec::new();
    for word in &words {
        match list.iter().position(|w| w == word) {
            Some(index) => indices.push(index),
            None => unknown.push((*word).to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(MnemonicError::UnknownWords(unknown));
    }

    let mut bits = Vec::with_capacity(words.len() * 11);
    for index in indices {
        for shift in (0..11).rev() {
            bits.push((index >> shift) & 1 == 1);
        }
    }

    let checksum_bits = words.len() / 3;
    let entropy_bits = bits.len() - checksum_bits;
    let mut entropy: Vec<u8> = bits[..entropy_bits]
        .chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
        .collect();

    let digest = Sha256::digest(&entropy);
    let mut ok = true;
    for (i, &bit) in bits[entropy_bits..].iter().enumerate() {
        if ((digest[0] >> (7 - i)) & 1 == 1) != bit {
            ok = false;
        }
    }
    entropy.zeroize();

    if ok {
        Ok(())
    } else {
        Err(MnemonicError::ChecksumFailed)
    }
}

/// Normalize a phrase as it is typed: lowercase, collapse whitespace runs
/// to single spaces, and keep one trailing space if the input ended with a
/// space (the separator the user just typed).
pub fn clean_phrase(phrase: &str) -> String {
    let lowered = phrase.to_lowercase();
    let mut cleaned = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    if !cleaned.is_empty() && lowered.ends_with(' ') {
        cleaned.push(' ');
    }
    cleaned
}

/// Up to [`MAX_SUGGESTIONS`] vocabulary words starting with `prefix`,
/// in word-list order. Empty prefix suggests nothing.
pub fn suggest(prefix: &str) -> Vec<&'static str> {
    if prefix.is_empty() {
        return Vec::new();
    }
    let lowered = prefix.to_lowercase();
    Language::English
        .words_by_prefix(&lowered)
        .iter()
        .take(MAX_SUGGESTIONS)
        .copied()
        .collect()
}

/// The word still being typed at the end of `text`, if any: `None` when
/// the text is empty, ends with a space, or its last word is already a
/// complete vocabulary word. Returned as typed (original casing).
pub fn last_incomplete_word(text: &str) -> Option<&str> {
    if text.ends_with(' ') {
        return None;
    }
    let last = text.split_whitespace().last()?;
    let lowered = last.to_lowercase();
    if Language::English
        .word_list()
        .iter()
        .any(|w| *w == lowered)
    {
        None
    } else {
        Some(last)
    }
}
