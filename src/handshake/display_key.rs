// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Display Key Handling
//!
//! The display key is 32 lowercase hex chars (16 random bytes) — the sole
//! source of entropy in a pairing. Both sides derive the identical 32-byte
//! full key from it with Argon2id under a fixed protocol-level salt, so the
//! transcribed string alone is enough to reconstruct the shared secret.

use ring::rand::SystemRandom;

use super::error::HandshakeError;
use crate::crypto::{derive_key_argon2id, SymmetricKey};

/// Length of a normalized display key in hex characters.
pub const DISPLAY_KEY_LEN: usize = 32;

/// Fixed protocol-level salt for the display-key derivation.
///
/// Deliberately constant: a per-side salt would make the two peers derive
/// different full keys from the same transcribed string.
const DISPLAY_KEY_SALT: &[u8] = b"clonr-sync-display-key-v1";

/// Generates a fresh display key: 16 random bytes, lowercase hex.
pub fn generate_display_key() -> String {
    let rng = SystemRandom::new();
    let bytes = ring::rand::generate::<[u8; 16]>(&rng)
        .expect("System RNG should not fail")
        .expose();
    hex::encode(bytes)
}

/// Normalizes user input into a bare display key.
///
/// Strips dashes and whitespace, lowercases, and rejects anything that is
/// not exactly 32 hex characters.
pub fn parse_display_key(text: &str) -> Result<String, HandshakeError> {
    let normalized: String = text
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();

    if normalized.len() != DISPLAY_KEY_LEN {
        return Err(HandshakeError::InvalidDisplayKey(format!(
            "expected {} hex characters, got {}",
            DISPLAY_KEY_LEN,
            normalized.len()
        )));
    }
    if !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(HandshakeError::InvalidDisplayKey(
            "contains non-hex characters".into(),
        ));
    }

    Ok(normalized)
}

/// Formats a bare display key for human transcription: groups of 4, dashed.
pub fn format_display_key(key: &str) -> String {
    key.as_bytes()
        .chunks(4)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("-")
}

/// Derives the 32-byte full key from a bare display key.
///
/// Deterministic: the derivation, not additional randomness, is what lets
/// both sides reconstruct the identical key.
pub fn derive_client_key(display_key: &str) -> Result<SymmetricKey, HandshakeError> {
    derive_key_argon2id(display_key.as_bytes(), DISPLAY_KEY_SALT)
        .map_err(|_| HandshakeError::CryptoFailed)
}
