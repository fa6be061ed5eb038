// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Symmetric Encryption (AES-256-GCM)
//!
//! Provides authenticated encryption in two modes:
//!
//! - Password mode: `salt (16 bytes) || nonce (12 bytes) || ciphertext || tag`.
//!   The key is derived from the password and the embedded salt via PBKDF2.
//! - Key mode: `nonce (12 bytes) || ciphertext || tag`, for callers that
//!   already hold a derived [`SymmetricKey`].
//!
//! Any authentication failure surfaces as the single generic
//! [`EncryptionError::DecryptionFailed`] — no partial plaintext, no reason.

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::Zeroize;

use super::password_kdf::derive_key_pbkdf2;

/// Encryption error types.
#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed: data may be corrupted or wrong password")]
    DecryptionFailed,
    #[error("Ciphertext too short")]
    CiphertextTooShort,
}

/// Salt size for the password-mode envelope (128 bits = 16 bytes).
pub const SALT_SIZE: usize = 16;
/// Nonce size for AES-256-GCM (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// 256-bit symmetric encryption key.
#[derive(Clone)]
pub struct SymmetricKey {
    bytes: [u8; 32],
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose key bytes in debug output
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl SymmetricKey {
    /// Generates a new random symmetric key.
    pub fn generate() -> Self {
        let rng = SystemRandom::new();
        let key = ring::rand::generate::<[u8; 32]>(&rng)
            .expect("System RNG should not fail")
            .expose();
        SymmetricKey { bytes: key }
    }

    /// Creates a key from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        SymmetricKey { bytes }
    }

    /// Returns a reference to the key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

/// Encrypts data under a password.
///
/// A fresh random salt is embedded in the output so the password alone is
/// enough to decrypt. Output: `salt (16) || nonce (12) || ciphertext || tag`.
pub fn encrypt(password: &str, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let rng = SystemRandom::new();

    let mut salt = [0u8; SALT_SIZE];
    rng.fill(&mut salt)
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    let key = derive_key_pbkdf2(password.as_bytes(), &salt)
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    let sealed = seal(&key, plaintext)?;

    let mut output = Vec::with_capacity(SALT_SIZE + sealed.len());
    output.extend_from_slice(&salt);
    output.extend_from_slice(&sealed);

    Ok(output)
}

/// Decrypts password-mode ciphertext produced by [`encrypt`].
pub fn decrypt(password: &str, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < SALT_SIZE + NONCE_SIZE + AES_256_GCM.tag_len() {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let salt = &data[..SALT_SIZE];
    let key = derive_key_pbkdf2(password.as_bytes(), salt)
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    open(&key, &data[SALT_SIZE..])
}

/// Encrypts data with an already-derived key.
///
/// Output: `nonce (12) || ciphertext || tag`.
pub fn encrypt_with_key(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    seal(key, plaintext)
}

/// Decrypts key-mode ciphertext produced by [`encrypt_with_key`].
pub fn decrypt_with_key(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    open(key, data)
}

fn seal(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let rng = SystemRandom::new();

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    let unbound_key = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| EncryptionError::EncryptionFailed)?;
    let sealing_key = LessSafeKey::new(unbound_key);

    let mut in_out = plaintext.to_vec();
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);
    sealing_key
        .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| EncryptionError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + in_out.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&in_out);

    Ok(output)
}

fn open(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let min_size = NONCE_SIZE + AES_256_GCM.tag_len();
    if data.len() < min_size {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let nonce_bytes: [u8; NONCE_SIZE] = data[..NONCE_SIZE]
        .try_into()
        .map_err(|_| EncryptionError::DecryptionFailed)?;
    let nonce = Nonce::assume_unique_for_key(nonce_bytes);

    let unbound_key = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| EncryptionError::DecryptionFailed)?;
    let opening_key = LessSafeKey::new(unbound_key);

    let mut buffer = data[NONCE_SIZE..].to_vec();
    let plaintext = opening_key
        .open_in_place(nonce, Aad::empty(), &mut buffer)
        .map_err(|_| EncryptionError::DecryptionFailed)?;

    Ok(plaintext.to_vec())
}
