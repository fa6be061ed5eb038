// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Password-Based Key Derivation
//!
//! PBKDF2 is used whenever a fresh random salt accompanies a human password
//! (archive passwords, the password-mode AEAD envelope). Argon2id is used for
//! memory-hard password verification and local-secret gating.
//!
//! Argon2id parameters: m=64MB, t=1, p=4.

use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use zeroize::Zeroize;

use super::SymmetricKey;

/// Argon2id memory cost in KiB (64 MB).
const ARGON2_M_COST: u32 = 65536;
/// Argon2id time cost (iterations).
const ARGON2_T_COST: u32 = 1;
/// Argon2id parallelism.
const ARGON2_P_COST: u32 = 4;

/// PBKDF2-HMAC-SHA256 iteration count.
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt size for password hashing and key derivation (16 bytes).
const SALT_SIZE: usize = 16;

/// Password KDF error types.
#[derive(Debug, thiserror::Error)]
pub enum PasswordKdfError {
    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),
}

/// Derives a 32-byte symmetric key from a password using PBKDF2-HMAC-SHA256.
///
/// 100,000 iterations. Used for archive passwords and the password-mode
/// AEAD envelope, where the salt travels with the ciphertext.
pub fn derive_key_pbkdf2(password: &[u8], salt: &[u8]) -> Result<SymmetricKey, PasswordKdfError> {
    let mut key_bytes = [0u8; 32];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(PBKDF2_ITERATIONS).expect("iteration count is non-zero"),
        salt,
        password,
        &mut key_bytes,
    );

    let key = SymmetricKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Derives a 32-byte symmetric key from a password using Argon2id.
///
/// Parameters: m=64MB, t=1, p=4.
pub fn derive_key_argon2id(password: &[u8], salt: &[u8]) -> Result<SymmetricKey, PasswordKdfError> {
    let params = argon2::Params::new(ARGON2_M_COST, ARGON2_T_COST, ARGON2_P_COST, Some(32))
        .map_err(|e| PasswordKdfError::DerivationFailed(e.to_string()))?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key_bytes = [0u8; 32];
    argon2
        .hash_password_into(password, salt, &mut key_bytes)
        .map_err(|e| PasswordKdfError::DerivationFailed(e.to_string()))?;

    let key = SymmetricKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Generates a fresh random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_SIZE];
    rng.fill(&mut salt).expect("System RNG should not fail");
    salt
}

/// Hashes a password with Argon2id under a fresh salt.
///
/// Returns `(hash, salt)`. The hash is the raw 32-byte Argon2id output;
/// both values are stored, the password never is.
pub fn hash_password(password: &str) -> Result<(Vec<u8>, Vec<u8>), PasswordKdfError> {
    let salt = generate_salt();
    let key = derive_key_argon2id(password.as_bytes(), &salt)?;
    Ok((key.as_bytes().to_vec(), salt.to_vec()))
}

/// Verifies a password against a stored Argon2id hash in constant time.
///
/// Returns `false` on any mismatch or derivation failure, without
/// distinguishing the cause.
pub fn verify_password(password: &str, salt: &[u8], expected_hash: &[u8]) -> bool {
    let derived = match derive_key_argon2id(password.as_bytes(), salt) {
        Ok(key) => key,
        Err(_) => return false,
    };

    ring::constant_time::verify_slices_are_equal(derived.as_bytes(), expected_hash).is_ok()
}
