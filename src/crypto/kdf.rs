// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! HKDF Sub-Key Derivation
//!
//! Derives independent 32-byte sub-keys from one high-entropy master secret
//! using HKDF-SHA256 with distinct fixed info strings. Compromising one
//! derived key exposes neither the master secret nor sibling keys.

use ring::digest;
use ring::hkdf;
use thiserror::Error;
use zeroize::Zeroize;

use super::SymmetricKey;

/// KDF info constants for domain separation.
pub const INFO_API_AUTH: &[u8] = b"api-auth";
pub const INFO_DATA_ENCRYPTION: &[u8] = b"data-encryption";
pub const INFO_LOCAL_STORAGE: &[u8] = b"local-storage";

/// KDF error types.
#[derive(Error, Debug)]
pub enum KdfError {
    #[error("Sub-key derivation failed")]
    DerivationFailed,
}

/// Derives a 32-byte sub-key from a master secret via HKDF-SHA256.
///
/// The salt binds the derivation to an instance or connection id; the info
/// string separates key purposes. Deterministic for fixed inputs.
pub fn derive_subkey(
    secret: &[u8],
    salt: &[u8],
    info: &[u8],
) -> Result<SymmetricKey, KdfError> {
    let salt = hkdf::Salt::new(hkdf::HKDF_SHA256, salt);
    let prk = salt.extract(secret);
    let info_components = [info];
    let okm = prk
        .expand(&info_components, hkdf::HKDF_SHA256)
        .map_err(|_| KdfError::DerivationFailed)?;

    let mut key_bytes = [0u8; 32];
    okm.fill(&mut key_bytes)
        .map_err(|_| KdfError::DerivationFailed)?;

    let key = SymmetricKey::from_bytes(key_bytes);
    key_bytes.zeroize();
    Ok(key)
}

/// Computes a short non-secret identifier for a key.
///
/// First 2 bytes of SHA-256(key), lowercase hex. Shown in UX and logs to
/// tell keys apart; reveals nothing useful about the key itself.
pub fn compute_key_hint(key: &SymmetricKey) -> String {
    let hash = digest::digest(&digest::SHA256, key.as_bytes());
    hex::encode(&hash.as_ref()[..2])
}
