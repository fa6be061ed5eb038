// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cryptographic Primitive Tests
//!
//! Round-trip and failure-mode coverage for the AEAD envelope, the key
//! derivation layers, and password hashing.

use clonr_sync::crypto::{
    compute_key_hint, decrypt, decrypt_with_key, derive_key_argon2id, derive_key_pbkdf2,
    derive_subkey, encrypt, encrypt_with_key, generate_salt, hash_password, verify_password,
    SymmetricKey, INFO_API_AUTH, INFO_DATA_ENCRYPTION,
};

// =============================================================================
// Password-mode AEAD
// =============================================================================

#[test]
fn password_encrypt_decrypt_roundtrip() {
    let plaintext = b"workspace state: three repos, one profile";
    let sealed = encrypt("correct horse battery staple", plaintext).unwrap();

    let opened = decrypt("correct horse battery staple", &sealed).unwrap();
    assert_eq!(opened, plaintext);
}

#[test]
fn password_mode_embeds_salt_and_nonce() {
    let sealed = encrypt("pw", b"x").unwrap();
    // salt(16) + nonce(12) + ciphertext(1) + tag(16)
    assert_eq!(sealed.len(), 16 + 12 + 1 + 16);
}

#[test]
fn wrong_password_returns_no_plaintext() {
    let sealed = encrypt("right password", b"secret bytes").unwrap();
    assert!(decrypt("wrong password", &sealed).is_err());
}

#[test]
fn same_password_yields_different_ciphertexts() {
    let a = encrypt("pw", b"data").unwrap();
    let b = encrypt("pw", b"data").unwrap();
    // Fresh salt and nonce every time.
    assert_ne!(a, b);
}

#[test]
fn truncated_ciphertext_is_rejected() {
    let sealed = encrypt("pw", b"data").unwrap();
    assert!(decrypt("pw", &sealed[..20]).is_err());
}

// =============================================================================
// Key-mode AEAD
// =============================================================================

#[test]
fn key_encrypt_decrypt_roundtrip() {
    let key = SymmetricKey::generate();
    let sealed = encrypt_with_key(&key, b"payload").unwrap();

    assert_eq!(decrypt_with_key(&key, &sealed).unwrap(), b"payload");
}

#[test]
fn wrong_key_fails_decryption() {
    let sealed = encrypt_with_key(&SymmetricKey::generate(), b"payload").unwrap();
    assert!(decrypt_with_key(&SymmetricKey::generate(), &sealed).is_err());
}

#[test]
fn tampered_ciphertext_fails_authentication() {
    let key = SymmetricKey::generate();
    let mut sealed = encrypt_with_key(&key, b"payload").unwrap();
    let last = sealed.len() - 1;
    sealed[last] ^= 0x01;

    assert!(decrypt_with_key(&key, &sealed).is_err());
}

// =============================================================================
// Key derivation
// =============================================================================

#[test]
fn pbkdf2_is_deterministic_per_salt() {
    let salt = generate_salt();
    let a = derive_key_pbkdf2(b"password", &salt).unwrap();
    let b = derive_key_pbkdf2(b"password", &salt).unwrap();
    assert_eq!(a.as_bytes(), b.as_bytes());

    let other = derive_key_pbkdf2(b"password", &generate_salt()).unwrap();
    assert_ne!(a.as_bytes(), other.as_bytes());
}

#[test]
fn argon2id_differs_from_pbkdf2() {
    let salt = generate_salt();
    let argon = derive_key_argon2id(b"password", &salt).unwrap();
    let pbkdf2 = derive_key_pbkdf2(b"password", &salt).unwrap();
    assert_ne!(argon.as_bytes(), pbkdf2.as_bytes());
}

#[test]
fn hkdf_info_separates_key_purposes() {
    let secret = [0x42u8; 32];
    let api = derive_subkey(&secret, b"instance", INFO_API_AUTH).unwrap();
    let data = derive_subkey(&secret, b"instance", INFO_DATA_ENCRYPTION).unwrap();

    assert_ne!(api.as_bytes(), data.as_bytes());

    // Deterministic: same inputs, same output.
    let api_again = derive_subkey(&secret, b"instance", INFO_API_AUTH).unwrap();
    assert_eq!(api.as_bytes(), api_again.as_bytes());
}

#[test]
fn key_hint_is_stable_and_non_reversing() {
    let key = SymmetricKey::from_bytes([0xABu8; 32]);
    let hint = compute_key_hint(&key);

    assert_eq!(hint, compute_key_hint(&key));
    assert_eq!(hint.len(), 4);
}

// =============================================================================
// Password hashing
// =============================================================================

#[test]
fn password_hash_verifies() {
    let (hash, salt) = hash_password("operator-password").unwrap();

    assert!(verify_password("operator-password", &salt, &hash));
    assert!(!verify_password("other-password", &salt, &hash));
}

#[test]
fn password_hash_uses_fresh_salts() {
    let (hash_a, salt_a) = hash_password("pw").unwrap();
    let (hash_b, salt_b) = hash_password("pw").unwrap();

    assert_ne!(salt_a, salt_b);
    assert_ne!(hash_a, hash_b);
}

// =============================================================================
// Property-based round trips
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn key_mode_roundtrips_any_payload(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let key = SymmetricKey::from_bytes([7u8; 32]);
            let sealed = encrypt_with_key(&key, &data).unwrap();
            prop_assert_eq!(decrypt_with_key(&key, &sealed).unwrap(), data);
        }

        #[test]
        fn key_mode_rejects_any_bit_flip(
            data in proptest::collection::vec(any::<u8>(), 1..256),
            flip in any::<u8>(),
        ) {
            let key = SymmetricKey::from_bytes([7u8; 32]);
            let mut sealed = encrypt_with_key(&key, &data).unwrap();
            let index = (flip as usize) % sealed.len();
            sealed[index] ^= 0x80;
            prop_assert!(decrypt_with_key(&key, &sealed).is_err());
        }
    }
}
