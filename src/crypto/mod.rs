// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod encryption;
pub mod kdf;
pub mod password_kdf;

pub use encryption::{
    decrypt, decrypt_with_key, encrypt, encrypt_with_key, EncryptionError, SymmetricKey,
};
pub use kdf::{
    compute_key_hint, derive_subkey, KdfError, INFO_API_AUTH, INFO_DATA_ENCRYPTION,
    INFO_LOCAL_STORAGE,
};
pub use password_kdf::{
    derive_key_argon2id, derive_key_pbkdf2, generate_salt, hash_password, verify_password,
    PasswordKdfError,
};
