// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pairing Key Management
//!
//! Generates, serializes, validates and rotates the sharable standalone key
//! that bootstraps a pairing, and builds client-side connections from a
//! received key plus a local password.

pub mod connection;
pub mod error;
pub mod standalone;

pub use connection::{
    create_connection, decrypt_connection, ConnectionSecrets, StandaloneConnection, SyncStatus,
};
pub use error::KeyError;
pub use standalone::{
    decode_shared_key, encode_for_sharing, generate_standalone_key, rotate_key, validate_key,
    verify_api_key, StandaloneConfig, StandaloneKey, DEFAULT_EXPIRATION_DAYS, KEY_PREFIX,
    KEY_VERSION,
};
