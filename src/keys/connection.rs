// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client-Side Connections
//!
//! A connection is the client's durable record of a pairing: the received
//! key's secrets re-encrypted under a key derived from a *local* password.
//! Two independent secrecy layers result — the pairing secret tied to the
//! remote instance, and the local-unlock secret that never leaves this
//! machine.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::KeyError;
use super::standalone::{validate_key, StandaloneKey};
use crate::crypto::{
    decrypt_with_key, derive_key_argon2id, encrypt_with_key, generate_salt, hash_password,
    verify_password,
};

/// Sync progress of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Paired but never synced.
    NeverSynced,
    /// Last sync completed successfully.
    Synced,
    /// Last sync attempt failed.
    Failed,
}

/// Client-local record of a pairing.
#[derive(Clone, Serialize, Deserialize)]
pub struct StandaloneConnection {
    pub name: String,
    pub instance_id: Uuid,
    pub host: String,
    pub port: u16,
    /// api_key sealed under the local unlock key.
    encrypted_api_key: Vec<u8>,
    /// refresh_token sealed under the local unlock key.
    encrypted_refresh_token: Vec<u8>,
    /// Salt for deriving the unlock key from the local password.
    unlock_salt: Vec<u8>,
    /// Argon2id verification hash of the local password.
    password_hash: Vec<u8>,
    password_salt: Vec<u8>,
    pub sync_status: SyncStatus,
    pub last_synced_at: Option<u64>,
    pub created_at: u64,
}

impl std::fmt::Debug for StandaloneConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandaloneConnection")
            .field("name", &self.name)
            .field("instance_id", &self.instance_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("sync_status", &self.sync_status)
            .finish()
    }
}

/// Decrypted pairing secrets, returned transiently and wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ConnectionSecrets {
    pub api_key: String,
    pub refresh_token: String,
}

/// Builds a connection from a received key, gated by a local password.
///
/// The key is validated first; nothing is stored for an invalid or expired
/// key.
pub fn create_connection(
    name: &str,
    key: &StandaloneKey,
    local_password: &str,
) -> Result<StandaloneConnection, KeyError> {
    validate_key(key)?;

    let unlock_salt = generate_salt();
    let unlock_key = derive_key_argon2id(local_password.as_bytes(), &unlock_salt)
        .map_err(|_| KeyError::CryptoFailed)?;

    let encrypted_api_key =
        encrypt_with_key(&unlock_key, key.api_key.as_bytes()).map_err(|_| KeyError::CryptoFailed)?;
    let encrypted_refresh_token = encrypt_with_key(&unlock_key, key.refresh_token.as_bytes())
        .map_err(|_| KeyError::CryptoFailed)?;

    let (password_hash, password_salt) =
        hash_password(local_password).map_err(|_| KeyError::CryptoFailed)?;

    Ok(StandaloneConnection {
        name: name.to_string(),
        instance_id: key.instance_id,
        host: key.host.clone(),
        port: key.port,
        encrypted_api_key,
        encrypted_refresh_token,
        unlock_salt: unlock_salt.to_vec(),
        password_hash,
        password_salt,
        sync_status: SyncStatus::NeverSynced,
        last_synced_at: None,
        created_at: now_unix(),
    })
}

/// Unlocks a connection's secrets with the local password.
///
/// The password is verified before any decryption is attempted; a mismatch
/// fails closed with no data returned.
pub fn decrypt_connection(
    connection: &StandaloneConnection,
    local_password: &str,
) -> Result<ConnectionSecrets, KeyError> {
    if !verify_password(
        local_password,
        &connection.password_salt,
        &connection.password_hash,
    ) {
        return Err(KeyError::WrongPassword);
    }

    let unlock_key = derive_key_argon2id(local_password.as_bytes(), &connection.unlock_salt)
        .map_err(|_| KeyError::CryptoFailed)?;

    let mut api_key_bytes = decrypt_with_key(&unlock_key, &connection.encrypted_api_key)
        .map_err(|_| KeyError::WrongPassword)?;
    let mut refresh_token_bytes =
        decrypt_with_key(&unlock_key, &connection.encrypted_refresh_token)
            .map_err(|_| KeyError::WrongPassword)?;

    let api_key = String::from_utf8(api_key_bytes.clone()).map_err(|_| KeyError::CryptoFailed)?;
    let refresh_token =
        String::from_utf8(refresh_token_bytes.clone()).map_err(|_| KeyError::CryptoFailed)?;
    api_key_bytes.zeroize();
    refresh_token_bytes.zeroize();

    Ok(ConnectionSecrets {
        api_key,
        refresh_token,
    })
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
