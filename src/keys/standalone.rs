// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Standalone Pairing Keys
//!
//! A standalone key is generated on the server instance and shared
//! out-of-band (copy/paste, QR). The issuing side keeps only a verification
//! hash; the raw api_key never touches durable storage there.

use ring::rand::SystemRandom;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;
use zeroize::Zeroize;

use super::error::KeyError;
use crate::crypto::{
    compute_key_hint, derive_subkey, encrypt_with_key, hash_password, verify_password,
    INFO_API_AUTH, INFO_DATA_ENCRYPTION,
};

/// Prefix for the copy-paste share encoding.
pub const KEY_PREFIX: &str = "CLONR-SYNC:";

/// Current standalone key format version.
pub const KEY_VERSION: u32 = 1;

/// Default key lifetime in days.
pub const DEFAULT_EXPIRATION_DAYS: u64 = 30;

/// Capabilities advertised by a freshly generated key.
const DEFAULT_CAPABILITIES: &[&str] = &["profiles", "workspaces", "archives"];

/// Sharable pairing key.
///
/// Contains the raw api_key and refresh_token; exists only in transit and on
/// the receiving (client) side, where it is re-encrypted under a local
/// password before storage.
#[derive(Clone, Serialize, Deserialize)]
pub struct StandaloneKey {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub instance_id: Uuid,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub encryption_key_hint: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub expires_at: u64,
}

impl std::fmt::Debug for StandaloneKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Don't expose secrets in debug output
        f.debug_struct("StandaloneKey")
            .field("version", &self.version)
            .field("instance_id", &self.instance_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("encryption_key_hint", &self.encryption_key_hint)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Server-local record of an issued key.
///
/// Invariant: the raw api_key never appears here — only its Argon2id hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandaloneConfig {
    pub instance_id: Uuid,
    pub api_key_hash: Vec<u8>,
    pub api_key_salt: Vec<u8>,
    pub encrypted_refresh_token: Vec<u8>,
    pub expires_at: u64,
}

/// Generates a fresh standalone key pair for this instance.
///
/// A random 32-byte master key seeds the HKDF derivations and is wiped
/// before returning. Returns the sharable key and the server-local config.
pub fn generate_standalone_key(
    host: &str,
    port: u16,
) -> Result<(StandaloneKey, StandaloneConfig), KeyError> {
    generate_for_instance(Uuid::new_v4(), host, port)
}

/// Rotates the key for an existing instance.
///
/// Keeps the instance_id but regenerates every secret; verification hashes
/// from prior pairings no longer match, so all of them are invalidated.
pub fn rotate_key(
    config: &StandaloneConfig,
    host: &str,
    port: u16,
) -> Result<(StandaloneKey, StandaloneConfig), KeyError> {
    generate_for_instance(config.instance_id, host, port)
}

fn generate_for_instance(
    instance_id: Uuid,
    host: &str,
    port: u16,
) -> Result<(StandaloneKey, StandaloneConfig), KeyError> {
    if host.is_empty() {
        return Err(KeyError::MissingField("host"));
    }
    if port == 0 {
        return Err(KeyError::InvalidPort);
    }

    let rng = SystemRandom::new();
    let mut master_key = ring::rand::generate::<[u8; 32]>(&rng)
        .expect("System RNG should not fail")
        .expose();

    let api_auth_key = derive_subkey(&master_key, instance_id.as_bytes(), INFO_API_AUTH)
        .map_err(|_| KeyError::CryptoFailed)?;
    let encryption_key = derive_subkey(&master_key, instance_id.as_bytes(), INFO_DATA_ENCRYPTION)
        .map_err(|_| KeyError::CryptoFailed)?;
    master_key.zeroize();

    let api_key = hex::encode(api_auth_key.as_bytes());
    let refresh_token = hex::encode(
        ring::rand::generate::<[u8; 32]>(&rng)
            .expect("System RNG should not fail")
            .expose(),
    );

    let (api_key_hash, api_key_salt) =
        hash_password(&api_key).map_err(|_| KeyError::CryptoFailed)?;
    let encrypted_refresh_token = encrypt_with_key(&encryption_key, refresh_token.as_bytes())
        .map_err(|_| KeyError::CryptoFailed)?;

    let created_at = now_unix();
    let expires_at = created_at + DEFAULT_EXPIRATION_DAYS * 24 * 60 * 60;

    let key = StandaloneKey {
        version: KEY_VERSION,
        instance_id,
        host: host.to_string(),
        port,
        api_key,
        refresh_token,
        encryption_key_hint: compute_key_hint(&encryption_key),
        capabilities: DEFAULT_CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        created_at,
        expires_at,
    };

    let config = StandaloneConfig {
        instance_id,
        api_key_hash,
        api_key_salt,
        encrypted_refresh_token,
        expires_at,
    };

    Ok((key, config))
}

/// Validates a received key before it is stored or used.
pub fn validate_key(key: &StandaloneKey) -> Result<(), KeyError> {
    if key.version > KEY_VERSION {
        return Err(KeyError::UnsupportedVersion {
            found: key.version,
            supported: KEY_VERSION,
        });
    }
    if key.instance_id.is_nil() {
        return Err(KeyError::MissingField("instance_id"));
    }
    if key.api_key.is_empty() {
        return Err(KeyError::MissingField("api_key"));
    }
    if key.host.is_empty() {
        return Err(KeyError::MissingField("host"));
    }
    if key.port == 0 {
        return Err(KeyError::InvalidPort);
    }
    if key.expires_at <= now_unix() {
        return Err(KeyError::Expired);
    }
    Ok(())
}

/// Checks a presented api_key against the stored verification hash.
pub fn verify_api_key(config: &StandaloneConfig, api_key: &str) -> bool {
    verify_password(api_key, &config.api_key_salt, &config.api_key_hash)
}

/// Encodes a key for out-of-band sharing: `CLONR-SYNC:<base58(JSON)>`.
pub fn encode_for_sharing(key: &StandaloneKey) -> Result<String, KeyError> {
    let json = serde_json::to_vec(key).map_err(|_| KeyError::InvalidEncoding)?;
    Ok(format!("{}{}", KEY_PREFIX, bs58::encode(json).into_string()))
}

/// Decodes a shared key from the prefixed base58 form or raw JSON.
pub fn decode_shared_key(text: &str) -> Result<StandaloneKey, KeyError> {
    let text = text.trim();

    if let Some(encoded) = text.strip_prefix(KEY_PREFIX) {
        let json = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| KeyError::InvalidEncoding)?;
        return serde_json::from_slice(&json).map_err(|_| KeyError::InvalidEncoding);
    }

    if text.starts_with('{') {
        return serde_json::from_slice(text.as_bytes()).map_err(|_| KeyError::InvalidEncoding);
    }

    Err(KeyError::InvalidEncoding)
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
