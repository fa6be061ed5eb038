// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Mailbox and Data-at-Rest Gating
//!
//! Holds encrypted items received from paired instances until they are
//! decrypted locally. Decrypted bytes are never persisted, only returned
//! transiently to the caller.

pub mod atrest;
pub mod keyed;

pub use atrest::EncryptionKeyManager;
pub use keyed::{KeyedStore, MemoryStore, SqliteStore};

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use ring::digest;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::{decrypt_with_key, SymmetricKey};

/// Storage error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Item not found")]
    NotFound,

    #[error("Item is not in the encrypted state")]
    NotEncrypted,

    #[error("Decryption failed: data may be corrupted or wrong key")]
    DecryptionFailed,

    #[error("Key manager is not initialized")]
    NotInitialized,

    #[error("Key manager is already initialized")]
    AlreadyInitialized,

    #[error("Serialization failed")]
    Serialization,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// State of a synced item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Received, ciphertext held, not yet decrypted.
    Encrypted,
    /// Successfully decrypted; ciphertext discarded.
    Decrypted,
    /// Awaiting transfer or confirmation.
    Pending,
}

/// An encrypted item in the sync mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncedData {
    /// Name of the connection this item arrived through.
    pub connection: String,
    /// Application data type (profile, workspace, archive, ...).
    pub data_type: String,
    /// Item name, unique per (connection, data_type).
    pub name: String,
    /// AES-256-GCM ciphertext (tag included).
    pub ciphertext: Vec<u8>,
    /// AEAD nonce for this item.
    pub nonce: Vec<u8>,
    /// SHA-256 of the sealed payload, hex. Informational.
    pub checksum: String,
    pub state: SyncState,
    pub synced_at: u64,
    pub decrypted_at: Option<u64>,
}

impl SyncedData {
    /// Wraps a sealed payload (`nonce || ciphertext`) received from a peer.
    pub fn new_encrypted(
        connection: &str,
        data_type: &str,
        name: &str,
        sealed: &[u8],
    ) -> Result<Self, StoreError> {
        if sealed.len() < crate::crypto::encryption::NONCE_SIZE {
            return Err(StoreError::DecryptionFailed);
        }
        let (nonce, ciphertext) = sealed.split_at(crate::crypto::encryption::NONCE_SIZE);
        let checksum = hex::encode(digest::digest(&digest::SHA256, sealed));

        Ok(SyncedData {
            connection: connection.to_string(),
            data_type: data_type.to_string(),
            name: name.to_string(),
            ciphertext: ciphertext.to_vec(),
            nonce: nonce.to_vec(),
            checksum,
            state: SyncState::Encrypted,
            synced_at: now_unix(),
            decrypted_at: None,
        })
    }

    fn sealed(&self) -> Vec<u8> {
        let mut sealed = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        sealed.extend_from_slice(&self.nonce);
        sealed.extend_from_slice(&self.ciphertext);
        sealed
    }
}

/// Outcome of a batch decryption pass.
///
/// Partial success is expected, not exceptional: per-item failures are
/// collected while the batch continues.
#[derive(Debug)]
pub struct DecryptAllOutcome {
    /// Number of items successfully transitioned to `Decrypted`.
    pub decrypted: usize,
    /// Item name paired with the error that kept it encrypted.
    pub errors: Vec<(String, StoreError)>,
}

type ItemKey = (String, String, String);

/// Keyed mailbox of encrypted items pending decryption.
///
/// Items are addressed by `(connection, data_type, name)`. The map is
/// mutex-guarded; concurrent receivers may add items while a decryption
/// batch runs.
pub struct SyncStore {
    items: Mutex<HashMap<ItemKey, SyncedData>>,
}

impl Default for SyncStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncStore {
    pub fn new() -> Self {
        SyncStore {
            items: Mutex::new(HashMap::new()),
        }
    }

    /// Adds an item, replacing any existing item with the same key.
    pub fn add(&self, item: SyncedData) {
        let key = (
            item.connection.clone(),
            item.data_type.clone(),
            item.name.clone(),
        );
        self.items.lock().expect("sync store lock").insert(key, item);
    }

    /// Returns a copy of the item, if present.
    pub fn get(&self, connection: &str, data_type: &str, name: &str) -> Option<SyncedData> {
        self.items
            .lock()
            .expect("sync store lock")
            .get(&key_of(connection, data_type, name))
            .cloned()
    }

    /// Lists all items for a connection.
    pub fn list_for_connection(&self, connection: &str) -> Vec<SyncedData> {
        let items = self.items.lock().expect("sync store lock");
        let mut found: Vec<SyncedData> = items
            .values()
            .filter(|item| item.connection == connection)
            .cloned()
            .collect();
        found.sort_by(|a, b| (&a.data_type, &a.name).cmp(&(&b.data_type, &b.name)));
        found
    }

    /// Lists all items in the given state.
    pub fn list_by_state(&self, state: SyncState) -> Vec<SyncedData> {
        let items = self.items.lock().expect("sync store lock");
        let mut found: Vec<SyncedData> = items
            .values()
            .filter(|item| item.state == state)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            (&a.connection, &a.data_type, &a.name).cmp(&(&b.connection, &b.data_type, &b.name))
        });
        found
    }

    /// Removes an item. Returns true if it existed.
    pub fn remove(&self, connection: &str, data_type: &str, name: &str) -> bool {
        self.items
            .lock()
            .expect("sync store lock")
            .remove(&key_of(connection, data_type, name))
            .is_some()
    }

    /// Decrypts one item and returns the plaintext transiently.
    ///
    /// On success the stored item transitions to `Decrypted` and its
    /// ciphertext is discarded. The plaintext only exists in the returned
    /// buffer.
    pub fn decrypt_item(
        &self,
        connection: &str,
        data_type: &str,
        name: &str,
        key: &SymmetricKey,
    ) -> Result<Vec<u8>, StoreError> {
        let mut items = self.items.lock().expect("sync store lock");
        let item = items
            .get_mut(&key_of(connection, data_type, name))
            .ok_or(StoreError::NotFound)?;

        if item.state != SyncState::Encrypted {
            return Err(StoreError::NotEncrypted);
        }

        let plaintext =
            decrypt_with_key(key, &item.sealed()).map_err(|_| StoreError::DecryptionFailed)?;

        item.state = SyncState::Decrypted;
        item.decrypted_at = Some(now_unix());
        item.ciphertext.clear();
        item.nonce.clear();

        Ok(plaintext)
    }

    /// Attempts to decrypt every `Encrypted` item for a connection.
    ///
    /// Per-item failures are collected and do not stop the batch. Successes
    /// transition to `Decrypted`; their plaintext is wiped, not returned.
    pub fn decrypt_all(&self, connection: &str, key: &SymmetricKey) -> DecryptAllOutcome {
        let mut items = self.items.lock().expect("sync store lock");
        let mut outcome = DecryptAllOutcome {
            decrypted: 0,
            errors: Vec::new(),
        };

        for item in items.values_mut() {
            if item.connection != connection || item.state != SyncState::Encrypted {
                continue;
            }

            match decrypt_with_key(key, &item.sealed()) {
                Ok(mut plaintext) => {
                    plaintext.zeroize();
                    item.state = SyncState::Decrypted;
                    item.decrypted_at = Some(now_unix());
                    item.ciphertext.clear();
                    item.nonce.clear();
                    outcome.decrypted += 1;
                }
                Err(_) => {
                    outcome
                        .errors
                        .push((item.name.clone(), StoreError::DecryptionFailed));
                }
            }
        }

        outcome
    }
}

fn key_of(connection: &str, data_type: &str, name: &str) -> ItemKey {
    (
        connection.to_string(),
        data_type.to_string(),
        name.to_string(),
    )
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
