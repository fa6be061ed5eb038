// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Server Handshake
//!
//! Maintains the pending-registration set and turns display keys into
//! durable, verifiable client records. The pending set is owned by the
//! handshake and mutex-guarded: concurrent pairing attempts from different
//! clients are expected. Registered clients are persisted through an
//! injected [`KeyedStore`].

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::client::{generate_challenge, HandshakeState, MachineInfo};
use super::display_key::{derive_client_key, parse_display_key};
use super::error::HandshakeError;
use crate::crypto::{compute_key_hint, hash_password, verify_password};
use crate::store::KeyedStore;

/// How long an abandoned pending registration is kept before eviction.
pub const PENDING_REGISTRATION_TTL: Duration = Duration::from_secs(15 * 60);

/// Key prefix for persisted client records.
const CLIENT_KEY_PREFIX: &str = "client/";

/// A pairing attempt in progress, held only until completion or rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub client_id: Uuid,
    pub client_name: String,
    pub machine: MachineInfo,
    pub state: HandshakeState,
    pub challenge_token: String,
    pub created_at: u64,
}

/// Durable status of a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientStatus {
    Active,
    Suspended,
    Revoked,
}

/// A successfully paired client.
///
/// Holds the Argon2id hash of the display key, never the key itself;
/// verification re-derives and compares in constant time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredClient {
    pub client_id: Uuid,
    pub client_name: String,
    pub machine: MachineInfo,
    pub key_hash: Vec<u8>,
    pub key_salt: Vec<u8>,
    /// Non-secret 2-byte hex identifier of the derived full key.
    pub key_hint: String,
    pub status: ClientStatus,
    pub sync_count: u64,
    pub last_seen_at: Option<u64>,
    pub last_seen_ip: Option<String>,
    pub registered_at: u64,
}

/// Server side of the pairing handshake.
pub struct ServerHandshake<S: KeyedStore> {
    pending: Mutex<HashMap<Uuid, ClientRegistration>>,
    clients: S,
    pending_ttl: Duration,
}

impl<S: KeyedStore> ServerHandshake<S> {
    pub fn new(clients: S) -> Self {
        ServerHandshake {
            pending: Mutex::new(HashMap::new()),
            clients,
            pending_ttl: PENDING_REGISTRATION_TTL,
        }
    }

    /// Overrides the pending-registration TTL (mostly for tests).
    pub fn with_pending_ttl(clients: S, ttl: Duration) -> Self {
        ServerHandshake {
            pending: Mutex::new(HashMap::new()),
            clients,
            pending_ttl: ttl,
        }
    }

    /// Starts a pairing attempt and returns `(client_id, challenge)`.
    ///
    /// The challenge binds the attempt; the client must echo it into its own
    /// state machine before generating a key.
    pub fn initiate_handshake(
        &self,
        client_name: &str,
        machine: MachineInfo,
    ) -> Result<(Uuid, String), HandshakeError> {
        let client_id = Uuid::new_v4();
        let challenge = generate_challenge();

        let registration = ClientRegistration {
            client_id,
            client_name: client_name.to_string(),
            machine,
            state: HandshakeState::Challenged,
            challenge_token: challenge.clone(),
            created_at: now_unix(),
        };

        let mut pending = self.pending.lock().expect("pending registrations lock");
        evict_expired(&mut pending, self.pending_ttl);
        pending.insert(client_id, registration);

        debug!(client = %client_id, name = client_name, "pairing initiated");
        Ok((client_id, challenge))
    }

    /// Number of pairing attempts currently pending.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().expect("pending registrations lock").len()
    }

    /// Removes pending registrations older than the TTL. Returns the count.
    pub fn sweep_expired(&self) -> usize {
        let mut pending = self.pending.lock().expect("pending registrations lock");
        evict_expired(&mut pending, self.pending_ttl)
    }

    /// Registers a client from its transcribed display key.
    ///
    /// One-shot: the pending entry is removed on success, so a second call
    /// for the same client_id fails with `NoPendingRegistration`. A
    /// malformed display key leaves the entry pending for a retry.
    pub fn register_client(
        &self,
        client_id: Uuid,
        display_key_text: &str,
    ) -> Result<RegisteredClient, HandshakeError> {
        let mut pending = self.pending.lock().expect("pending registrations lock");
        let registration = pending
            .get(&client_id)
            .ok_or(HandshakeError::NoPendingRegistration)?
            .clone();

        let display_key = parse_display_key(display_key_text)?;

        // Full key only feeds the non-secret hint; verification hashes the
        // display key itself.
        let full_key = derive_client_key(&display_key)?;
        let key_hint = compute_key_hint(&full_key);
        let (key_hash, key_salt) =
            hash_password(&display_key).map_err(|_| HandshakeError::CryptoFailed)?;

        let client = RegisteredClient {
            client_id,
            client_name: registration.client_name,
            machine: registration.machine,
            key_hash,
            key_salt,
            key_hint,
            status: ClientStatus::Active,
            sync_count: 0,
            last_seen_at: None,
            last_seen_ip: None,
            registered_at: now_unix(),
        };

        self.persist(&client)?;
        pending.remove(&client_id);

        info!(client = %client_id, hint = %client.key_hint, "client registered");
        Ok(client)
    }

    /// Rejects and discards a pending registration.
    pub fn reject_registration(&self, client_id: Uuid) -> Result<(), HandshakeError> {
        let mut pending = self.pending.lock().expect("pending registrations lock");
        pending
            .remove(&client_id)
            .map(|_| ())
            .ok_or(HandshakeError::NoPendingRegistration)
    }

    /// Verifies a presented display key against a registered client.
    ///
    /// Re-derives and compares in constant time on every authentication;
    /// the raw key is never stored.
    pub fn verify_client_key(
        &self,
        client_id: Uuid,
        display_key_text: &str,
    ) -> Result<bool, HandshakeError> {
        let client = self.get_client(client_id)?;
        let display_key = parse_display_key(display_key_text)?;
        Ok(verify_password(
            &display_key,
            &client.key_salt,
            &client.key_hash,
        ))
    }

    /// Loads a registered client.
    pub fn get_client(&self, client_id: Uuid) -> Result<RegisteredClient, HandshakeError> {
        let encoded = self
            .clients
            .get(&client_key(client_id))?
            .ok_or(HandshakeError::ClientNotFound)?;
        serde_json::from_slice(&encoded).map_err(|_| HandshakeError::ClientNotFound)
    }

    /// Lists all registered clients.
    pub fn list_clients(&self) -> Result<Vec<RegisteredClient>, HandshakeError> {
        let entries = self.clients.list(CLIENT_KEY_PREFIX)?;
        let mut clients = Vec::with_capacity(entries.len());
        for (_, value) in entries {
            if let Ok(client) = serde_json::from_slice::<RegisteredClient>(&value) {
                clients.push(client);
            }
        }
        Ok(clients)
    }

    /// Updates a client's durable status.
    pub fn set_client_status(
        &self,
        client_id: Uuid,
        status: ClientStatus,
    ) -> Result<(), HandshakeError> {
        let mut client = self.get_client(client_id)?;
        client.status = status;
        self.persist(&client)
    }

    /// Records a successful sync from a client.
    pub fn record_client_seen(
        &self,
        client_id: Uuid,
        ip: Option<&str>,
    ) -> Result<(), HandshakeError> {
        let mut client = self.get_client(client_id)?;
        client.sync_count += 1;
        client.last_seen_at = Some(now_unix());
        client.last_seen_ip = ip.map(|s| s.to_string());
        self.persist(&client)
    }

    /// Removes a revoked client's record entirely.
    pub fn remove_client(&self, client_id: Uuid) -> Result<bool, HandshakeError> {
        Ok(self.clients.remove(&client_key(client_id))?)
    }

    fn persist(&self, client: &RegisteredClient) -> Result<(), HandshakeError> {
        let encoded = serde_json::to_vec(client).map_err(|_| HandshakeError::CryptoFailed)?;
        self.clients.put(&client_key(client.client_id), &encoded)?;
        Ok(())
    }
}

fn client_key(client_id: Uuid) -> String {
    format!("{}{}", CLIENT_KEY_PREFIX, client_id)
}

fn evict_expired(pending: &mut HashMap<Uuid, ClientRegistration>, ttl: Duration) -> usize {
    let cutoff = now_unix().saturating_sub(ttl.as_secs());
    let before = pending.len();
    pending.retain(|_, reg| reg.created_at >= cutoff);
    before - pending.len()
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
