// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Client Handshake State Machine
//!
//! Drives a pairing attempt from initiation through challenge binding, key
//! generation and completion. Transitions are checked; skipping a step is an
//! error, not undefined behavior.

use ring::rand::SystemRandom;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use super::display_key::{derive_client_key, generate_display_key};
use super::error::HandshakeError;
use crate::crypto::SymmetricKey;

/// Length of a challenge token in hex characters (32 random bytes).
const CHALLENGE_LEN: usize = 64;

/// State of a pairing attempt.
///
/// `Initiated → Challenged → KeyGenerated → [KeyPending] → Completed | Rejected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandshakeState {
    Initiated,
    Challenged,
    KeyGenerated,
    KeyPending,
    Completed,
    Rejected,
}

/// Informational machine metadata sent along with a pairing attempt.
///
/// Not security-relevant; shown to the operator so they can recognize the
/// device they are approving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
}

impl MachineInfo {
    /// Best-effort detection from the environment.
    pub fn detect() -> Self {
        MachineInfo {
            hostname: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("COMPUTERNAME"))
                .unwrap_or_else(|_| "unknown".to_string()),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Client side of the pairing handshake.
pub struct Handshake {
    client_id: Uuid,
    client_name: String,
    machine: MachineInfo,
    state: HandshakeState,
    challenge_token: Option<String>,
    display_key: Option<String>,
    full_key: Option<SymmetricKey>,
    started_at: u64,
    completed_at: Option<u64>,
}

impl Handshake {
    /// Starts a new pairing attempt in `Initiated`.
    pub fn new(client_name: &str, machine: MachineInfo) -> Self {
        Handshake {
            client_id: Uuid::new_v4(),
            client_name: client_name.to_string(),
            machine,
            state: HandshakeState::Initiated,
            challenge_token: None,
            display_key: None,
            full_key: None,
            started_at: now_unix(),
            completed_at: None,
        }
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    pub fn machine(&self) -> &MachineInfo {
        &self.machine
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<u64> {
        self.completed_at
    }

    /// Returns the challenge token bound to this attempt.
    pub fn challenge_token(&self) -> Option<&str> {
        self.challenge_token.as_deref()
    }

    /// Returns the generated display key, if any.
    pub fn display_key(&self) -> Option<&str> {
        self.display_key.as_deref()
    }

    /// Returns the derived full key, if any.
    pub fn full_key(&self) -> Option<&SymmetricKey> {
        self.full_key.as_ref()
    }

    /// Binds the server's challenge to this attempt.
    ///
    /// Moves `Initiated → Challenged`. Binding the token here is what
    /// prevents a stale or replayed completion from matching.
    pub fn set_challenge(&mut self, token: &str) -> Result<(), HandshakeError> {
        if self.state != HandshakeState::Initiated {
            return Err(HandshakeError::InvalidState(
                "challenge can only be set from Initiated".into(),
            ));
        }
        if token.len() != CHALLENGE_LEN || !token.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HandshakeError::InvalidChallenge);
        }

        self.challenge_token = Some(token.to_lowercase());
        self.state = HandshakeState::Challenged;
        Ok(())
    }

    /// Generates the display key and derives the full key from it.
    ///
    /// Moves `Challenged → KeyGenerated`. The display key is the sole source
    /// of entropy; the full key adds none.
    pub fn generate_key(&mut self) -> Result<String, HandshakeError> {
        if self.state != HandshakeState::Challenged {
            return Err(HandshakeError::InvalidState(
                "key can only be generated from Challenged".into(),
            ));
        }

        let display_key = generate_display_key();
        let full_key = derive_client_key(&display_key)?;

        self.display_key = Some(display_key.clone());
        self.full_key = Some(full_key);
        self.state = HandshakeState::KeyGenerated;
        Ok(display_key)
    }

    /// Marks the key as transcribed but not yet confirmed by the server.
    ///
    /// Moves `KeyGenerated → KeyPending`. Optional bracket state.
    pub fn mark_key_pending(&mut self) -> Result<(), HandshakeError> {
        if self.state != HandshakeState::KeyGenerated {
            return Err(HandshakeError::InvalidState(
                "key can only be pending after KeyGenerated".into(),
            ));
        }
        self.state = HandshakeState::KeyPending;
        Ok(())
    }

    /// Completes the handshake with a timestamp.
    ///
    /// Moves `KeyGenerated | KeyPending → Completed`.
    pub fn complete(&mut self) -> Result<(), HandshakeError> {
        match self.state {
            HandshakeState::KeyGenerated | HandshakeState::KeyPending => {
                self.state = HandshakeState::Completed;
                self.completed_at = Some(now_unix());
                Ok(())
            }
            _ => Err(HandshakeError::InvalidState(
                "completion requires a generated key".into(),
            )),
        }
    }

    /// Rejects the attempt from any non-terminal state.
    pub fn reject(&mut self) -> Result<(), HandshakeError> {
        match self.state {
            HandshakeState::Completed | HandshakeState::Rejected => Err(
                HandshakeError::InvalidState("handshake already finished".into()),
            ),
            _ => {
                self.state = HandshakeState::Rejected;
                Ok(())
            }
        }
    }
}

/// Generates a challenge token: 32 random bytes, hex.
pub fn generate_challenge() -> String {
    let rng = SystemRandom::new();
    let bytes = ring::rand::generate::<[u8; 32]>(&rng)
        .expect("System RNG should not fail")
        .expose();
    hex::encode(bytes)
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
