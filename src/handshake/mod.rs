// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pairing Handshake Protocol
//!
//! Turns a short human-transcribable display key into a registered,
//! independently-verifiable per-client secret. Client and server each run a
//! strict state machine; no transition may be skipped.

pub mod client;
pub mod display_key;
pub mod error;
pub mod server;

pub use client::{generate_challenge, Handshake, HandshakeState, MachineInfo};
pub use display_key::{
    derive_client_key, format_display_key, generate_display_key, parse_display_key,
    DISPLAY_KEY_LEN,
};
pub use error::HandshakeError;
pub use server::{
    ClientRegistration, ClientStatus, RegisteredClient, ServerHandshake,
    PENDING_REGISTRATION_TTL,
};
