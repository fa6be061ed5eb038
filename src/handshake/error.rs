// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Handshake Error Types

use thiserror::Error;

/// Errors that can occur during the pairing handshake.
#[derive(Error, Debug)]
pub enum HandshakeError {
    #[error("Invalid handshake state: {0}")]
    InvalidState(String),

    #[error("Invalid challenge token")]
    InvalidChallenge,

    #[error("Invalid display key: {0}")]
    InvalidDisplayKey(String),

    #[error("No pending registration for this client")]
    NoPendingRegistration,

    #[error("Client not found")]
    ClientNotFound,

    #[error("Cryptographic operation failed")]
    CryptoFailed,

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),
}
