// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connectivity Error Types

use thiserror::Error;

/// Errors that can occur during NAT discovery and channel establishment.
#[derive(Error, Debug)]
pub enum ConnectivityError {
    #[error("No STUN servers configured")]
    NoServers,

    #[error("STUN query failed: {0}")]
    StunFailed(String),

    #[error("Malformed STUN response")]
    MalformedResponse,

    #[error("Connectivity attempt timed out")]
    Timeout,

    #[error("Agent is closed")]
    Closed,

    #[error("Invalid agent state: {0}")]
    InvalidState(String),

    #[error("Invalid ICE credentials")]
    InvalidCredentials,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
