// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Key Management Error Types

use thiserror::Error;

/// Errors that can occur while handling pairing keys and connections.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Key version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Key is missing required field: {0}")]
    MissingField(&'static str),

    #[error("Port must be in range 1-65535")]
    InvalidPort,

    #[error("Key has expired")]
    Expired,

    #[error("Invalid key encoding")]
    InvalidEncoding,

    #[error("Wrong password")]
    WrongPassword,

    #[error("Cryptographic operation failed")]
    CryptoFailed,
}
