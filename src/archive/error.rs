// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Archive Error Types

use thiserror::Error;

/// Errors that can occur while creating or reading repository archives.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Not a Clonr repository archive")]
    InvalidFormat,

    #[error("Unsupported archive version {0}")]
    UnsupportedVersion(u8),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: wrong password or corrupted archive")]
    DecryptionFailed,

    #[error("Archive entry escapes the target directory: {0}")]
    PathTraversal(String),

    #[error("Invalid exclude pattern: {0}")]
    InvalidPattern(String),

    #[error("Duplicate repository name: {0}")]
    DuplicateRepo(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Archive manifest is missing or invalid")]
    InvalidManifest,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Container error: {0}")]
    Container(#[from] zip::result::ZipError),
}
