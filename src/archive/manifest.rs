// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Archive Manifest
//!
//! `manifest.json` inside the container describes the archived repositories.
//! The zip checksum is informational: the AEAD tag already authenticates the
//! container, so it is reported for display but never used as a gate.

use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// Per-repository metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    /// Directory name of the repository inside the archive.
    pub name: String,
    /// Origin remote URL, if the repo has one.
    pub origin_url: Option<String>,
    /// Short HEAD commit hash, if resolvable.
    pub head_commit: Option<String>,
    pub file_count: u64,
    pub size_bytes: u64,
}

/// Contents listing stored as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub version: u32,
    pub created_at: u64,
    pub repos: Vec<RepoEntry>,
    pub total_size_bytes: u64,
    /// SHA-256 of the unencrypted zip, hex. Filled when the container bytes
    /// exist; empty inside the container itself.
    #[serde(default)]
    pub zip_sha256: String,
    pub encryption_algorithm: String,
    pub kdf_algorithm: String,
}

impl ArchiveManifest {
    pub(crate) fn new(repos: Vec<RepoEntry>, created_at: u64) -> Self {
        let total_size_bytes = repos.iter().map(|r| r.size_bytes).sum();
        ArchiveManifest {
            version: MANIFEST_VERSION,
            created_at,
            repos,
            total_size_bytes,
            zip_sha256: String::new(),
            encryption_algorithm: "aes-256-gcm".to_string(),
            kdf_algorithm: "pbkdf2-sha256".to_string(),
        }
    }
}
