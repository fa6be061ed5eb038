// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Repository Metadata Extraction
//!
//! Reads the origin URL and short HEAD commit straight from the `.git`
//! directory. Best-effort: a repo without remotes or commits simply yields
//! `None`, never an error.

use std::fs;
use std::path::Path;

/// Length of the short commit hash recorded in the manifest.
const SHORT_HASH_LEN: usize = 7;

/// Parses the `origin` remote URL from `.git/config`.
pub(crate) fn read_origin_url(repo: &Path) -> Option<String> {
    let config = fs::read_to_string(repo.join(".git").join("config")).ok()?;

    let mut in_origin = false;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_origin = line == "[remote \"origin\"]";
            continue;
        }
        if in_origin {
            if let Some(value) = line.strip_prefix("url") {
                let url = value.trim_start().strip_prefix('=')?.trim();
                if !url.is_empty() {
                    return Some(url.to_string());
                }
            }
        }
    }
    None
}

/// Resolves HEAD to a short commit hash, following symbolic refs.
pub(crate) fn read_head_commit(repo: &Path) -> Option<String> {
    let git_dir = repo.join(".git");
    let head = fs::read_to_string(git_dir.join("HEAD")).ok()?;
    let head = head.trim();

    let full_hash = if let Some(ref_name) = head.strip_prefix("ref: ") {
        resolve_ref(&git_dir, ref_name.trim())?
    } else {
        head.to_string()
    };

    if full_hash.len() < SHORT_HASH_LEN || !full_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(full_hash[..SHORT_HASH_LEN].to_string())
}

fn resolve_ref(git_dir: &Path, ref_name: &str) -> Option<String> {
    // Loose ref first.
    if let Ok(contents) = fs::read_to_string(git_dir.join(ref_name)) {
        let hash = contents.trim();
        if !hash.is_empty() {
            return Some(hash.to_string());
        }
    }

    // Fall back to packed-refs.
    let packed = fs::read_to_string(git_dir.join("packed-refs")).ok()?;
    for line in packed.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with('^') {
            continue;
        }
        if let Some((hash, name)) = line.split_once(' ') {
            if name == ref_name {
                return Some(hash.to_string());
            }
        }
    }
    None
}
