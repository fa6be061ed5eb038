// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Encrypted Repository Archives
//!
//! Container format for offline transfer:
//! `"CLONR-REPO" (10 bytes) || version (1 byte) || AES-256-GCM ciphertext`
//! where the ciphertext wraps a zip holding `manifest.json` plus each
//! repository's tree under `<repoName>/`.
//!
//! The manifest's zip checksum is informational only and is never verified
//! on read: the AEAD tag already authenticates every byte of the container.

pub mod error;
pub mod exclude;
mod git;
pub mod manifest;

pub use error::ArchiveError;
pub use exclude::{ExcludeRules, DEFAULT_EXCLUDE_PATTERNS};
pub use manifest::{ArchiveManifest, RepoEntry, MANIFEST_VERSION};

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ring::digest;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::crypto;

/// Container magic bytes.
pub const ARCHIVE_MAGIC: &[u8; 10] = b"CLONR-REPO";

/// Current container format version.
pub const ARCHIVE_VERSION: u8 = 1;

/// Name of the manifest entry inside the container.
const MANIFEST_ENTRY: &str = "manifest.json";

/// Options for archive creation.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Include each repository's `.git` directory.
    pub include_git: bool,
    /// Start from [`DEFAULT_EXCLUDE_PATTERNS`].
    pub use_default_excludes: bool,
    /// Additional exclusion patterns.
    pub exclude_patterns: Vec<String>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        ArchiveOptions {
            include_git: false,
            use_default_excludes: true,
            exclude_patterns: Vec::new(),
        }
    }
}

/// Creates an encrypted archive of the given repositories.
///
/// Walks each tree with the exclusion rules applied, records per-repo
/// metadata, encrypts the inner zip under `password` (PBKDF2, fresh salt)
/// and writes the container to `dest`. Returns the manifest with the
/// informational zip checksum filled in.
pub fn create_repo_archive(
    repos: &[PathBuf],
    dest: &Path,
    password: &str,
    options: &ArchiveOptions,
) -> Result<ArchiveManifest, ArchiveError> {
    let mut patterns: Vec<String> = if options.use_default_excludes {
        DEFAULT_EXCLUDE_PATTERNS.iter().map(|p| p.to_string()).collect()
    } else {
        Vec::new()
    };
    patterns.extend(options.exclude_patterns.iter().cloned());
    let rules = ExcludeRules::new(&patterns)?;

    let mut entries = Vec::with_capacity(repos.len());
    let mut archive_files: Vec<(String, PathBuf)> = Vec::new();
    let mut seen_names = HashSet::new();

    for repo in repos {
        if !repo.is_dir() {
            return Err(ArchiveError::NotADirectory(repo.display().to_string()));
        }
        let name = repo
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ArchiveError::NotADirectory(repo.display().to_string()))?;
        if !seen_names.insert(name.clone()) {
            return Err(ArchiveError::DuplicateRepo(name));
        }

        let mut files = Vec::new();
        collect_files(repo, repo, &rules, options.include_git, &mut files)?;
        files.sort();

        let mut size_bytes = 0u64;
        for rel in &files {
            size_bytes += fs::metadata(repo.join(rel))?.len();
        }

        debug!(repo = %name, files = files.len(), size_bytes, "repository walked");
        entries.push(RepoEntry {
            name: name.clone(),
            origin_url: git::read_origin_url(repo),
            head_commit: git::read_head_commit(repo),
            file_count: files.len() as u64,
            size_bytes,
        });

        for rel in files {
            archive_files.push((format!("{name}/{rel}"), repo.join(&rel)));
        }
    }

    let mut manifest = ArchiveManifest::new(entries, now_unix());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(MANIFEST_ENTRY, file_options)?;
    let manifest_json =
        serde_json::to_vec_pretty(&manifest).map_err(|_| ArchiveError::InvalidManifest)?;
    writer.write_all(&manifest_json)?;

    for (zip_path, fs_path) in &archive_files {
        writer.start_file(zip_path.clone(), file_options)?;
        let mut file = File::open(fs_path)?;
        io::copy(&mut file, &mut writer)?;
    }

    let zip_bytes = writer.finish()?.into_inner();
    manifest.zip_sha256 = hex::encode(digest::digest(&digest::SHA256, &zip_bytes));

    let ciphertext =
        crypto::encrypt(password, &zip_bytes).map_err(|_| ArchiveError::EncryptionFailed)?;

    let mut out = File::create(dest)?;
    out.write_all(ARCHIVE_MAGIC)?;
    out.write_all(&[ARCHIVE_VERSION])?;
    out.write_all(&ciphertext)?;

    info!(
        dest = %dest.display(),
        repos = manifest.repos.len(),
        total_size = manifest.total_size_bytes,
        "archive created"
    );
    Ok(manifest)
}

/// Lists an archive's contents without extracting anything.
pub fn list_archive_contents(
    path: &Path,
    password: &str,
) -> Result<ArchiveManifest, ArchiveError> {
    let zip_bytes = decrypt_container(path, password)?;
    let mut manifest = read_manifest(&zip_bytes)?;
    manifest.zip_sha256 = hex::encode(digest::digest(&digest::SHA256, &zip_bytes));
    Ok(manifest)
}

/// Extracts an archive under `target_dir`.
///
/// Every entry name is validated against directory escape before anything
/// is written; a single offending entry aborts the whole extraction with
/// the target untouched.
pub fn extract_repo_archive(
    path: &Path,
    password: &str,
    target_dir: &Path,
) -> Result<ArchiveManifest, ArchiveError> {
    let zip_bytes = decrypt_container(path, password)?;
    let zip_sha256 = hex::encode(digest::digest(&digest::SHA256, &zip_bytes));

    let mut archive = ZipArchive::new(Cursor::new(&zip_bytes))?;

    // Pre-scan: reject any escaping entry before the first write.
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        entry_rel_path(&entry)?;
    }

    let mut manifest = read_manifest(&zip_bytes)?;
    manifest.zip_sha256 = zip_sha256;

    fs::create_dir_all(target_dir)?;
    let canonical_target = target_dir.canonicalize()?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.name() == MANIFEST_ENTRY {
            continue;
        }
        let rel = entry_rel_path(&entry)?;
        let dest = canonical_target.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
            // Canonicalized double-check: symlinked parents must not lead
            // outside the target.
            let canonical_parent = parent.canonicalize()?;
            if !canonical_parent.starts_with(&canonical_target) {
                return Err(ArchiveError::PathTraversal(entry.name().to_string()));
            }
        }

        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
    }

    info!(
        source = %path.display(),
        target = %canonical_target.display(),
        repos = manifest.repos.len(),
        "archive extracted"
    );
    Ok(manifest)
}

fn decrypt_container(path: &Path, password: &str) -> Result<Vec<u8>, ArchiveError> {
    let data = fs::read(path)?;

    if data.len() <= ARCHIVE_MAGIC.len() || &data[..ARCHIVE_MAGIC.len()] != ARCHIVE_MAGIC {
        return Err(ArchiveError::InvalidFormat);
    }
    let version = data[ARCHIVE_MAGIC.len()];
    if version > ARCHIVE_VERSION {
        return Err(ArchiveError::UnsupportedVersion(version));
    }

    crypto::decrypt(password, &data[ARCHIVE_MAGIC.len() + 1..])
        .map_err(|_| ArchiveError::DecryptionFailed)
}

fn read_manifest(zip_bytes: &[u8]) -> Result<ArchiveManifest, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))?;
    let mut entry = archive
        .by_name(MANIFEST_ENTRY)
        .map_err(|_| ArchiveError::InvalidManifest)?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents)?;
    serde_json::from_str(&contents).map_err(|_| ArchiveError::InvalidManifest)
}

/// Returns the entry's path relative to the extraction root, rejecting
/// absolute paths, parent-directory components and other escapes.
fn entry_rel_path(entry: &zip::read::ZipFile<'_>) -> Result<PathBuf, ArchiveError> {
    let name = entry.name();
    if name.contains('\\') {
        return Err(ArchiveError::PathTraversal(name.to_string()));
    }
    entry
        .enclosed_name()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| ArchiveError::PathTraversal(name.to_string()))
}

fn collect_files(
    root: &Path,
    dir: &Path,
    rules: &ExcludeRules,
    include_git: bool,
    out: &mut Vec<String>,
) -> Result<(), ArchiveError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        // Symlinks are skipped: following them could walk outside the repo.
        if file_type.is_symlink() {
            continue;
        }

        let rel = rel_string(root, &path);
        if !include_git && (rel == ".git" || rel.starts_with(".git/")) {
            continue;
        }
        if rules.is_excluded(&rel) {
            continue;
        }

        if file_type.is_dir() {
            collect_files(root, &path, rules, include_git, out)?;
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

fn rel_string(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}
