// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exclusion Rules
//!
//! Two pattern forms are supported:
//!
//! - `dir/**` — recursive prefix: excludes `dir` itself and everything
//!   under it.
//! - classic globs — matched against both the entry's basename and its full
//!   relative path, so `*.pyc` catches `src/file.pyc` and `.env.*` catches
//!   `.env.local` without touching `config.env`.

use glob::Pattern;

use super::error::ArchiveError;

/// Patterns applied when the caller does not opt out of the defaults:
/// dependency caches, build artifacts, and secret files.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "node_modules/**",
    "target/**",
    "vendor/**",
    "__pycache__/**",
    ".venv/**",
    "dist/**",
    "build/**",
    "*.pyc",
    "*.o",
    "*.class",
    ".env",
    ".env.*",
    "*.pem",
    "*.key",
];

enum Rule {
    /// `dir/**`: the directory itself and its whole subtree.
    RecursivePrefix(String),
    /// Classic glob, tried on basename and full relative path.
    Glob(Pattern),
}

/// Compiled exclusion rules for one archive run.
pub struct ExcludeRules {
    rules: Vec<Rule>,
}

impl ExcludeRules {
    /// Compiles patterns, rejecting malformed globs.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ArchiveError> {
        let mut rules = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if let Some(prefix) = pattern.strip_suffix("/**") {
                if prefix.is_empty() {
                    return Err(ArchiveError::InvalidPattern(pattern.to_string()));
                }
                rules.push(Rule::RecursivePrefix(prefix.to_string()));
            } else {
                let compiled = Pattern::new(pattern)
                    .map_err(|_| ArchiveError::InvalidPattern(pattern.to_string()))?;
                rules.push(Rule::Glob(compiled));
            }
        }
        Ok(ExcludeRules { rules })
    }

    /// Checks a `/`-separated path relative to the repository root.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        let basename = rel_path.rsplit('/').next().unwrap_or(rel_path);

        self.rules.iter().any(|rule| match rule {
            Rule::RecursivePrefix(prefix) => {
                rel_path == prefix || rel_path.starts_with(&format!("{prefix}/"))
            }
            Rule::Glob(pattern) => pattern.matches(rel_path) || pattern.matches(basename),
        })
    }
}
