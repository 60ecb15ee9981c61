//! Ignore pattern handling for template stores.
//! Processes .stencilignore files to exclude paths from the store walk, and
//! compiles the canonical record's exemption patterns with the same rules.

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use log::debug;
use std::{fs::read_to_string, path::Path};

/// Stencil's ignore file name.
pub const IGNORE_FILE: &str = ".stencilignore";

/// Patterns excluded from every store walk: version control internals, the
/// manifest and the ignore file itself, and editor droppings.
pub const DEFAULT_PATTERNS: [&str; 8] = [
    ".git",
    ".git/**",
    ".hg",
    ".hg/**",
    "stencil.json",
    "stencil.yml",
    "stencil.yaml",
    "**/.DS_Store",
];

/// Reads and processes an ignore file into a set of glob patterns, merged
/// with [`DEFAULT_PATTERNS`].
///
/// # Notes
/// - If the ignore file doesn't exist, only the default patterns apply
/// - Blank lines and lines starting with `#` are skipped
/// - An invalid pattern is an [`Error::IgnorePattern`]
pub fn parse_ignore_file<P: AsRef<Path>>(ignore_path: P) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new(IGNORE_FILE).map_err(|e| Error::IgnorePattern(e.to_string()))?);
    for pattern in DEFAULT_PATTERNS {
        builder.add(Glob::new(pattern).map_err(|e| Error::IgnorePattern(e.to_string()))?);
    }

    if let Ok(contents) = read_to_string(ignore_path.as_ref()) {
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            builder.add(Glob::new(line).map_err(|e| {
                Error::IgnorePattern(format!("{IGNORE_FILE} loading failed: {e}"))
            })?);
        }
    } else {
        debug!("{IGNORE_FILE} does not exist");
    }

    builder
        .build()
        .map_err(|e| Error::IgnorePattern(format!("{IGNORE_FILE} loading failed: {e}")))
}

/// Compiles a list of glob patterns into a matcher. Used for the canonical
/// record's drift exemptions.
pub fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.as_ref();
        builder.add(
            Glob::new(pattern)
                .map_err(|e| Error::IgnorePattern(format!("'{pattern}': {e}")))?,
        );
    }
    builder
        .build()
        .map_err(|e| Error::IgnorePattern(e.to_string()))
}
