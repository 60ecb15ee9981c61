//! Canonical instance management.
//! The canonical instance is a checked-in render of the template, driven by
//! a single persisted configuration (the canonical record). Refreshing it is
//! atomic: the new tree is staged next to the current one and swapped in
//! with renames, so a failed refresh never leaves a half-updated tree.

use crate::config::{self, Configuration};
use crate::drift::{compare_drift, DriftReport};
use crate::error::{Error, Result};
use crate::ignore::compile_patterns;
use crate::manifest::Manifest;
use crate::renderer::{render, Engine};
use crate::store::TemplateStore;
use globset::GlobSet;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Supported record file names inside the canonical directory, tried in
/// order. The record is checked in alongside the rendered tree.
pub const RECORD_FILES: [&str; 3] = [
    ".stencil-canonical.json",
    ".stencil-canonical.yml",
    ".stencil-canonical.yaml",
];

/// The persisted configuration driving the canonical instance, plus the glob
/// patterns of files maintained by hand inside the canonical tree (lock
/// files, generated build descriptors). Exempt files survive a refresh
/// unchanged and are excluded from drift comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub configuration: Configuration,
    #[serde(default)]
    pub exempt: Vec<String>,
}

impl CanonicalRecord {
    /// Compiles the record's exemption patterns, always including the record
    /// file names themselves and version control internals.
    pub fn exemptions(&self) -> Result<GlobSet> {
        let mut patterns: Vec<&str> = vec![".git", ".git/**"];
        patterns.extend(RECORD_FILES);
        patterns.extend(self.exempt.iter().map(String::as_str));
        compile_patterns(&patterns)
    }
}

/// Locates the record file inside a canonical directory.
pub fn find_record(canonical_dir: &Path) -> Result<PathBuf> {
    for file in RECORD_FILES {
        let candidate = canonical_dir.join(file);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::RecordMissing {
        dir: canonical_dir.display().to_string(),
        tried: RECORD_FILES.join(", "),
    })
}

/// Loads and parses the canonical record, returning it with the path it was
/// read from.
pub fn load_record(canonical_dir: &Path) -> Result<(CanonicalRecord, PathBuf)> {
    let record_path = find_record(canonical_dir)?;
    debug!("loading canonical record from {}", record_path.display());
    let content = fs::read_to_string(&record_path).map_err(|source| Error::PathIoError {
        path: record_path.clone(),
        source,
    })?;
    let record = parse_record(&content, &record_path)?;
    Ok((record, record_path))
}

fn parse_record(content: &str, record_path: &Path) -> Result<CanonicalRecord> {
    match serde_json::from_str(content) {
        Ok(record) => Ok(record),
        Err(_) => serde_yaml::from_str(content).map_err(|e| Error::MalformedRecord {
            path: record_path.display().to_string(),
            detail: e.to_string(),
        }),
    }
}

/// Re-renders the canonical instance from its record and swaps the result
/// into place.
///
/// The record's configuration is completed with declared defaults and
/// validated before rendering. The fresh tree is written into a staging
/// directory beside the canonical one (same filesystem, so the final rename
/// is atomic), exempt files and the record itself are carried over from the
/// current tree, the bootstrap seed is applied, and only then are the
/// directories swapped. Returns the number of rendered files.
///
/// Immediately after a successful refresh, drift against a fresh render of
/// the same configuration is empty.
pub fn refresh(
    store: &TemplateStore,
    manifest: &Manifest,
    canonical_dir: &Path,
    engine: &Engine,
) -> Result<usize> {
    let (record, _) = load_record(canonical_dir)?;
    let configuration = config::with_defaults(&manifest.options, &record.configuration);
    config::validate(&manifest.options, &configuration)?;

    let tree = render(store, &configuration, engine)?;
    let exemptions = record.exemptions()?;

    let parent = parent_dir(canonical_dir);
    let staging = tempfile::Builder::new()
        .prefix(".stencil-staging-")
        .tempdir_in(parent)
        .map_err(Error::IoError)?;

    tree.write_to(staging.path())?;
    // The record file names are part of the exemption set, so this also
    // carries the record itself into the new tree unchanged.
    carry_exempt_files(canonical_dir, staging.path(), &exemptions)?;
    bootstrap(staging.path(), manifest)?;
    swap_into_place(staging, canonical_dir)?;

    Ok(tree.len())
}

/// Seeds the manifest's bootstrap file when it is absent or empty in `dir`.
/// Returns true when the seed was written. This breaks the ordering knot
/// where the verification toolchain needs a build descriptor that the
/// toolchain itself normally maintains.
pub fn bootstrap(dir: &Path, manifest: &Manifest) -> Result<bool> {
    let Some(seed) = &manifest.bootstrap else {
        return Ok(false);
    };
    let target = dir.join(&seed.path);
    let present = match fs::metadata(&target) {
        Ok(meta) => meta.len() > 0,
        Err(_) => false,
    };
    if present {
        return Ok(false);
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|source| Error::PathIoError {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    debug!("seeding bootstrap file '{}'", target.display());
    fs::write(&target, &seed.content).map_err(|source| Error::PathIoError {
        path: target.clone(),
        source,
    })?;
    Ok(true)
}

/// Compares a fresh render of the canonical configuration against the
/// committed canonical tree.
pub fn check_drift(
    store: &TemplateStore,
    manifest: &Manifest,
    canonical_dir: &Path,
    engine: &Engine,
) -> Result<DriftReport> {
    let (record, _) = load_record(canonical_dir)?;
    let configuration = config::with_defaults(&manifest.options, &record.configuration);
    config::validate(&manifest.options, &configuration)?;
    let tree = render(store, &configuration, engine)?;
    let exemptions = record.exemptions()?;
    compare_drift(&tree, canonical_dir, &exemptions)
}

/// Copies files matching the exemption set from the current canonical tree
/// into the staging tree. The committed copy wins over whatever the render
/// produced for those paths.
fn carry_exempt_files(canonical_dir: &Path, staging: &Path, exemptions: &GlobSet) -> Result<()> {
    if !canonical_dir.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(canonical_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(canonical_dir)
            .map_err(|e| Error::IoError(std::io::Error::other(e)))?;
        let relative_str = relative.to_str().ok_or_else(|| Error::NonUtf8Path {
            path: entry.path().display().to_string(),
        })?;
        if !exemptions.is_match(relative_str) {
            continue;
        }
        let dest = staging.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::PathIoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        debug!("carrying exempt file '{relative_str}'");
        fs::copy(entry.path(), &dest).map_err(|source| Error::PathIoError {
            path: entry.path().to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// The directory next to `path`, usable as a staging location on the same
/// filesystem. A bare relative name has an empty `parent()`.
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Swaps the staged tree into place: the current canonical directory is
/// renamed aside, the staging directory renamed onto the canonical path, and
/// the old tree removed. If the second rename fails the old tree is
/// restored, so the canonical path always holds a complete tree.
fn swap_into_place(staging: tempfile::TempDir, canonical_dir: &Path) -> Result<()> {
    let parent = parent_dir(canonical_dir);
    let dir_name = canonical_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("canonical");

    let retired = tempfile::Builder::new()
        .prefix(&format!(".{dir_name}-retired-"))
        .tempdir_in(parent)
        .map_err(Error::IoError)?;
    let retired_slot = retired.path().join("tree");

    fs::rename(canonical_dir, &retired_slot).map_err(|source| Error::PathIoError {
        path: canonical_dir.to_path_buf(),
        source,
    })?;
    if let Err(source) = fs::rename(staging.path(), canonical_dir) {
        if let Err(e) = fs::rename(&retired_slot, canonical_dir) {
            warn!(
                "could not restore '{}' after failed swap: {e}",
                canonical_dir.display()
            );
        }
        return Err(Error::PathIoError {
            path: canonical_dir.to_path_buf(),
            source,
        });
    }
    // Dropping `retired` removes the old tree; dropping `staging` is a no-op
    // now that its directory has been renamed away.
    Ok(())
}
