//! Drift detection between a fresh render and the committed canonical tree.
//! Drift is data, not an error: finding differences returns a populated
//! report, and only IO problems while reading either side are failures.

use crate::error::{Error, Result};
use crate::renderer::RenderedTree;
use globset::GlobSet;
use log::debug;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Path-set differences between a fresh render and the committed canonical
/// tree, exempted paths removed from both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    /// Produced by the render, absent from the committed tree.
    pub added: BTreeSet<PathBuf>,
    /// Present in the committed tree, no longer produced by the render.
    pub removed: BTreeSet<PathBuf>,
    /// Present on both sides with different content.
    pub changed: BTreeSet<PathBuf>,
}

impl DriftReport {
    /// The success case: no non-exempt difference in either direction.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for path in &self.added {
            writeln!(f, "+ {}", path.display())?;
        }
        for path in &self.removed {
            writeln!(f, "- {}", path.display())?;
        }
        for path in &self.changed {
            writeln!(f, "~ {}", path.display())?;
        }
        Ok(())
    }
}

/// Compares a rendered tree against the canonical tree on disk.
///
/// Paths matching the exemption set are skipped on both sides, so a
/// hand-maintained file neither counts as changed nor as removed when the
/// render stops producing it. Content comparison is exact bytes.
pub fn compare_drift(
    rendered: &RenderedTree,
    committed_dir: &Path,
    exemptions: &GlobSet,
) -> Result<DriftReport> {
    let mut report = DriftReport::default();

    let mut committed: BTreeSet<PathBuf> = BTreeSet::new();
    if committed_dir.is_dir() {
        for entry in WalkDir::new(committed_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(committed_dir)
                .map_err(|e| Error::IoError(std::io::Error::other(e)))?;
            let relative_str = relative.to_str().ok_or_else(|| Error::NonUtf8Path {
                path: entry.path().display().to_string(),
            })?;
            if exemptions.is_match(relative_str) {
                debug!("exempt from drift comparison: '{relative_str}'");
                continue;
            }
            committed.insert(relative.to_path_buf());
        }
    }

    for (path, body) in rendered.files() {
        let relative_str = path.to_str().ok_or_else(|| Error::NonUtf8Path {
            path: path.display().to_string(),
        })?;
        if exemptions.is_match(relative_str) {
            continue;
        }
        if committed.remove(path) {
            let on_disk =
                fs::read(committed_dir.join(path)).map_err(|source| Error::PathIoError {
                    path: committed_dir.join(path),
                    source,
                })?;
            if on_disk != body {
                report.changed.insert(path.to_path_buf());
            }
        } else {
            report.added.insert(path.to_path_buf());
        }
    }

    // Whatever the render did not claim is only on disk.
    report.removed = committed;

    Ok(report)
}
