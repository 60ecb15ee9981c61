//! Template store: the ordered, validated view of a template directory.
//! Walking happens once at load time; rendering iterates the stored nodes.

use crate::error::{Error, Result};
use crate::ignore::{parse_ignore_file, IGNORE_FILE};
use crate::manifest::{ConditionRule, Manifest};
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files carrying this suffix have their content rendered and the suffix
/// stripped from the output name. Everything else is copied byte-for-byte.
pub const TEMPLATE_SUFFIX: &str = ".j2";

/// How a template entry contributes to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Traversal structure only. Output directories are implied by the
    /// files beneath them.
    Directory,
    /// Copied without rendering.
    Literal,
    /// Content rendered, suffix stripped.
    Rendered,
}

/// One entry of the template store.
#[derive(Debug, Clone)]
pub struct TemplateNode {
    /// Path relative to the template root, as it appears on disk.
    pub relative: String,
    /// Absolute path of the source entry.
    pub source: PathBuf,
    pub kind: NodeKind,
    /// Indices into the store's condition rules that gate this node. The
    /// node is included only when every listed rule evaluates true.
    pub conditions: Vec<usize>,
}

impl TemplateNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// The output path template: the source-relative path with the render
    /// suffix stripped. Placeholders in it are still unrendered.
    pub fn output_template(&self) -> &str {
        match self.kind {
            NodeKind::Rendered => self
                .relative
                .strip_suffix(TEMPLATE_SUFFIX)
                .unwrap_or(&self.relative),
            _ => &self.relative,
        }
    }
}

/// The walked template directory: nodes in deterministic walk order plus the
/// manifest's condition rules, cross-validated at load time.
#[derive(Debug)]
pub struct TemplateStore {
    root: PathBuf,
    nodes: Vec<TemplateNode>,
    conditions: Vec<ConditionRule>,
}

impl TemplateStore {
    /// Walks a template directory and builds the store.
    ///
    /// The walk is sorted by file name so iteration order (and therefore
    /// render order) is stable across runs. Paths matching the ignore set
    /// are skipped. Every manifest condition rule must match at least one
    /// entry; a rule that matches nothing is a stale rule and a load error.
    pub fn load(template_root: &Path, manifest: &Manifest) -> Result<Self> {
        if !template_root.is_dir() {
            return Err(Error::TemplateDoesNotExist {
                template_dir: template_root.display().to_string(),
            });
        }
        let ignored = parse_ignore_file(template_root.join(IGNORE_FILE))?;

        let mut nodes = Vec::new();
        for entry in WalkDir::new(template_root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            if entry.depth() == 0 {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(template_root)
                .map_err(|e| Error::IoError(io::Error::other(e)))?;
            let relative = relative.to_str().ok_or_else(|| Error::NonUtf8Path {
                path: entry.path().display().to_string(),
            })?;

            if ignored.is_match(relative) {
                debug!("skipping ignored entry '{relative}'");
                continue;
            }

            let kind = if entry.file_type().is_dir() {
                NodeKind::Directory
            } else if is_rendered_name(relative) {
                NodeKind::Rendered
            } else {
                NodeKind::Literal
            };
            debug!("store entry '{relative}' ({kind:?})");

            nodes.push(TemplateNode {
                relative: relative.to_string(),
                source: entry.into_path(),
                kind,
                conditions: Vec::new(),
            });
        }

        attach_conditions(&mut nodes, &manifest.conditions)?;

        Ok(Self {
            root: template_root.to_path_buf(),
            nodes,
            conditions: manifest.conditions.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Nodes in walk order: parents before their contents, siblings sorted
    /// by file name.
    pub fn nodes(&self) -> &[TemplateNode] {
        &self.nodes
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemplateNode> {
        self.nodes.iter()
    }

    pub fn conditions(&self) -> &[ConditionRule] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A file name ending in the render suffix is rendered, unless stripping the
/// suffix would leave an empty name (a file literally called `.j2`).
fn is_rendered_name(relative: &str) -> bool {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    match name.strip_suffix(TEMPLATE_SUFFIX) {
        Some(stem) => !stem.is_empty(),
        None => false,
    }
}

/// Attaches each condition rule to the nodes it gates: the entry at the
/// rule's path plus, for directory rules, everything beneath it. A node
/// gated by several rules requires all of them to hold.
fn attach_conditions(nodes: &mut [TemplateNode], rules: &[ConditionRule]) -> Result<()> {
    for (idx, rule) in rules.iter().enumerate() {
        let subtree = format!("{}/", rule.path);
        let mut hit = false;
        for node in nodes.iter_mut() {
            if node.relative == rule.path
                || node.output_template() == rule.path
                || node.relative.starts_with(&subtree)
            {
                node.conditions.push(idx);
                hit = true;
            }
        }
        if !hit {
            return Err(Error::MalformedCondition {
                path: rule.path.clone(),
                detail: "matches no template entry".to_string(),
            });
        }
    }
    Ok(())
}
