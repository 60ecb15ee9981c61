//! Template manifest handling.
//! The manifest (stencil.json, stencil.yml or stencil.yaml at the template
//! root) declares the option set that parameterizes a render, the conditional
//! inclusion rules, the verification stage commands and the canonical
//! bootstrap seed.

use crate::error::{Error, Result};
use indexmap::IndexMap;
use log::debug;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Supported manifest file names, tried in order.
pub const MANIFEST_FILES: [&str; 3] = ["stencil.json", "stencil.yml", "stencil.yaml"];

/// Option names become template variables, so they must be identifiers.
const OPTION_NAME_PATTERN: &str = "^[A-Za-z_][A-Za-z0-9_]*$";

/// A declared option: its kind, default, optional prompt text and (for
/// choices) the allowed values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OptionSpec {
    Boolean {
        default: Option<bool>,
        description: Option<String>,
    },
    String {
        default: Option<String>,
        description: Option<String>,
    },
    Choice {
        choices: Vec<String>,
        default: Option<String>,
        description: Option<String>,
    },
}

impl OptionSpec {
    /// Human-readable kind name, used in validation diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean { .. } => "boolean",
            Self::String { .. } => "string",
            Self::Choice { .. } => "choice",
        }
    }

    /// The declared default as a configuration value, if any.
    pub fn default_value(&self) -> Option<serde_json::Value> {
        match self {
            Self::Boolean { default, .. } => default.map(serde_json::Value::Bool),
            Self::String { default, .. } => default.clone().map(serde_json::Value::String),
            Self::Choice { default, .. } => default.clone().map(serde_json::Value::String),
        }
    }

    /// Prompt text shown when asking for this option interactively.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Boolean { description, .. }
            | Self::String { description, .. }
            | Self::Choice { description, .. } => description.as_deref(),
        }
    }
}

/// A conditional inclusion rule: the template entry at `path` (a file or a
/// whole subtree) is part of the output only when `when` evaluates true
/// against the configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConditionRule {
    pub path: String,
    pub when: String,
}

/// External commands for the verification stages, each an argv list run
/// without a shell. A missing stage is skipped during verification.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VerifyPlan {
    pub install: Option<Vec<String>>,
    pub lint: Option<Vec<String>>,
    pub test: Option<Vec<String>>,
    pub build: Option<Vec<String>>,
}

impl VerifyPlan {
    /// True when no stage has a command configured.
    pub fn is_empty(&self) -> bool {
        self.install.is_none() && self.lint.is_none() && self.test.is_none() && self.build.is_none()
    }
}

/// Seed for the canonical instance's build descriptor: written verbatim to
/// `path` when that file is absent or empty, so the verification toolchain
/// can run before the descriptor has real content.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BootstrapSpec {
    pub path: String,
    pub content: String,
}

/// Parsed and validated template manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub options: IndexMap<String, OptionSpec>,
    #[serde(default)]
    pub conditions: Vec<ConditionRule>,
    #[serde(default)]
    pub verify: VerifyPlan,
    pub bootstrap: Option<BootstrapSpec>,
}

/// Locates the manifest file in a template directory, trying each of
/// [`MANIFEST_FILES`] in order.
pub fn find_manifest(template_dir: &Path) -> Result<PathBuf> {
    for file in MANIFEST_FILES {
        let candidate = template_dir.join(file);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(Error::ManifestMissing {
        template_dir: template_dir.display().to_string(),
        tried: MANIFEST_FILES.join(", "),
    })
}

/// Loads, parses and validates the manifest of a template directory.
///
/// # Errors
/// * `Error::ManifestMissing` if no manifest file exists
/// * `Error::MalformedManifest` if parsing or option validation fails
/// * `Error::MalformedCondition` if an inclusion rule is invalid
pub fn load_manifest(template_dir: &Path) -> Result<Manifest> {
    let manifest_path = find_manifest(template_dir)?;
    debug!("loading template manifest from {}", manifest_path.display());
    let content = fs::read_to_string(&manifest_path).map_err(|source| Error::PathIoError {
        path: manifest_path.clone(),
        source,
    })?;
    let mut manifest = parse_manifest(&content, &manifest_path)?;
    validate_manifest(&mut manifest, &manifest_path)?;
    Ok(manifest)
}

/// Parses manifest content, trying JSON first and falling back to YAML.
fn parse_manifest(content: &str, manifest_path: &Path) -> Result<Manifest> {
    match serde_json::from_str(content) {
        Ok(manifest) => Ok(manifest),
        Err(_) => serde_yaml::from_str(content).map_err(|e| Error::MalformedManifest {
            path: manifest_path.display().to_string(),
            detail: e.to_string(),
        }),
    }
}

/// Validates option declarations and inclusion rules, normalizing rule paths
/// in place. All problems a template author can fix are reported here, at
/// load time, rather than surfacing mid-render.
fn validate_manifest(manifest: &mut Manifest, manifest_path: &Path) -> Result<()> {
    let manifest_display = manifest_path.display().to_string();
    let malformed = |detail: String| Error::MalformedManifest {
        path: manifest_display.clone(),
        detail,
    };

    let name_re = Regex::new(OPTION_NAME_PATTERN).map_err(|e| malformed(e.to_string()))?;
    for (name, spec) in &manifest.options {
        if !name_re.is_match(name) {
            return Err(malformed(format!(
                "option name '{name}' is not a valid identifier"
            )));
        }
        if let OptionSpec::Choice {
            choices, default, ..
        } = spec
        {
            if choices.is_empty() {
                return Err(malformed(format!(
                    "choice option '{name}' declares no choices"
                )));
            }
            if let Some(default) = default {
                if !choices.contains(default) {
                    return Err(malformed(format!(
                        "default '{default}' of option '{name}' is not one of its choices"
                    )));
                }
            }
        }
    }

    let mut seen_paths = HashSet::new();
    let probe_env = minijinja::Environment::new();
    for rule in &mut manifest.conditions {
        rule.path = normalize_entry_path(&rule.path).map_err(|detail| Error::MalformedCondition {
            path: rule.path.clone(),
            detail,
        })?;
        if !seen_paths.insert(rule.path.clone()) {
            return Err(Error::MalformedCondition {
                path: rule.path.clone(),
                detail: "duplicate rule for this path".to_string(),
            });
        }
        if rule.when.trim().is_empty() {
            return Err(Error::MalformedCondition {
                path: rule.path.clone(),
                detail: "empty condition expression".to_string(),
            });
        }
        check_condition_syntax(&probe_env, rule)?;
    }

    let stages = [
        ("install", &manifest.verify.install),
        ("lint", &manifest.verify.lint),
        ("test", &manifest.verify.test),
        ("build", &manifest.verify.build),
    ];
    for (stage, command) in stages {
        if let Some(argv) = command {
            if argv.is_empty() || argv[0].trim().is_empty() {
                return Err(malformed(format!(
                    "verify stage '{stage}' declares an empty command"
                )));
            }
        }
    }

    if let Some(bootstrap) = &mut manifest.bootstrap {
        bootstrap.path = normalize_entry_path(&bootstrap.path).map_err(|detail| {
            malformed(format!("bootstrap path '{}': {detail}", bootstrap.path))
        })?;
    }

    Ok(())
}

/// Checks that a condition expression parses. Evaluation against a real
/// configuration happens at render time; here a lenient probe environment
/// surfaces syntax errors only.
fn check_condition_syntax(env: &minijinja::Environment, rule: &ConditionRule) -> Result<()> {
    let probe = format!("{{% if {} %}}1{{% endif %}}", rule.when);
    let empty = serde_json::Value::Object(serde_json::Map::new());
    env.render_str(&probe, &empty)
        .map(|_| ())
        .map_err(|e| Error::MalformedCondition {
            path: rule.path.clone(),
            detail: e.to_string(),
        })
}

/// Normalizes a manifest-supplied relative path to a slash-separated form
/// with no trailing slash. Returns the reason when the path is unusable;
/// callers wrap it in the error variant matching their field.
fn normalize_entry_path(raw: &str) -> std::result::Result<String, String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("empty path".to_string());
    }
    if trimmed.starts_with('/') {
        return Err("absolute paths are not allowed".to_string());
    }
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err("path escapes the template root".to_string());
    }
    if trimmed.split('/').any(|segment| segment == ".") {
        return Err("'.' segments are not allowed".to_string());
    }
    if trimmed.split('/').any(str::is_empty) {
        return Err("empty path segment".to_string());
    }
    Ok(trimmed.to_string())
}
