//! Configuration model: the concrete option values driving one render.
//! A configuration is assembled from a flat key/value document, `--set`
//! overrides and declared defaults, then validated against the manifest's
//! option set before any rendering happens.

use crate::error::{Error, Result};
use crate::manifest::OptionSpec;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// An ordered mapping from option name to concrete value.
///
/// Ordering follows the option declarations (with unknown keys, which
/// validation rejects, appended last), so iteration and the derived template
/// context are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    values: IndexMap<String, Value>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The configuration as a JSON object, handed to the template engine as
    /// the rendering context.
    pub fn context(&self) -> Value {
        let mut object = serde_json::Map::new();
        for (name, value) in &self.values {
            object.insert(name.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Loads a flat key/value document from a file, trying JSON first and
    /// falling back to YAML.
    ///
    /// # Errors
    /// * `Error::MalformedConfig` if the document is not a flat map
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::PathIoError {
            path: path.to_path_buf(),
            source,
        })?;
        let values: IndexMap<String, Value> = match serde_json::from_str(&content) {
            Ok(values) => values,
            Err(_) => {
                serde_yaml::from_str(&content).map_err(|e| Error::MalformedConfig {
                    path: path.display().to_string(),
                    detail: e.to_string(),
                })?
            }
        };
        Ok(Self { values })
    }

    /// Applies a single `KEY=VALUE` override. The value is parsed as a JSON
    /// scalar where possible (`true` becomes a boolean), otherwise taken as a
    /// literal string.
    pub fn apply_set(&mut self, spec: &str) -> Result<()> {
        let (name, raw) = spec.split_once('=').ok_or_else(|| Error::MalformedOverride {
            spec: spec.to_string(),
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::MalformedOverride {
                spec: spec.to_string(),
            });
        }
        let value = match serde_json::from_str::<Value>(raw) {
            Ok(value @ (Value::Bool(_) | Value::String(_) | Value::Number(_))) => value,
            _ => Value::String(raw.to_string()),
        };
        self.values.insert(name.to_string(), value);
        Ok(())
    }
}

impl FromIterator<(String, Value)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Fills unspecified options with their declared defaults.
///
/// Pure function: the partial configuration is not modified. Options without
/// a default that are also absent from the partial configuration stay absent
/// (validation reports them as missing). Keys the option set does not know
/// are carried over so validation can reject them by name.
pub fn with_defaults(
    options: &IndexMap<String, OptionSpec>,
    partial: &Configuration,
) -> Configuration {
    let mut filled = Configuration::new();
    for (name, spec) in options {
        if let Some(value) = partial.get(name) {
            filled.insert(name.clone(), value.clone());
        } else if let Some(default) = spec.default_value() {
            filled.insert(name.clone(), default);
        }
    }
    for (name, value) in partial.iter() {
        if !options.contains_key(name) {
            filled.insert(name.clone(), value.clone());
        }
    }
    filled
}

/// Validates a configuration against the declared option set.
///
/// # Errors
/// * `Error::UnknownOption` for a key that names no declared option
/// * `Error::MissingRequired` for a defaultless option with no value
/// * `Error::InvalidChoice` for a choice value outside the allowed set
/// * `Error::InvalidValue` for a value whose kind does not match
pub fn validate(options: &IndexMap<String, OptionSpec>, config: &Configuration) -> Result<()> {
    for (name, _) in config.iter() {
        if !options.contains_key(name) {
            return Err(Error::UnknownOption { name: name.clone() });
        }
    }

    for (name, spec) in options {
        let value = config
            .get(name)
            .ok_or_else(|| Error::MissingRequired { name: name.clone() })?;
        match spec {
            OptionSpec::Boolean { .. } => {
                if !value.is_boolean() {
                    return Err(Error::InvalidValue {
                        name: name.clone(),
                        expected: "a boolean".to_string(),
                    });
                }
            }
            OptionSpec::String { .. } => {
                if !value.is_string() {
                    return Err(Error::InvalidValue {
                        name: name.clone(),
                        expected: "a string".to_string(),
                    });
                }
            }
            OptionSpec::Choice { choices, .. } => match value.as_str() {
                None => {
                    return Err(Error::InvalidValue {
                        name: name.clone(),
                        expected: "one of the declared choices".to_string(),
                    });
                }
                Some(chosen) if !choices.iter().any(|c| c == chosen) => {
                    return Err(Error::InvalidChoice {
                        name: name.clone(),
                        value: chosen.to_string(),
                        allowed: choices.join(", "),
                    });
                }
                Some(_) => {}
            },
        }
    }

    Ok(())
}
