//! Interactive prompting for option values.
//! The CLI asks for options the configuration does not already provide,
//! following declaration order with declared defaults preselected.

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::manifest::OptionSpec;
use dialoguer::{Confirm, Input, Select};
use indexmap::IndexMap;
use serde_json::Value;

/// User interaction seam. The loader and the interactive configuration flow
/// ask questions through this trait so tests can script the answers.
pub trait Prompter {
    /// Asks a yes/no question.
    fn confirm(&self, message: String, default: bool) -> Result<bool>;
    /// Asks for a line of text with a prefilled default.
    fn input(&self, message: String, default: String) -> Result<String>;
    /// Asks to pick one of `items`; returns the picked index.
    fn select(&self, message: String, items: &[String], default: usize) -> Result<usize>;
}

/// Terminal prompter backed by dialoguer.
#[derive(Debug, Default)]
pub struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, message: String, default: bool) -> Result<bool> {
        Confirm::new()
            .with_prompt(message)
            .default(default)
            .interact()
            .map_err(|e| Error::PromptError(e.to_string()))
    }

    fn input(&self, message: String, default: String) -> Result<String> {
        Input::<String>::new()
            .with_prompt(message)
            .default(default)
            .interact_text()
            .map_err(|e| Error::PromptError(e.to_string()))
    }

    fn select(&self, message: String, items: &[String], default: usize) -> Result<usize> {
        Select::new()
            .with_prompt(message)
            .default(default)
            .items(items)
            .interact()
            .map_err(|e| Error::PromptError(e.to_string()))
    }
}

/// Prompts for every declared option the partial configuration does not yet
/// provide. Values already supplied are not asked again, so `--set` and
/// `--config` answers win over the prompt flow.
pub fn fill_interactive(
    options: &IndexMap<String, OptionSpec>,
    partial: &Configuration,
    prompter: &dyn Prompter,
) -> Result<Configuration> {
    let mut filled = partial.clone();
    for (name, spec) in options {
        if filled.get(name).is_some() {
            continue;
        }
        let message = spec
            .description()
            .map(String::from)
            .unwrap_or_else(|| name.clone());
        match spec {
            OptionSpec::Boolean { default, .. } => {
                let value = prompter.confirm(message, default.unwrap_or(false))?;
                filled.insert(name.clone(), Value::Bool(value));
            }
            OptionSpec::String { default, .. } => {
                let value = prompter.input(message, default.clone().unwrap_or_default())?;
                filled.insert(name.clone(), Value::String(value));
            }
            OptionSpec::Choice {
                choices, default, ..
            } => {
                let preselected = default
                    .as_ref()
                    .and_then(|d| choices.iter().position(|c| c == d))
                    .unwrap_or(0);
                let picked = prompter.select(message, choices, preselected)?;
                let value = choices.get(picked).cloned().ok_or_else(|| {
                    Error::PromptError(format!("selection {picked} is out of range"))
                })?;
                filled.insert(name.clone(), Value::String(value));
            }
        }
    }
    Ok(filled)
}
