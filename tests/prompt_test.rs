use std::cell::RefCell;

use indexmap::IndexMap;
use serde_json::json;
use stencil::config::Configuration;
use stencil::error::Result;
use stencil::manifest::OptionSpec;
use stencil::prompt::{fill_interactive, Prompter};

/// Scripted prompter: answers confirms with `yes`, inputs with the default
/// offered, and selects with `pick`. Every question asked is recorded.
struct ScriptedPrompter {
    yes: bool,
    pick: usize,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    fn new(yes: bool, pick: usize) -> Self {
        Self {
            yes,
            pick,
            asked: RefCell::new(Vec::new()),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: String, _default: bool) -> Result<bool> {
        self.asked.borrow_mut().push(message);
        Ok(self.yes)
    }

    fn input(&self, message: String, default: String) -> Result<String> {
        self.asked.borrow_mut().push(message);
        Ok(default)
    }

    fn select(&self, message: String, _items: &[String], _default: usize) -> Result<usize> {
        self.asked.borrow_mut().push(message);
        Ok(self.pick)
    }
}

fn option_set() -> IndexMap<String, OptionSpec> {
    let mut options = IndexMap::new();
    options.insert(
        "project_name".to_string(),
        OptionSpec::String {
            default: Some("demo".to_string()),
            description: Some("Name of the project".to_string()),
        },
    );
    options.insert(
        "project_type".to_string(),
        OptionSpec::Choice {
            choices: vec![
                "cli".to_string(),
                "library".to_string(),
                "workspace".to_string(),
            ],
            default: Some("cli".to_string()),
            description: None,
        },
    );
    options.insert(
        "use_docs".to_string(),
        OptionSpec::Boolean {
            default: Some(false),
            description: Some("Generate documentation scaffolding?".to_string()),
        },
    );
    options
}

#[test]
fn test_fill_interactive_asks_every_missing_option() {
    let prompter = ScriptedPrompter::new(true, 1);

    let filled = fill_interactive(&option_set(), &Configuration::new(), &prompter).unwrap();

    assert_eq!(filled.get("project_name"), Some(&json!("demo")));
    assert_eq!(filled.get("project_type"), Some(&json!("library")));
    assert_eq!(filled.get("use_docs"), Some(&json!(true)));
    // Prompt text prefers the description, falls back to the option name
    assert_eq!(
        *prompter.asked.borrow(),
        vec![
            "Name of the project",
            "project_type",
            "Generate documentation scaffolding?"
        ]
    );
}

#[test]
fn test_supplied_values_are_not_asked_again() {
    let prompter = ScriptedPrompter::new(false, 0);
    let partial: Configuration = [
        ("project_name".to_string(), json!("already-set")),
        ("use_docs".to_string(), json!(true)),
    ]
    .into_iter()
    .collect();

    let filled = fill_interactive(&option_set(), &partial, &prompter).unwrap();

    assert_eq!(filled.get("project_name"), Some(&json!("already-set")));
    assert_eq!(filled.get("use_docs"), Some(&json!(true)));
    assert_eq!(*prompter.asked.borrow(), vec!["project_type"]);
}

#[test]
fn test_selection_maps_to_the_choice_value() {
    let prompter = ScriptedPrompter::new(false, 2);
    let filled = fill_interactive(&option_set(), &Configuration::new(), &prompter).unwrap();
    assert_eq!(filled.get("project_type"), Some(&json!("workspace")));
}

#[test]
fn test_out_of_range_selection_is_an_error() {
    let prompter = ScriptedPrompter::new(false, 99);
    assert!(fill_interactive(&option_set(), &Configuration::new(), &prompter).is_err());
}
