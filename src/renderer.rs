//! Rendering engine and the render pipeline.
//! Turns a template store plus a configuration into an in-memory output
//! tree. Rendering never writes to disk; materialization is a separate step
//! so a failed render can never leave partial output behind.

use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::store::{NodeKind, TemplateNode, TemplateStore};
use cruet::Inflector;
use log::debug;
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// MiniJinja environment configured for template rendering: undefined
/// variables are hard errors (a placeholder is never emitted as raw text),
/// and identifier case filters are registered for deriving crate names,
/// binary names and titles from a single project name option.
pub struct Engine {
    env: Environment<'static>,
}

impl Engine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_filter("snake_case", |v: String| v.as_str().to_snake_case());
        env.add_filter("kebab_case", |v: String| v.as_str().to_kebab_case());
        env.add_filter("camel_case", |v: String| v.as_str().to_camel_case());
        env.add_filter("pascal_case", |v: String| v.as_str().to_pascal_case());
        env.add_filter("title_case", |v: String| v.as_str().to_title_case());
        env.add_filter("train_case", |v: String| v.as_str().to_train_case());
        Self { env }
    }

    /// Renders a template string against the configuration context.
    pub fn render_str(
        &self,
        source: &str,
        context: &serde_json::Value,
    ) -> std::result::Result<String, minijinja::Error> {
        self.env.render_str(source, context)
    }

    /// Evaluates a condition expression to a boolean by wrapping it in an
    /// `{% if %}` block, the same way the expression runs when templates use
    /// it directly. Undefined variables and type errors surface as
    /// [`Error::ConditionEvalError`].
    pub fn eval_condition(
        &self,
        expression: &str,
        context: &serde_json::Value,
    ) -> Result<bool> {
        let probe = format!("{{% if {expression} %}}true{{% else %}}false{{% endif %}}");
        let rendered =
            self.env
                .render_str(&probe, context)
                .map_err(|e| Error::ConditionEvalError {
                    expression: expression.to_string(),
                    detail: e.to_string(),
                })?;
        Ok(rendered == "true")
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

/// An in-memory rendered project: output paths mapped to file bodies, sorted
/// by path. Directories are implied by the files beneath them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTree {
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl RenderedTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file to the tree. Two entries resolving to the same output
    /// path is [`Error::AmbiguousOutputPath`].
    pub fn insert(&mut self, path: PathBuf, body: Vec<u8>) -> Result<()> {
        if self.files.contains_key(&path) {
            return Err(Error::AmbiguousOutputPath {
                path: path.display().to_string(),
            });
        }
        self.files.insert(path, body);
        Ok(())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Files in path order.
    pub fn files(&self) -> impl Iterator<Item = (&Path, &[u8])> {
        self.files.iter().map(|(p, b)| (p.as_path(), b.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes the tree under `target`, creating parent directories as
    /// needed. Existing files are overwritten.
    pub fn write_to(&self, target: &Path) -> Result<()> {
        for (path, body) in &self.files {
            let dest = target.join(path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|source| Error::PathIoError {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
            debug!("writing '{}'", dest.display());
            fs::write(&dest, body).map_err(|source| Error::PathIoError {
                path: dest.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

/// Renders the store against a configuration.
///
/// Pure with respect to its inputs: identical store contents and
/// configuration produce a byte-identical tree, in the same order. Condition
/// rules are evaluated once each; a node gated by any false rule is skipped
/// together with everything beneath it.
///
/// # Errors
/// * `Error::ConditionEvalError` if a condition fails to evaluate
/// * `Error::UnresolvedPlaceholder` if a template references an undefined
///   variable (in content or in a path)
/// * `Error::RenderError` for template syntax errors
/// * `Error::InvalidOutputPath` if a rendered path is empty, absolute or
///   escapes the output directory
/// * `Error::AmbiguousOutputPath` if two entries render to the same path
pub fn render(
    store: &TemplateStore,
    config: &Configuration,
    engine: &Engine,
) -> Result<RenderedTree> {
    let context = config.context();
    let mut rule_values: Vec<Option<bool>> = vec![None; store.conditions().len()];
    let mut tree = RenderedTree::new();
    let mut directories: BTreeSet<PathBuf> = BTreeSet::new();

    for node in store.iter() {
        if !node_included(node, store, engine, &context, &mut rule_values)? {
            debug!("skipping '{}' (condition false)", node.relative);
            continue;
        }

        let rendered_path = engine
            .render_str(node.output_template(), &context)
            .map_err(|e| classify_render_error(&node.relative, e))?;
        let output_path = validate_output_path(&rendered_path)?;

        match node.kind {
            NodeKind::Directory => {
                if tree.contains(&output_path) {
                    return Err(Error::AmbiguousOutputPath {
                        path: output_path.display().to_string(),
                    });
                }
                directories.insert(output_path);
            }
            NodeKind::Rendered => {
                let source =
                    fs::read_to_string(&node.source).map_err(|source| Error::PathIoError {
                        path: node.source.clone(),
                        source,
                    })?;
                let body = engine
                    .render_str(&source, &context)
                    .map_err(|e| classify_render_error(&node.relative, e))?;
                insert_file(&mut tree, &directories, output_path, body.into_bytes())?;
            }
            NodeKind::Literal => {
                let body = fs::read(&node.source).map_err(|source| Error::PathIoError {
                    path: node.source.clone(),
                    source,
                })?;
                insert_file(&mut tree, &directories, output_path, body)?;
            }
        }
    }

    Ok(tree)
}

/// True when every condition rule gating the node evaluates true. Rule
/// values are cached so each expression runs at most once per render.
fn node_included(
    node: &TemplateNode,
    store: &TemplateStore,
    engine: &Engine,
    context: &serde_json::Value,
    rule_values: &mut [Option<bool>],
) -> Result<bool> {
    for &idx in &node.conditions {
        let value = match rule_values[idx] {
            Some(value) => value,
            None => {
                let rule = &store.conditions()[idx];
                let value = engine.eval_condition(&rule.when, context)?;
                debug!("condition '{}' on '{}' -> {}", rule.when, rule.path, value);
                rule_values[idx] = Some(value);
                value
            }
        };
        if !value {
            return Ok(false);
        }
    }
    Ok(true)
}

fn insert_file(
    tree: &mut RenderedTree,
    directories: &BTreeSet<PathBuf>,
    path: PathBuf,
    body: Vec<u8>,
) -> Result<()> {
    if directories.contains(&path) {
        return Err(Error::AmbiguousOutputPath {
            path: path.display().to_string(),
        });
    }
    tree.insert(path, body)
}

/// Maps a MiniJinja failure to the crate taxonomy: undefined variables are
/// unresolved placeholders, everything else is a template error. `path` is
/// the source-relative entry being rendered.
fn classify_render_error(path: &str, err: minijinja::Error) -> Error {
    if err.kind() == ErrorKind::UndefinedError {
        Error::UnresolvedPlaceholder {
            path: path.to_string(),
            detail: err.to_string(),
        }
    } else {
        Error::RenderError {
            path: path.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Rejects rendered output paths that would land outside the output
/// directory or cannot name a file.
fn validate_output_path(rendered: &str) -> Result<PathBuf> {
    let invalid = |detail: &str| Error::InvalidOutputPath {
        path: rendered.to_string(),
        detail: detail.to_string(),
    };
    if rendered.trim().is_empty() {
        return Err(invalid("renders to an empty path"));
    }
    if rendered.starts_with('/') || Path::new(rendered).is_absolute() {
        return Err(invalid("absolute paths are not allowed"));
    }
    for segment in rendered.split('/') {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        if segment == ".." {
            return Err(invalid("path escapes the output directory"));
        }
        if segment == "." {
            return Err(invalid("'.' segments are not allowed"));
        }
    }
    Ok(PathBuf::from(rendered))
}
