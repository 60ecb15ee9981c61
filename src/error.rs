//! Error handling for stencil.
//! Defines the error taxonomy and result alias used throughout the crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur during template loading, configuration,
/// rendering and canonical maintenance.
///
/// Verification stage failures and drift findings are intentionally *not*
/// represented here: both are ordinary data (structured results) that the
/// caller inspects, never error conditions of the engine itself.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations.
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// An IO failure where the offending path matters to the caller.
    #[error("cannot access '{path}': {source}")]
    PathIoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The template root directory does not exist.
    #[error("template directory does not exist: '{template_dir}'")]
    TemplateDoesNotExist { template_dir: String },

    /// None of the known manifest file names exist at the template root.
    #[error("no template manifest found in '{template_dir}' (tried: {tried})")]
    ManifestMissing { template_dir: String, tried: String },

    /// The manifest exists but could not be parsed or failed validation.
    #[error("malformed template manifest '{path}': {detail}")]
    MalformedManifest { path: String, detail: String },

    /// A conditional inclusion rule is invalid at load time.
    #[error("invalid condition on '{path}': {detail}")]
    MalformedCondition { path: String, detail: String },

    /// A template path is not representable as UTF-8.
    #[error("template path is not valid UTF-8: '{path}'")]
    NonUtf8Path { path: String },

    /// An ignore or exemption glob pattern failed to compile.
    #[error("invalid ignore pattern: {0}")]
    IgnorePattern(String),

    /// A supplied configuration key does not name a declared option.
    #[error("unknown option '{name}'")]
    UnknownOption { name: String },

    /// An option without a declared default was not supplied.
    #[error("option '{name}' is required but has no value and no default")]
    MissingRequired { name: String },

    /// A choice option was set to a value outside its allowed set.
    #[error("invalid choice for option '{name}': '{value}' (allowed: {allowed})")]
    InvalidChoice {
        name: String,
        value: String,
        allowed: String,
    },

    /// An option value has the wrong kind for its declaration.
    #[error("invalid value for option '{name}': expected {expected}")]
    InvalidValue { name: String, expected: String },

    /// A `--set` override was not of the form KEY=VALUE.
    #[error("malformed --set override '{spec}' (expected KEY=VALUE)")]
    MalformedOverride { spec: String },

    /// A configuration document could not be parsed as a flat key/value map.
    #[error("malformed configuration file '{path}': {detail}")]
    MalformedConfig { path: String, detail: String },

    /// A rendered file or path references a variable absent from the
    /// effective configuration. Rendering never emits raw placeholder text.
    #[error("unresolved placeholder in '{path}': {detail}")]
    UnresolvedPlaceholder { path: String, detail: String },

    /// Template content failed to render for a reason other than an
    /// undefined variable (typically a syntax error).
    #[error("template rendering failed in '{path}': {detail}")]
    RenderError { path: String, detail: String },

    /// A conditional inclusion expression failed to evaluate against the
    /// configuration.
    #[error("condition '{expression}' failed to evaluate: {detail}")]
    ConditionEvalError { expression: String, detail: String },

    /// Two template entries resolved to the same output path.
    #[error("two template entries resolve to the same output path: '{path}'")]
    AmbiguousOutputPath { path: String },

    /// A rendered output path is empty, absolute, or escapes the output root.
    #[error("rendered output path '{path}' is invalid: {detail}")]
    InvalidOutputPath { path: String, detail: String },

    /// No canonical record file exists in the canonical working directory.
    #[error("no canonical record found in '{dir}' (tried: {tried})")]
    RecordMissing { dir: String, tried: String },

    /// The canonical record file could not be parsed.
    #[error("malformed canonical record '{path}': {detail}")]
    MalformedRecord { path: String, detail: String },

    /// The render output directory already exists and --force was not given.
    #[error("output directory already exists: '{output_dir}' (pass --force to overwrite)")]
    OutputDirectoryExists { output_dir: String },

    /// Represents errors raised while cloning a git-hosted template.
    #[error("git error: {0}")]
    Git2Error(#[from] git2::Error),

    /// Terminal interaction failed or was aborted.
    #[error("prompt failed: {0}")]
    PromptError(String),
}

/// Convenience type alias for Results with stencil's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// Prints the error message to stderr and exits with status code 1.
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(1);
}
