//! stencil is a parameterized project-scaffolding system.
//! It renders project file trees from templates driven by a small set of
//! configuration options, and maintains a canonical instantiation of each
//! template that is continuously re-rendered and verified so drift between
//! the template and a real, buildable project is caught automatically.

/// Canonical instance management: the persisted record, atomic refresh,
/// bootstrap seeding and the drift entry point
pub mod canonical;

/// Command-line interface module for the stencil application
pub mod cli;

/// Configuration model: option values from files, overrides and defaults,
/// validated against the template's declared option set
pub mod config;

/// Drift detection between a fresh render and the committed canonical tree
pub mod drift;

/// Error types and handling for the stencil application
pub mod error;

/// File and directory ignore patterns
/// Processes .stencilignore files to exclude specific paths
pub mod ignore;

/// Template acquisition from local directories or git repositories
pub mod loader;

/// Template manifest handling
/// Supports JSON and YAML formats (stencil.json, stencil.yml, stencil.yaml)
pub mod manifest;

/// User input and interaction handling
pub mod prompt;

/// Rendering engine and the render pipeline
pub mod renderer;

/// The template store: the walked, ordered view of a template directory
pub mod store;

/// Verification pipeline running the template's stage commands
pub mod verify;
