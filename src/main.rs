//! stencil's main application entry point and orchestration logic.
//! Parses command-line arguments and coordinates the template store,
//! renderer, canonical instance manager, verification pipeline and drift
//! reporter for each subcommand.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stencil::{
    canonical,
    cli::{get_args, Args, Command},
    config::{self, Configuration},
    error::{default_error_handler, Error, Result},
    loader::load_template,
    manifest::load_manifest,
    prompt::{fill_interactive, DialoguerPrompter},
    renderer::{render, Engine},
    store::TemplateStore,
    verify::{verify, CancelToken, CommandRunner, StageStatus},
};

/// Main application entry point.
fn main() {
    let args = get_args();

    // Logger configuration
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            log::LevelFilter::Trace
        } else {
            log::LevelFilter::Off
        })
        .init();

    match run(args) {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => default_error_handler(err),
    }
}

/// Dispatches the parsed subcommand. Returns the process exit code for
/// outcomes that are data rather than errors (verification failures, drift).
fn run(args: Args) -> Result<i32> {
    match args.command {
        Command::Render {
            template,
            output_dir,
            config,
            set,
            interactive,
            force,
        } => run_render(template, output_dir, config, set, interactive, force),
        Command::RefreshCanonical {
            template,
            canonical,
        } => run_refresh(&template, &canonical),
        Command::Verify {
            dir,
            template,
            timeout_secs,
        } => run_verify(&dir, &template, timeout_secs),
        Command::CheckDrift {
            template,
            canonical,
        } => run_check_drift(&template, &canonical),
    }
}

/// Ensures the output directory is safe to write to.
fn ensure_output_dir(output_dir: &Path, force: bool) -> Result<()> {
    if output_dir.exists() && !force {
        return Err(Error::OutputDirectoryExists {
            output_dir: output_dir.display().to_string(),
        });
    }
    Ok(())
}

fn run_render(
    template: String,
    output_dir: PathBuf,
    config_file: Option<PathBuf>,
    set: Vec<String>,
    interactive: bool,
    force: bool,
) -> Result<i32> {
    let engine = Engine::new();
    let prompter = DialoguerPrompter;

    ensure_output_dir(&output_dir, force)?;
    let template_root = load_template(&prompter, template, force)?;
    let manifest = load_manifest(&template_root)?;
    let store = TemplateStore::load(&template_root, &manifest)?;

    let mut partial = match config_file {
        Some(path) => Configuration::from_file(&path)?,
        None => Configuration::new(),
    };
    for spec in &set {
        partial.apply_set(spec)?;
    }
    if interactive {
        partial = fill_interactive(&manifest.options, &partial, &prompter)?;
    }
    let configuration = config::with_defaults(&manifest.options, &partial);
    config::validate(&manifest.options, &configuration)?;

    let tree = render(&store, &configuration, &engine)?;

    // Materialize into a staging directory first so a failure cannot leave a
    // partially written project behind.
    let parent = match output_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|source| Error::PathIoError {
        path: parent.to_path_buf(),
        source,
    })?;
    let staging = tempfile::Builder::new()
        .prefix(".stencil-render-")
        .tempdir_in(parent)
        .map_err(Error::IoError)?;
    tree.write_to(staging.path())?;

    if output_dir.exists() {
        fs::remove_dir_all(&output_dir).map_err(|source| Error::PathIoError {
            path: output_dir.clone(),
            source,
        })?;
    }
    fs::rename(staging.path(), &output_dir).map_err(|source| Error::PathIoError {
        path: output_dir.clone(),
        source,
    })?;

    println!(
        "Rendered {} files into '{}'.",
        tree.len(),
        output_dir.display()
    );
    Ok(0)
}

fn run_refresh(template: &Path, canonical_dir: &Path) -> Result<i32> {
    let engine = Engine::new();
    let manifest = load_manifest(template)?;
    let store = TemplateStore::load(template, &manifest)?;

    let count = canonical::refresh(&store, &manifest, canonical_dir, &engine)?;

    println!(
        "Refreshed canonical instance in '{}' ({count} files).",
        canonical_dir.display()
    );
    Ok(0)
}

fn run_verify(dir: &Path, template: &Path, timeout_secs: u64) -> Result<i32> {
    let manifest = load_manifest(template)?;
    if manifest.verify.is_empty() {
        println!("No verification stages configured.");
        return Ok(0);
    }
    if !dir.is_dir() {
        return Err(Error::PathIoError {
            path: dir.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "directory does not exist"),
        });
    }

    canonical::bootstrap(dir, &manifest)?;

    let runner = CommandRunner::new();
    let cancel = CancelToken::new();
    let result = verify(
        &manifest.verify,
        dir,
        Duration::from_secs(timeout_secs),
        &cancel,
        &runner,
    );

    for stage_result in &result.stages {
        let outcome = &stage_result.outcome;
        let seconds = outcome.duration.as_secs_f64();
        match outcome.status {
            StageStatus::Passed => {
                println!("{}: passed ({seconds:.1}s)", stage_result.stage);
            }
            StageStatus::Failed => match outcome.exit_code {
                Some(code) => {
                    println!("{}: failed (exit code {code})", stage_result.stage);
                }
                None => println!("{}: failed", stage_result.stage),
            },
            StageStatus::TimedOut => {
                println!("{}: timed out ({seconds:.1}s)", stage_result.stage);
            }
            StageStatus::Cancelled => println!("{}: cancelled", stage_result.stage),
        }
        if !outcome.passed() {
            if !outcome.stdout.trim().is_empty() {
                println!("{}", outcome.stdout.trim_end());
            }
            if !outcome.stderr.trim().is_empty() {
                eprintln!("{}", outcome.stderr.trim_end());
            }
        }
    }

    if result.passed() {
        println!("Verification passed.");
        Ok(0)
    } else {
        Ok(1)
    }
}

fn run_check_drift(template: &Path, canonical_dir: &Path) -> Result<i32> {
    let engine = Engine::new();
    let manifest = load_manifest(template)?;
    let store = TemplateStore::load(template, &manifest)?;

    let report = canonical::check_drift(&store, &manifest, canonical_dir, &engine)?;

    if report.is_empty() {
        println!("No drift: the canonical instance matches the template.");
        Ok(0)
    } else {
        print!("{report}");
        println!(
            "{} drifted path(s). Run 'stencil refresh-canonical' to re-sync.",
            report.len()
        );
        Ok(1)
    }
}
