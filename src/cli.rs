//! Command-line interface implementation for stencil.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Default template directory, relative to the working directory.
pub const DEFAULT_TEMPLATE_DIR: &str = "template";

/// Default canonical instance directory, relative to the working directory.
pub const DEFAULT_CANONICAL_DIR: &str = "canonical";

/// Default per-stage timeout for verification commands, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Command-line arguments structure for stencil.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "stencil: parameterized project scaffolding with a verified canonical instance",
    long_about = None
)]
pub struct Args {
    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a template into a new project directory
    Render {
        /// Path to the template directory or git repository URL
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Directory where the generated project will be created
        #[arg(value_name = "OUTPUT_DIR")]
        output_dir: PathBuf,

        /// Configuration file (JSON or YAML) with option values
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Set one option value as KEY=VALUE (repeatable)
        #[arg(short, long, value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Prompt for option values not otherwise supplied
        #[arg(short, long)]
        interactive: bool,

        /// Overwrite the output directory if it already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Re-render the canonical instance from its checked-in record
    RefreshCanonical {
        /// Template directory
        #[arg(long, value_name = "DIR", default_value = DEFAULT_TEMPLATE_DIR)]
        template: PathBuf,

        /// Canonical instance directory
        #[arg(long, value_name = "DIR", default_value = DEFAULT_CANONICAL_DIR)]
        canonical: PathBuf,
    },

    /// Run the template's verification stages against a rendered project
    Verify {
        /// Directory to verify
        #[arg(value_name = "DIR", default_value = DEFAULT_CANONICAL_DIR)]
        dir: PathBuf,

        /// Template directory (source of the stage commands)
        #[arg(long, value_name = "DIR", default_value = DEFAULT_TEMPLATE_DIR)]
        template: PathBuf,

        /// Per-stage timeout in seconds
        #[arg(long, value_name = "SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,
    },

    /// Compare a fresh render of the canonical configuration against the
    /// committed canonical tree
    CheckDrift {
        /// Template directory
        #[arg(long, value_name = "DIR", default_value = DEFAULT_TEMPLATE_DIR)]
        template: PathBuf,

        /// Canonical instance directory
        #[arg(long, value_name = "DIR", default_value = DEFAULT_CANONICAL_DIR)]
        canonical: PathBuf,
    },
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
