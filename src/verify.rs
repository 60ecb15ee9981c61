//! Verification pipeline for the canonical instance.
//! Runs the manifest's stage commands in fixed order against a working
//! directory, capturing diagnostics. Stage failures are results, not errors:
//! the pipeline always returns a structured outcome, and the caller decides
//! what a failed stage means.

use crate::manifest::VerifyPlan;
use log::{debug, warn};
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Verification stages in execution order.
pub const STAGE_ORDER: [Stage; 4] = [Stage::Install, Stage::Lint, Stage::Test, Stage::Build];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Install,
    Lint,
    Test,
    Build,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Lint => "lint",
            Self::Test => "test",
            Self::Build => "build",
        }
    }

    /// The command configured for this stage, if any.
    pub fn command(self, plan: &VerifyPlan) -> Option<&[String]> {
        match self {
            Self::Install => plan.install.as_deref(),
            Self::Lint => plan.lint.as_deref(),
            Self::Test => plan.test.as_deref(),
            Self::Build => plan.build.as_deref(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal state of one stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Exit code zero.
    Passed,
    /// Non-zero exit, or the command could not be started.
    Failed,
    /// The timeout elapsed and the process was killed.
    TimedOut,
    /// The run was cancelled and the process was killed.
    Cancelled,
}

/// What one stage invocation produced. Process-level problems (spawn
/// failure, timeout, cancellation) are failed outcomes with a diagnostic,
/// never a crash of the pipeline itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome {
    pub status: StageStatus,
    /// Exit code when the process ran to completion.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl StageOutcome {
    pub fn passed(&self) -> bool {
        self.status == StageStatus::Passed
    }

    fn aborted(status: StageStatus, diagnostic: String, started: Instant) -> Self {
        Self {
            status,
            exit_code: None,
            stdout: String::new(),
            stderr: diagnostic,
            duration: started.elapsed(),
        }
    }
}

/// One executed stage with its outcome. Stages with no configured command
/// are skipped and do not appear in the result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageResult {
    pub stage: Stage,
    pub outcome: StageOutcome,
}

/// Structured result of a verification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationResult {
    pub stages: Vec<StageResult>,
}

impl VerificationResult {
    /// True when every executed stage passed.
    pub fn passed(&self) -> bool {
        self.stages.iter().all(|s| s.outcome.passed())
    }

    /// The stage that stopped the pipeline, if any.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|s| !s.outcome.passed())
            .map(|s| s.stage)
    }
}

/// Cooperative cancellation for a verification run. Clones share the flag,
/// so a token handed to another thread can stop a run in progress.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Capability to execute one stage command. The pipeline depends on this
/// seam so tests can script outcomes without spawning processes.
pub trait StageRunner {
    fn run_stage(
        &self,
        stage: Stage,
        argv: &[String],
        workdir: &Path,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> StageOutcome;
}

/// Executes stage commands as child processes: the argv list runs without a
/// shell, stdout and stderr are drained on reader threads, and the child is
/// killed (never leaked) when the timeout elapses or the run is cancelled.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    poll_interval: Duration,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(25),
        }
    }
}

impl Default for CommandRunner {
    fn default() -> Self {
        CommandRunner::new()
    }
}

impl StageRunner for CommandRunner {
    fn run_stage(
        &self,
        stage: Stage,
        argv: &[String],
        workdir: &Path,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> StageOutcome {
        let started = Instant::now();
        let deadline = started + timeout;
        debug!("{stage} stage: {argv:?} in '{}'", workdir.display());

        let Some(program) = argv.first() else {
            return StageOutcome::aborted(
                StageStatus::Failed,
                "empty stage command".to_string(),
                started,
            );
        };

        let mut child = match Command::new(program)
            .args(&argv[1..])
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return StageOutcome::aborted(
                    StageStatus::Failed,
                    format!("failed to start '{program}': {e}"),
                    started,
                );
            }
        };

        let stdout_reader = capture(child.stdout.take());
        let stderr_reader = capture(child.stderr.take());

        let (status, exit_code, abort_note) = loop {
            if cancel.is_cancelled() {
                kill_and_reap(&mut child);
                break (
                    StageStatus::Cancelled,
                    None,
                    Some("cancelled before completion".to_string()),
                );
            }
            if Instant::now() >= deadline {
                kill_and_reap(&mut child);
                break (
                    StageStatus::TimedOut,
                    None,
                    Some(format!("timed out after {}s", timeout.as_secs())),
                );
            }
            match child.try_wait() {
                Ok(Some(exit)) => {
                    let status = if exit.success() {
                        StageStatus::Passed
                    } else {
                        StageStatus::Failed
                    };
                    break (status, exit.code(), None);
                }
                Ok(None) => thread::sleep(self.poll_interval),
                Err(e) => {
                    kill_and_reap(&mut child);
                    break (
                        StageStatus::Failed,
                        None,
                        Some(format!("failed to poll child process: {e}")),
                    );
                }
            }
        };

        let stdout = join_capture(stdout_reader);
        let mut stderr = join_capture(stderr_reader);
        if let Some(note) = abort_note {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&note);
        }

        StageOutcome {
            status,
            exit_code,
            stdout,
            stderr,
            duration: started.elapsed(),
        }
    }
}

/// Runs the plan's stages in order against `workdir`, stopping at the first
/// stage that does not pass. Stages without a configured command are
/// skipped. Cancellation between stages records the next configured stage as
/// cancelled and stops.
pub fn verify(
    plan: &VerifyPlan,
    workdir: &Path,
    timeout: Duration,
    cancel: &CancelToken,
    runner: &dyn StageRunner,
) -> VerificationResult {
    let mut result = VerificationResult::default();
    for stage in STAGE_ORDER {
        let Some(argv) = stage.command(plan) else {
            debug!("{stage} stage has no command, skipping");
            continue;
        };
        if cancel.is_cancelled() {
            result.stages.push(StageResult {
                stage,
                outcome: StageOutcome::aborted(
                    StageStatus::Cancelled,
                    "cancelled before start".to_string(),
                    Instant::now(),
                ),
            });
            break;
        }
        let outcome = runner.run_stage(stage, argv, workdir, timeout, cancel);
        let passed = outcome.passed();
        if !passed {
            warn!("{stage} stage stopped the pipeline ({:?})", outcome.status);
        }
        result.stages.push(StageResult { stage, outcome });
        if !passed {
            break;
        }
    }
    result
}

/// Kills the child and reaps it so no zombie outlives the run. The wait also
/// closes the child's pipe ends so the reader threads see EOF.
fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Drains a child pipe on a thread so the child cannot block on a full pipe
/// while the poll loop waits.
fn capture<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let mut bytes = Vec::new();
            if pipe.read_to_end(&mut bytes).is_ok() {
                text = String::from_utf8_lossy(&bytes).into_owned();
            }
        }
        text
    })
}

fn join_capture(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
