//! Recipe execution: one `autopkg run` per recipe, then its report plist.
//!
//! The report is read after every invocation, successful or not. A run that leaves no
//! readable report (spawn failure, timeout, crash, bad plist) yields an empty [`Report`]
//! plus a log line. Callers never see a per-recipe error.

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::engine::process::{CommandOutput, run_with_timeout};
use crate::engine::report::{read_report, report_path_for};
use crate::{Config, Report};

/// Runs a single recipe. Called concurrently from dispatcher threads.
pub trait RecipeExecutor: Send + Sync {
    fn execute(&self, recipe: &str) -> Report;
}

impl<F> RecipeExecutor for F
where
    F: Fn(&str) -> Report + Send + Sync,
{
    fn execute(&self, recipe: &str) -> Report {
        self(recipe)
    }
}

/// One recipe run with everything the HTTP trigger reports back.
#[derive(Debug, Default, Serialize)]
pub struct Execution {
    pub recipe: String,
    pub report: Report,
    /// Captured stdout then stderr.
    pub output: String,
    /// Timeout, non-zero exit or unreadable report. A failed run can still carry a report.
    pub error: Option<String>,
}

/// Single-recipe operations behind the on-demand HTTP routes.
pub trait RecipeTool: Send + Sync {
    fn run(&self, recipe: &str) -> Execution;
    /// `autopkg info <recipe>` output.
    fn info(&self, recipe: &str) -> Result<String>;
}

/// The `autopkg` command line, configured once.
#[derive(Clone, Debug)]
pub struct Autopkg {
    cmd_path: PathBuf,
    reports_dir: PathBuf,
    check_only: bool,
    timeout: Duration,
}

impl Autopkg {
    pub fn new(cmd_path: &Path, reports_dir: &Path, check_only: bool, timeout: Duration) -> Self {
        Self {
            cmd_path: cmd_path.to_path_buf(),
            reports_dir: reports_dir.to_path_buf(),
            check_only,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.autopkg_path,
            &config.reports_path,
            config.check_only,
            config.exec_timeout,
        )
    }

    /// `autopkg run --report-plist=<reports_dir>/<recipe> [--check] <recipe>`
    fn run_command(&self, report_path: &Path, recipe: &str) -> Command {
        let mut cmd = Command::new(&self.cmd_path);
        cmd.arg("run")
            .arg(format!("--report-plist={}", report_path.display()));
        if self.check_only {
            cmd.arg("--check");
        }
        cmd.arg(recipe);
        cmd
    }

    fn failed(recipe: &str, output: String, err: anyhow::Error) -> Execution {
        warn!("{err:#}");
        Execution {
            recipe: recipe.to_string(),
            report: Report::default(),
            output,
            error: Some(format!("{err:#}")),
        }
    }
}

impl RecipeTool for Autopkg {
    fn run(&self, recipe: &str) -> Execution {
        let report_path = report_path_for(&self.reports_dir, recipe);
        // A report left over from an earlier cycle must not be mistaken for this run's.
        if let Err(e) = std::fs::remove_file(&report_path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            debug!("[{recipe}] could not remove stale report: {e}");
        }

        let cmd = self.run_command(&report_path, recipe);
        let output = match run_with_timeout(cmd, recipe, self.timeout) {
            Ok(o) => o,
            Err(e) => return Self::failed(recipe, String::new(), e),
        };
        debug!("[{recipe}] finished in {:?}", output.elapsed);

        // autopkg exits non-zero when any processor failed; the report still describes the
        // run (including what was imported), so it is read either way.
        let run_error = output.check(recipe).err().map(|e| {
            warn!("{e:#}");
            format!("{e:#}")
        });
        match (read_report(&report_path), run_error) {
            (Ok(report), error) => Execution {
                recipe: recipe.to_string(),
                report,
                output: output.combined(),
                error,
            },
            (Err(e), Some(error)) => {
                debug!("[{recipe}] no usable report: {e:#}");
                Execution {
                    recipe: recipe.to_string(),
                    report: Report::default(),
                    output: output.combined(),
                    error: Some(error),
                }
            }
            (Err(e), None) => Self::failed(recipe, output.combined(), e),
        }
    }

    fn info(&self, recipe: &str) -> Result<String> {
        let mut cmd = Command::new(&self.cmd_path);
        cmd.arg("info").arg(recipe);
        let output: CommandOutput = run_with_timeout(cmd, recipe, self.timeout)?;
        output.check(recipe)?;
        Ok(output.combined())
    }
}

impl RecipeExecutor for Autopkg {
    fn execute(&self, recipe: &str) -> Report {
        self.run(recipe).report
    }
}
