//! External process execution
//!
//! All calls to `dbt` go through [`CommandRunner`] so workflows can be
//! exercised without a dbt installation.

use dbtvgen_core::{Result, VaultGenError};
use std::path::PathBuf;
use std::process::Command;

/// Name of the dbt executable
pub const DBT_EXECUTABLE: &str = "dbt";

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a process that exited with code 0
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Seam for locating and running external programs
pub trait CommandRunner {
    /// Resolve a program name against the search path
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run a program to completion and capture its output
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs real processes
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, "running command");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| VaultGenError::SubprocessFailed {
                command: command_line(program, args),
                status: "not started".to_string(),
                output: e.to_string(),
            })?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        (**self).locate(program)
    }

    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        (**self).run(program, args)
    }
}

/// Run a command and fail unless it exits with code 0
pub fn run_checked(runner: &impl CommandRunner, program: &str, args: &[String]) -> Result<CommandOutput> {
    let output = runner.run(program, args)?;
    if output.success() {
        return Ok(output);
    }

    let combined = format!("{} {}", output.stdout, output.stderr);
    Err(VaultGenError::SubprocessFailed {
        command: command_line(program, args),
        status: output
            .status
            .map(|code| code.to_string())
            .unwrap_or_else(|| "terminated by signal".to_string()),
        output: combined.split_whitespace().collect::<Vec<_>>().join(" "),
    })
}

/// Make sure dbt is installed and runnable, returning its version banner
pub fn check_dbt_install(runner: &impl CommandRunner) -> Result<String> {
    let Some(path) = runner.locate(DBT_EXECUTABLE) else {
        return Err(VaultGenError::NoExternalToolInstall(
            "dbt could not be found on PATH; install dbt-core and an adapter before generating docs"
                .to_string(),
        ));
    };
    tracing::debug!(path = %path.display(), "found dbt executable");

    let output = run_checked(runner, DBT_EXECUTABLE, &["--version".to_string()])?;
    Ok(output.stdout.trim().to_string())
}

/// Turn `(option, value)` pairs into command line flags, `project_dir`
/// becoming `--project-dir <value>`. Pairs without a value are dropped.
pub fn cli_passthrough_args(options: &[(&str, Option<String>)]) -> Vec<String> {
    options
        .iter()
        .filter_map(|(key, value)| {
            value
                .as_ref()
                .map(|value| [format!("--{}", key.replace('_', "-")), value.clone()])
        })
        .flatten()
        .collect()
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
