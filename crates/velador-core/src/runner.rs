//! External command execution.
//!
//! Every backend talks to its supervisor through a [`CommandRunner`], so
//! tests can substitute a scripted or simulated supervisor for the real
//! `launchctl`/`systemctl`/`schtasks`/`sv` binaries.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{ToolError, ToolResult};

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns true if the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Returns stderr, or stdout when stderr is empty, trimmed.
    #[must_use]
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` to completion and captures its output.
    ///
    /// A non-zero exit is NOT an error here; only failing to start is.
    ///
    /// # Errors
    /// Returns [`ToolError::Missing`] if the program does not exist and
    /// [`ToolError::Spawn`] for any other start failure.
    async fn output(&self, program: &str, args: &[&str]) -> ToolResult<CommandOutput>;

    /// Runs a command and treats a non-zero exit as [`ToolError::Failed`].
    ///
    /// # Errors
    /// Propagates start failures and non-zero exits.
    async fn run(&self, program: &str, args: &[&str]) -> ToolResult<CommandOutput> {
        let output = self.output(program, args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ToolError::failed(
                command_line(program, args),
                output.code,
                output.diagnostic(),
            ))
        }
    }
}

/// Formats a command line for diagnostics.
#[must_use]
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs commands on the host via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a new host runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, program: &str, args: &[&str]) -> ToolResult<CommandOutput> {
        tracing::debug!(command = %command_line(program, args), "running supervisor command");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    ToolError::Missing {
                        program: program.to_string(),
                        source,
                    }
                } else {
                    ToolError::Spawn {
                        program: program.to_string(),
                        source,
                    }
                }
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
