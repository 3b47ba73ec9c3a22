//! Fault injection for supervisor commands.
//!
//! Faults are deterministic: a configured tool is always missing and a
//! configured command always fails, so falsification tests can pin down the
//! exact failure path they exercise.
//!
//! # Reference
//! Netflix. (2012). Chaos Monkey. GitHub.
//! <https://github.com/Netflix/chaosmonkey>

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use velador_core::{CommandOutput, ToolError, ToolResult};

/// A command that always exits non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedFailure {
    /// Program name.
    pub program: String,
    /// Leading arguments that must match.
    pub args_prefix: Vec<String>,
    /// Exit code to report.
    pub code: i32,
    /// Stderr to report.
    pub stderr: String,
}

impl InjectedFailure {
    fn matches(&self, program: &str, args: &[&str]) -> bool {
        self.program == program
            && self.args_prefix.len() <= args.len()
            && self.args_prefix.iter().zip(args).all(|(a, b)| a == b)
    }
}

/// Fault injection configuration.
#[derive(Debug, Clone, Default)]
pub struct ChaosConfig {
    /// Delay added before every command.
    pub latency: Option<Duration>,
    /// Programs that fail to spawn as if not installed.
    pub missing_tools: Vec<String>,
    /// Commands that exit non-zero.
    pub failures: Vec<InjectedFailure>,
}

impl ChaosConfig {
    /// Creates a config that delays every command.
    #[must_use]
    pub fn latency(delay: Duration) -> Self {
        Self {
            latency: Some(delay),
            ..Default::default()
        }
    }

    /// Creates a config where `program` is not installed.
    #[must_use]
    pub fn missing(program: impl Into<String>) -> Self {
        Self::default().and_missing(program)
    }

    /// Creates a config where `program args_prefix...` fails.
    #[must_use]
    pub fn failing(program: &str, args_prefix: &[&str], code: i32, stderr: &str) -> Self {
        Self::default().and_failing(program, args_prefix, code, stderr)
    }

    /// Also makes `program` missing.
    #[must_use]
    pub fn and_missing(mut self, program: impl Into<String>) -> Self {
        self.missing_tools.push(program.into());
        self
    }

    /// Also makes `program args_prefix...` fail.
    #[must_use]
    pub fn and_failing(mut self, program: &str, args_prefix: &[&str], code: i32, stderr: &str) -> Self {
        self.failures.push(InjectedFailure {
            program: program.to_string(),
            args_prefix: args_prefix.iter().map(ToString::to_string).collect(),
            code,
            stderr: stderr.to_string(),
        });
        self
    }
}

/// Applies a [`ChaosConfig`] while active.
#[derive(Debug)]
pub struct ChaosInjector {
    config: ChaosConfig,
    active: AtomicBool,
}

impl ChaosInjector {
    /// Creates an inactive injector.
    #[must_use]
    pub const fn new(config: ChaosConfig) -> Self {
        Self {
            config,
            active: AtomicBool::new(false),
        }
    }

    /// Starts injecting faults.
    pub fn start(&self) {
        tracing::info!(
            missing = self.config.missing_tools.len(),
            failures = self.config.failures.len(),
            "starting fault injection"
        );
        self.active.store(true, Ordering::SeqCst);
    }

    /// Stops injecting faults.
    pub fn stop(&self) {
        tracing::info!("stopping fault injection");
        self.active.store(false, Ordering::SeqCst);
    }

    /// Returns true while faults are injected.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ChaosConfig {
        &self.config
    }

    /// Returns the delay to add before a command, if any.
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        if self.is_active() { self.config.latency } else { None }
    }

    /// Returns the injected result for a command, or `None` to let it run.
    ///
    /// A missing tool takes precedence over a scripted failure.
    #[must_use]
    pub fn intercept(&self, program: &str, args: &[&str]) -> Option<ToolResult<CommandOutput>> {
        if !self.is_active() {
            return None;
        }
        if self.config.missing_tools.iter().any(|t| t == program) {
            return Some(Err(ToolError::Missing {
                program: program.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }));
        }
        self.config
            .failures
            .iter()
            .rev()
            .find(|f| f.matches(program, args))
            .map(|f| Ok(CommandOutput::failed(f.code, f.stderr.clone())))
    }
}
