//! Termux runit backend (termux-services).
//!
//! A service is a directory under `$PREFIX/var/service/<name>` holding an
//! executable `run` script and a `log/run` script that pipes output into
//! `svlogd`. Enabling and disabling go through `sv-enable`/`sv-disable`,
//! status through `sv status`.
//!
//! The `run` script format is deliberately plain shell and lossy:
//! - arguments are joined with single spaces, so whitespace inside an
//!   argument splits it on read-back
//! - environment values are written unescaped inside double quotes
//! - working directory and description are not persisted

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::ServiceBackend;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::platform::{BackendKind, HostEnv};
use crate::runner::CommandRunner;
use crate::types::{
    ArtifactRemoval, DisableOutcome, InstallSpec, PersistedCommand, RuntimeStatus,
    UninstallReport, non_empty,
};

use super::{exists, remove_artifact, rollback_artifact, write_artifact};

/// Termux installation prefix when `PREFIX` is unset.
pub const DEFAULT_TERMUX_PREFIX: &str = "/data/data/com.termux/files/usr";

/// Filesystem layout of a Termux installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermuxLayout {
    /// Termux prefix (`$PREFIX`).
    pub prefix: PathBuf,
    /// Directory holding one subdirectory per runit service.
    pub service_root: PathBuf,
    /// Parent directory of per-service log directories.
    pub log_root: PathBuf,
}

impl TermuxLayout {
    /// Creates a layout from a prefix and an application home.
    #[must_use]
    pub fn new(prefix: impl Into<PathBuf>, app_home: &Path) -> Self {
        let prefix = prefix.into();
        Self {
            service_root: prefix.join("var").join("service"),
            log_root: app_home.join("logs"),
            prefix,
        }
    }

    /// Resolves the layout from `PREFIX` and the configured app home.
    ///
    /// # Errors
    /// Returns a configuration error if the app home cannot be resolved.
    pub fn from_host(host: &HostEnv, config: &ServiceConfig) -> Result<Self> {
        let prefix = host.var("PREFIX").unwrap_or(DEFAULT_TERMUX_PREFIX);
        let app_home = config.resolve_app_home(host)?;
        Ok(Self::new(prefix, &app_home))
    }

    /// Returns the shell used as the script interpreter.
    #[must_use]
    pub fn shell(&self) -> PathBuf {
        self.prefix.join("bin").join("sh")
    }
}

/// Termux runit service backend.
pub struct TermuxServiceBackend {
    name: String,
    layout: TermuxLayout,
    runner: Arc<dyn CommandRunner>,
}

impl TermuxServiceBackend {
    /// Creates a backend for the named service.
    #[must_use]
    pub fn new(name: impl Into<String>, layout: TermuxLayout, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            name: name.into(),
            layout,
            runner,
        }
    }

    /// Creates a backend from host and configuration.
    ///
    /// # Errors
    /// Returns a configuration error if the layout cannot be resolved.
    pub fn from_host(
        host: &HostEnv,
        config: &ServiceConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let layout = TermuxLayout::from_host(host, config)?;
        Ok(Self::new(config.termux_service_name(), layout, runner))
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the layout.
    #[must_use]
    pub const fn layout(&self) -> &TermuxLayout {
        &self.layout
    }

    /// Returns the service directory.
    #[must_use]
    pub fn service_dir(&self) -> PathBuf {
        self.layout.service_root.join(&self.name)
    }

    /// Returns the path of the `run` script.
    #[must_use]
    pub fn run_script_path(&self) -> PathBuf {
        self.service_dir().join("run")
    }

    /// Returns the path of the `log/run` script.
    #[must_use]
    pub fn log_script_path(&self) -> PathBuf {
        self.service_dir().join("log").join("run")
    }

    /// Returns the directory `svlogd` writes into.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.layout.log_root.join(&self.name)
    }

    async fn write_service_dir(&self, spec: &InstallSpec) -> std::io::Result<()> {
        let service_dir = self.service_dir();
        tokio::fs::create_dir_all(service_dir.join("log")).await?;
        tokio::fs::create_dir_all(self.log_dir()).await?;

        let shell = self.layout.shell();
        let run = render_run_script(&shell, spec.program_arguments(), &spec.persisted_environment());
        write_artifact(&self.run_script_path(), &run, true).await?;

        let log_run = render_log_script(&shell, &self.log_dir());
        write_artifact(&self.log_script_path(), &log_run, true).await
    }
}

/// Renders the `run` script.
#[must_use]
pub fn render_run_script(shell: &Path, args: &[String], env: &BTreeMap<String, String>) -> String {
    let exports = env
        .iter()
        .map(|(k, v)| format!("export {k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join("\n");
    format!("#!{}\n{exports}\nexec {} 2>&1\n", shell.display(), args.join(" "))
}

/// Renders the `log/run` script.
#[must_use]
pub fn render_log_script(shell: &Path, log_dir: &Path) -> String {
    format!("#!{}\nexec svlogd -tt {}\n", shell.display(), log_dir.display())
}

/// Parses a `run` script back into argv and environment.
///
/// Returns `None` when the script has no `exec` line.
#[must_use]
pub fn parse_run_script(content: &str) -> Option<(Vec<String>, BTreeMap<String, String>)> {
    let mut env = BTreeMap::new();
    let mut args = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("export ") {
            if let Some((key, value)) = parse_export(rest) {
                env.insert(key.to_string(), value.to_string());
            }
        } else if args.is_none() {
            if let Some(rest) = line.strip_prefix("exec ") {
                let cmd = rest.replacen(" 2>&1", "", 1);
                args = Some(cmd.trim().split(' ').map(String::from).collect::<Vec<_>>());
            }
        }
    }

    args.map(|args| (args, env))
}

/// Parses `NAME="VALUE"`; NAME is `[A-Za-z0-9_]+`, VALUE runs to the last
/// quote on the line and must be non-empty.
fn parse_export(rest: &str) -> Option<(&str, &str)> {
    let name_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let (name, tail) = rest.split_at(name_len);
    let quoted = tail.strip_prefix("=\"")?;
    let end = quoted.rfind('"')?;
    let value = &quoted[..end];
    if value.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Parses `sv status` output.
#[must_use]
pub fn parse_sv_status(output: &str) -> RuntimeStatus {
    let text = output.trim();
    let first = text.lines().next().unwrap_or_default();
    if first.starts_with("run:") {
        RuntimeStatus::running("run", extract_pid(first))
    } else if first.starts_with("down:") {
        RuntimeStatus::stopped("down")
    } else {
        RuntimeStatus::unknown(text)
    }
}

fn extract_pid(line: &str) -> Option<u32> {
    let start = line.find("pid ")? + "pid ".len();
    let digits: String = line[start..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

#[async_trait]
impl ServiceBackend for TermuxServiceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Termux
    }

    fn artifact_path(&self) -> PathBuf {
        self.service_dir()
    }

    async fn install(&self, spec: &InstallSpec) -> Result<PathBuf> {
        spec.validate()?;
        let service_dir = self.service_dir();
        let existed = exists(&service_dir).await;

        self.write_service_dir(spec)
            .await
            .map_err(|e| ServiceError::install("write service directory", e))?;

        if let Err(e) = self.runner.run("sv-enable", &[&self.name]).await {
            if !existed {
                rollback_artifact(&service_dir).await;
            }
            return Err(ServiceError::install("sv-enable", e));
        }

        tracing::info!(
            service = %self.name,
            path = %service_dir.display(),
            "installed termux service"
        );
        Ok(service_dir)
    }

    async fn uninstall(&self) -> Result<UninstallReport> {
        let disable = match self.runner.run("sv-disable", &[&self.name]).await {
            Ok(_) => DisableOutcome::Disabled,
            Err(e) => {
                tracing::warn!(service = %self.name, error = %e, "sv-disable failed, removing anyway");
                DisableOutcome::Failed(e.to_string())
            }
        };

        let service_dir = self.service_dir();
        let artifact = match remove_artifact(&service_dir).await {
            Ok(true) => ArtifactRemoval::Removed(service_dir),
            Ok(false) => ArtifactRemoval::NotFound(service_dir),
            Err(source) => {
                return Err(ServiceError::Uninstall {
                    path: service_dir,
                    disabled: disable == DisableOutcome::Disabled,
                    source,
                });
            }
        };

        tracing::info!(service = %self.name, removed = matches!(artifact, ArtifactRemoval::Removed(_)), "uninstalled termux service");
        Ok(UninstallReport { artifact, disable })
    }

    async fn stop(&self) -> Result<()> {
        self.runner.run("sv", &["stop", &self.name]).await?;
        tracing::info!(service = %self.name, "stopped termux service");
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        self.runner.run("sv", &["restart", &self.name]).await?;
        tracing::info!(service = %self.name, "restarted termux service");
        Ok(())
    }

    async fn is_loaded(&self) -> bool {
        tokio::fs::metadata(self.service_dir())
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn read_command(&self) -> Option<PersistedCommand> {
        let path = self.run_script_path();
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        let (program_arguments, environment) = parse_run_script(&content)?;
        Some(PersistedCommand {
            program_arguments,
            working_directory: None,
            environment: non_empty(environment),
            source_path: Some(path),
        })
    }

    async fn read_runtime(&self) -> RuntimeStatus {
        match self.runner.run("sv", &["status", &self.name]).await {
            Ok(output) => parse_sv_status(&output.stdout),
            Err(e) => RuntimeStatus::unknown(e.to_string()),
        }
    }
}
