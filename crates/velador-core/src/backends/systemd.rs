//! Linux systemd backend.
//!
//! Installs a persistent unit file and manages it with `systemctl`, in the
//! user session (`--user`) by default or the system manager when configured.
//!
//! Unit values are escaped so argv, working directory and environment
//! survive a round trip: words with whitespace, quotes, backslashes or `;`
//! are double-quoted with C-style escapes, `%` is doubled everywhere, and
//! `$` is doubled in `ExecStart=` to suppress variable expansion.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::backend::ServiceBackend;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError, ToolResult};
use crate::platform::{BackendKind, HostEnv};
use crate::runner::{CommandOutput, CommandRunner};
use crate::types::{
    ArtifactRemoval, DisableOutcome, InstallSpec, PersistedCommand, RuntimeStatus,
    UninstallReport, non_empty,
};

use super::{exists, remove_artifact, rollback_artifact, write_artifact};

const DEFAULT_DESCRIPTION: &str = "Velador gateway";

/// Linux systemd backend.
pub struct SystemdBackend {
    unit: String,
    unit_dir: PathBuf,
    user_mode: bool,
    runner: Arc<dyn CommandRunner>,
}

impl SystemdBackend {
    /// Creates a backend for a user unit in `unit_dir`.
    #[must_use]
    pub fn user(unit: impl Into<String>, unit_dir: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            unit: unit.into(),
            unit_dir: unit_dir.into(),
            user_mode: true,
            runner,
        }
    }

    /// Creates a backend for a system unit in `/etc/systemd/system`.
    ///
    /// Requires root or appropriate polkit permissions.
    #[must_use]
    pub fn system(unit: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            unit: unit.into(),
            unit_dir: PathBuf::from("/etc/systemd/system"),
            user_mode: false,
            runner,
        }
    }

    /// Creates a backend from host and configuration.
    ///
    /// User units live in `$XDG_CONFIG_HOME/systemd/user`, falling back to
    /// `~/.config/systemd/user`.
    ///
    /// # Errors
    /// Returns a configuration error if no config directory can be resolved.
    pub fn from_host(
        host: &HostEnv,
        config: &ServiceConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        if !config.systemd_user {
            return Ok(Self::system(config.systemd_unit(), runner));
        }
        let config_dir = host
            .var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| host.home_dir().map(|home| home.join(".config")))
            .ok_or_else(|| ServiceError::config("cannot determine home directory (HOME is not set)"))?;
        Ok(Self::user(
            config.systemd_unit(),
            config_dir.join("systemd").join("user"),
            runner,
        ))
    }

    /// Returns the unit name.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Returns whether this manages a user unit.
    #[must_use]
    pub const fn is_user_mode(&self) -> bool {
        self.user_mode
    }

    /// Returns the unit file path.
    #[must_use]
    pub fn unit_path(&self) -> PathBuf {
        self.unit_dir.join(&self.unit)
    }

    fn systemctl_args<'a>(&self, args: &[&'a str]) -> Vec<&'a str> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        if self.user_mode {
            argv.push("--user");
        }
        argv.extend_from_slice(args);
        argv
    }

    async fn systemctl(&self, args: &[&str]) -> ToolResult<CommandOutput> {
        self.runner.run("systemctl", &self.systemctl_args(args)).await
    }

    async fn systemctl_output(&self, args: &[&str]) -> ToolResult<CommandOutput> {
        self.runner.output("systemctl", &self.systemctl_args(args)).await
    }

    async fn reload_quietly(&self) {
        if let Err(e) = self.systemctl(&["daemon-reload"]).await {
            tracing::warn!(unit = %self.unit, error = %e, "systemctl daemon-reload failed");
        }
    }

    async fn write_unit(&self, spec: &InstallSpec) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.unit_dir).await?;
        let wanted_by = if self.user_mode {
            "default.target"
        } else {
            "multi-user.target"
        };
        write_artifact(&self.unit_path(), &render_unit(spec, wanted_by), false).await
    }
}

// =============================================================================
// Unit file rendering and parsing
// =============================================================================

fn quote_word(word: &str, force: bool) -> String {
    let needs_quotes = force
        || word.is_empty()
        || word
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '\\' | ';'));
    if !needs_quotes {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len() + 2);
    out.push('"');
    for c in word.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quotes one `ExecStart=` argument.
#[must_use]
pub fn quote_exec_arg(arg: &str) -> String {
    quote_word(&arg.replace('%', "%%").replace('$', "$$"), false)
}

fn unescape_char(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        c => c,
    }
}

/// Splits a unit value into words, resolving quotes and backslash escapes.
///
/// Specifier (`%%`) and variable (`$$`) escapes are left for the caller.
#[must_use]
pub fn split_unit_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut word = String::new();
        if first == '"' || first == '\'' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    c if c == first => break,
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            word.push(unescape_char(escaped));
                        }
                    }
                    c => word.push(c),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        word.push(unescape_char(escaped));
                    }
                } else {
                    word.push(c);
                }
            }
        }
        words.push(word);
    }
    words
}

/// Renders the unit file.
///
/// Trailing backslashes are dropped from the description so it cannot
/// continue onto the next line.
#[must_use]
pub fn render_unit(spec: &InstallSpec, wanted_by: &str) -> String {
    let description = spec
        .description()
        .unwrap_or(DEFAULT_DESCRIPTION)
        .replace(['\n', '\r'], " ")
        .replace('%', "%%");
    let description = description.trim_end_matches('\\').trim_end();
    let exec = spec
        .program_arguments()
        .iter()
        .map(|arg| quote_exec_arg(arg))
        .collect::<Vec<_>>()
        .join(" ");
    let working_directory = spec
        .working_directory()
        .map(|dir| format!("WorkingDirectory={}\n", dir.to_string_lossy().replace('%', "%%")))
        .unwrap_or_default();
    let environment: String = spec
        .persisted_environment()
        .iter()
        .map(|(key, value)| {
            let assignment = format!("{key}={value}").replace('%', "%%");
            format!("Environment={}\n", quote_word(&assignment, true))
        })
        .collect();

    format!(
        "[Unit]
Description={description}
After=network-online.target
Wants=network-online.target

[Service]
ExecStart={exec}
Restart=always
RestartSec=5
KillMode=process
{working_directory}{environment}
[Install]
WantedBy={wanted_by}
"
    )
}

/// Parses a unit file back into a command.
///
/// Returns `None` if there is no non-empty `ExecStart=` in `[Service]`.
#[must_use]
pub fn parse_unit(content: &str) -> Option<PersistedCommand> {
    let mut in_service = false;
    let mut exec = None;
    let mut working_directory = None;
    let mut env = BTreeMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_service = line == "[Service]";
            continue;
        }
        if !in_service || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "ExecStart" if exec.is_none() => {
                let words: Vec<String> = split_unit_words(value)
                    .into_iter()
                    .map(|w| w.replace("%%", "%").replace("$$", "$"))
                    .collect();
                if !words.is_empty() {
                    exec = Some(words);
                }
            }
            "WorkingDirectory" => {
                working_directory = Some(PathBuf::from(value.trim().replace("%%", "%")));
            }
            "Environment" => {
                for word in split_unit_words(value) {
                    if let Some((k, v)) = word.split_once('=') {
                        env.insert(k.to_string(), v.replace("%%", "%"));
                    }
                }
            }
            _ => {}
        }
    }

    Some(PersistedCommand {
        program_arguments: exec?,
        working_directory,
        environment: non_empty(env),
        source_path: None,
    })
}

/// Parses `systemctl show --property ActiveState,SubState,MainPID,...` output.
#[must_use]
pub fn parse_systemctl_show(output: &str) -> RuntimeStatus {
    let props: BTreeMap<&str, &str> = output
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    let Some(active) = props.get("ActiveState").copied().filter(|s| !s.is_empty()) else {
        return RuntimeStatus::unknown(output.trim());
    };
    let sub = props
        .get("SubState")
        .copied()
        .filter(|s| !s.is_empty())
        .unwrap_or(active);
    let pid = props
        .get("MainPID")
        .and_then(|p| p.parse::<u32>().ok())
        .filter(|p| *p > 0);

    match active {
        "active" | "reloading" => RuntimeStatus::running(sub, pid),
        "activating" | "deactivating" if pid.is_some() => RuntimeStatus::running(sub, pid),
        "inactive" | "failed" | "activating" | "deactivating" => RuntimeStatus::stopped(sub),
        other => RuntimeStatus::unknown(format!("unrecognized ActiveState: {other}")),
    }
}

#[async_trait]
impl ServiceBackend for SystemdBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Systemd
    }

    fn artifact_path(&self) -> PathBuf {
        self.unit_path()
    }

    async fn install(&self, spec: &InstallSpec) -> Result<PathBuf> {
        spec.validate()?;
        let unit_path = self.unit_path();
        let existed = exists(&unit_path).await;

        self.write_unit(spec)
            .await
            .map_err(|e| ServiceError::install("write unit file", e))?;

        if let Err(e) = self.systemctl(&["daemon-reload"]).await {
            if !existed {
                rollback_artifact(&unit_path).await;
            }
            return Err(ServiceError::install("systemctl daemon-reload", e));
        }

        if let Err(e) = self.systemctl(&["enable", &self.unit]).await {
            if !existed {
                rollback_artifact(&unit_path).await;
                self.reload_quietly().await;
            }
            return Err(ServiceError::install("systemctl enable", e));
        }

        self.systemctl(&["restart", &self.unit])
            .await
            .map_err(|e| ServiceError::install("systemctl restart", e))?;

        tracing::info!(unit = %self.unit, path = %unit_path.display(), user = self.user_mode, "installed systemd unit");
        Ok(unit_path)
    }

    async fn uninstall(&self) -> Result<UninstallReport> {
        let disable = match self.systemctl(&["disable", "--now", &self.unit]).await {
            Ok(_) => DisableOutcome::Disabled,
            Err(e) => {
                tracing::warn!(unit = %self.unit, error = %e, "systemctl disable failed, removing anyway");
                DisableOutcome::Failed(e.to_string())
            }
        };

        let unit_path = self.unit_path();
        let artifact = match remove_artifact(&unit_path).await {
            Ok(true) => {
                self.reload_quietly().await;
                ArtifactRemoval::Removed(unit_path)
            }
            Ok(false) => ArtifactRemoval::NotFound(unit_path),
            Err(source) => {
                return Err(ServiceError::Uninstall {
                    path: unit_path,
                    disabled: disable == DisableOutcome::Disabled,
                    source,
                });
            }
        };

        tracing::info!(unit = %self.unit, "uninstalled systemd unit");
        Ok(UninstallReport { artifact, disable })
    }

    async fn stop(&self) -> Result<()> {
        self.systemctl(&["stop", &self.unit]).await?;
        tracing::info!(unit = %self.unit, "stopped systemd unit");
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        self.systemctl(&["restart", &self.unit]).await?;
        tracing::info!(unit = %self.unit, "restarted systemd unit");
        Ok(())
    }

    async fn is_loaded(&self) -> bool {
        self.systemctl_output(&["is-enabled", &self.unit])
            .await
            .is_ok_and(|output| output.success())
    }

    async fn read_command(&self) -> Option<PersistedCommand> {
        let path = self.unit_path();
        let content = tokio::fs::read_to_string(&path).await.ok()?;
        let mut command = parse_unit(&content)?;
        command.source_path = Some(path);
        Some(command)
    }

    async fn read_runtime(&self) -> RuntimeStatus {
        let result = self
            .systemctl(&[
                "show",
                &self.unit,
                "--no-pager",
                "--property",
                "ActiveState,SubState,MainPID,ExecMainStatus",
            ])
            .await;
        match result {
            Ok(output) => parse_systemctl_show(&output.stdout),
            Err(e) => RuntimeStatus::unknown(e.to_string()),
        }
    }
}
