//! macOS LaunchAgent backend.
//!
//! Writes a property list to `~/Library/LaunchAgents/<label>.plist` and
//! manages it in the user's GUI domain (`gui/<uid>`) with `launchctl`.
//!
//! # Lifecycle Commands
//! | Operation | Command |
//! |-----------|---------|
//! | install   | `bootout` (ignored), `bootstrap gui/<uid> <plist>`, `kickstart -k` |
//! | uninstall | `bootout gui/<uid>/<label>` |
//! | stop      | `bootout gui/<uid>/<label>` |
//! | restart   | `kickstart -k gui/<uid>/<label>` |
//! | status    | `print gui/<uid>/<label>` |

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

/// macOS per-user launch agent backend.
pub struct LaunchAgentBackend {
    label: String,
    plist_dir: PathBuf,
    log_dir: PathBuf,
    uid: u32,
    runner: Arc<dyn CommandRunner>,
}

impl LaunchAgentBackend {
    /// Creates a backend with explicit paths and user id.
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        plist_dir: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
        uid: u32,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            label: label.into(),
            plist_dir: plist_dir.into(),
            log_dir: log_dir.into(),
            uid,
            runner,
        }
    }

    /// Creates a backend from host and configuration.
    ///
    /// # Errors
    /// Returns a configuration error if the home directory or user id is
    /// unknown.
    pub fn from_host(
        host: &HostEnv,
        config: &ServiceConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let home = host
            .home_dir()
            .ok_or_else(|| ServiceError::config("cannot determine home directory (HOME is not set)"))?;
        let uid = host
            .uid()
            .ok_or_else(|| ServiceError::config("cannot determine user id for the launchd domain"))?;
        let log_dir = config.resolve_app_home(host)?.join("logs");
        Ok(Self::new(
            config.launchd_label(),
            home.join("Library").join("LaunchAgents"),
            log_dir,
            uid,
            runner,
        ))
    }

    /// Returns the job label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the plist path.
    #[must_use]
    pub fn plist_path(&self) -> PathBuf {
        self.plist_dir.join(format!("{}.plist", self.label))
    }

    /// Returns the launchd domain, `gui/<uid>`.
    #[must_use]
    pub fn domain(&self) -> String {
        format!("gui/{}", self.uid)
    }

    /// Returns the service target, `gui/<uid>/<label>`.
    #[must_use]
    pub fn service_target(&self) -> String {
        format!("gui/{}/{}", self.uid, self.label)
    }

    async fn prepare_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.plist_dir).await?;
        tokio::fs::create_dir_all(&self.log_dir).await
    }
}

// =============================================================================
// Plist rendering
// =============================================================================

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn plist_entry(key: &str, value: &str) -> String {
    format!(
        "    <key>{}</key>\n    <string>{}</string>\n",
        escape_xml(key),
        escape_xml(value)
    )
}

/// Renders the launch agent property list.
#[must_use]
pub fn render_plist(label: &str, spec: &InstallSpec, log_dir: &Path) -> String {
    let comment = spec
        .description()
        .map(|description| plist_entry("Comment", description))
        .unwrap_or_default();
    let args: String = spec
        .program_arguments()
        .iter()
        .map(|arg| format!("        <string>{}</string>\n", escape_xml(arg)))
        .collect();
    let working_directory = spec
        .working_directory()
        .map(|dir| plist_entry("WorkingDirectory", &dir.to_string_lossy()))
        .unwrap_or_default();

    let env = spec.persisted_environment();
    let environment = if env.is_empty() {
        String::new()
    } else {
        let vars: String = env
            .iter()
            .map(|(key, value)| {
                format!(
                    "        <key>{}</key>\n        <string>{}</string>\n",
                    escape_xml(key),
                    escape_xml(value)
                )
            })
            .collect();
        format!("    <key>EnvironmentVariables</key>\n    <dict>\n{vars}    </dict>\n")
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
{comment}    <key>ProgramArguments</key>
    <array>
{args}    </array>
{working_directory}{environment}    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
    <key>ThrottleInterval</key>
    <integer>5</integer>
    <key>StandardOutPath</key>
    <string>{stdout}</string>
    <key>StandardErrorPath</key>
    <string>{stderr}</string>
</dict>
</plist>
"#,
        label = escape_xml(label),
        stdout = escape_xml(&log_dir.join("gateway.log").to_string_lossy()),
        stderr = escape_xml(&log_dir.join("gateway.err.log").to_string_lossy()),
    )
}

// =============================================================================
// Plist parsing
// =============================================================================

/// Parses a launch agent plist, XML or binary, back into a command.
///
/// Returns `None` if the document is malformed or has no `ProgramArguments`.
/// Non-string array items and environment values are skipped.
#[must_use]
pub fn parse_plist(bytes: &[u8]) -> Option<PersistedCommand> {
    let value: plist::Value = plist::from_bytes(bytes).ok()?;
    let dict = value.as_dictionary()?;

    let program_arguments = dict
        .get("ProgramArguments")?
        .as_array()?
        .iter()
        .filter_map(plist::Value::as_string)
        .map(str::to_string)
        .collect();
    let working_directory = dict
        .get("WorkingDirectory")
        .and_then(plist::Value::as_string)
        .map(PathBuf::from);
    let environment = dict
        .get("EnvironmentVariables")
        .and_then(plist::Value::as_dictionary)
        .and_then(|vars| {
            let env: BTreeMap<String, String> = vars
                .iter()
                .filter_map(|(key, value)| Some((key.clone(), value.as_string()?.to_string())))
                .collect();
            non_empty(env)
        });

    Some(PersistedCommand {
        program_arguments,
        working_directory,
        environment,
        source_path: None,
    })
}

/// Parses `launchctl print` output.
#[must_use]
pub fn parse_launchctl_print(output: &str) -> RuntimeStatus {
    let mut state = None;
    let mut pid = None;
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(" = ") else {
            continue;
        };
        match key.trim() {
            "state" if state.is_none() => state = Some(value.trim().to_string()),
            "pid" if pid.is_none() => pid = value.trim().parse::<u32>().ok(),
            _ => {}
        }
    }

    match state {
        Some(state) if state == "running" => RuntimeStatus::running(state, pid),
        Some(state) => RuntimeStatus::stopped(state),
        None => RuntimeStatus::unknown(output.trim()),
    }
}

#[async_trait]
impl ServiceBackend for LaunchAgentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::LaunchAgent
    }

    fn artifact_path(&self) -> PathBuf {
        self.plist_path()
    }

    async fn install(&self, spec: &InstallSpec) -> Result<PathBuf> {
        spec.validate()?;
        self.prepare_dirs()
            .await
            .map_err(|e| ServiceError::install("create LaunchAgents directory", e))?;

        let plist_path = self.plist_path();
        let existed = exists(&plist_path).await;
        let target = self.service_target();

        // A loaded job keeps its old definition until it is booted out.
        if let Ok(output) = self.runner.output("launchctl", &["bootout", &target]).await {
            tracing::debug!(label = %self.label, code = ?output.code, "launchctl bootout before install");
        }

        let plist = render_plist(&self.label, spec, &self.log_dir);
        write_artifact(&plist_path, &plist, false)
            .await
            .map_err(|e| ServiceError::install("write plist", e))?;

        let plist_arg = plist_path.to_string_lossy();
        if let Err(e) = self
            .runner
            .run("launchctl", &["bootstrap", &self.domain(), &plist_arg])
            .await
        {
            if !existed {
                rollback_artifact(&plist_path).await;
            }
            return Err(ServiceError::install("launchctl bootstrap", e));
        }

        self.runner
            .run("launchctl", &["kickstart", "-k", &target])
            .await
            .map_err(|e| ServiceError::install("launchctl kickstart", e))?;

        tracing::info!(label = %self.label, path = %plist_path.display(), "installed launch agent");
        Ok(plist_path)
    }

    async fn uninstall(&self) -> Result<UninstallReport> {
        let disable = match self.runner.run("launchctl", &["bootout", &self.service_target()]).await {
            Ok(_) => DisableOutcome::Disabled,
            Err(e) => {
                tracing::warn!(label = %self.label, error = %e, "launchctl bootout failed, removing anyway");
                DisableOutcome::Failed(e.to_string())
            }
        };

        let plist_path = self.plist_path();
        let artifact = match remove_artifact(&plist_path).await {
            Ok(true) => ArtifactRemoval::Removed(plist_path),
            Ok(false) => ArtifactRemoval::NotFound(plist_path),
            Err(source) => {
                return Err(ServiceError::Uninstall {
                    path: plist_path,
                    disabled: disable == DisableOutcome::Disabled,
                    source,
                });
            }
        };

        tracing::info!(label = %self.label, "uninstalled launch agent");
        Ok(UninstallReport { artifact, disable })
    }

    async fn stop(&self) -> Result<()> {
        self.runner
            .run("launchctl", &["bootout", &self.service_target()])
            .await?;
        tracing::info!(label = %self.label, "stopped launch agent");
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        self.runner
            .run("launchctl", &["kickstart", "-k", &self.service_target()])
            .await?;
        tracing::info!(label = %self.label, "restarted launch agent");
        Ok(())
    }

    async fn is_loaded(&self) -> bool {
        self.runner
            .output("launchctl", &["print", &self.service_target()])
            .await
            .is_ok_and(|output| output.success())
    }

    async fn read_command(&self) -> Option<PersistedCommand> {
        let path = self.plist_path();
        let content = tokio::fs::read(&path).await.ok()?;
        let mut command = parse_plist(&content)?;
        command.source_path = Some(path);
        Some(command)
    }

    async fn read_runtime(&self) -> RuntimeStatus {
        match self
            .runner
            .run("launchctl", &["print", &self.service_target()])
            .await
        {
            Ok(output) => parse_launchctl_print(&output.stdout),
            Err(e) => RuntimeStatus::unknown(e.to_string()),
        }
    }
}
