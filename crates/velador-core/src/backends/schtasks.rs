//! Windows Task Scheduler backend.
//!
//! The command is persisted as a `.cmd` launcher script under the app home,
//! and a logon-triggered task named after the service runs that script.
//!
//! The script quotes arguments with the Microsoft C runtime rules and
//! doubles `%`. Arguments containing both `"` and cmd metacharacters
//! (`& | < > ^`) cannot be represented safely.

use std::collections::BTreeMap;
use std::path::PathBuf;
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

/// Windows logon task backend.
pub struct ScheduledTaskBackend {
    task_name: String,
    script_path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl ScheduledTaskBackend {
    /// Creates a backend for a task running the given launcher script.
    #[must_use]
    pub fn new(
        task_name: impl Into<String>,
        script_path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            task_name: task_name.into(),
            script_path: script_path.into(),
            runner,
        }
    }

    /// Creates a backend from host and configuration.
    ///
    /// # Errors
    /// Returns a configuration error if the app home cannot be resolved.
    pub fn from_host(
        host: &HostEnv,
        config: &ServiceConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let app_home = config.resolve_app_home(host)?;
        Ok(Self::new(
            config.scheduled_task_name(),
            app_home.join(format!("{}.cmd", config.service_base())),
            runner,
        ))
    }

    /// Returns the task name.
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Returns the launcher script path.
    #[must_use]
    pub fn script_path(&self) -> PathBuf {
        self.script_path.clone()
    }

    async fn write_script(&self, spec: &InstallSpec) -> std::io::Result<()> {
        if let Some(parent) = self.script_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_artifact(&self.script_path, &render_task_script(spec), false).await
    }
}

// =============================================================================
// Launcher script rendering and parsing
// =============================================================================

fn needs_quotes(arg: &str) -> bool {
    arg.is_empty()
        || arg.chars().any(|c| {
            matches!(
                c,
                ' ' | '\t' | '"' | '&' | '|' | '<' | '>' | '^' | '(' | ')' | ',' | ';' | '='
            )
        })
}

/// Quotes one argument with the Microsoft C runtime rules.
#[must_use]
pub fn quote_windows_arg(arg: &str) -> String {
    if !needs_quotes(arg) {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    let mut backslashes = 0;
    for c in arg.chars() {
        if c == '\\' {
            backslashes += 1;
            continue;
        }
        // Backslashes are only special when they precede a quote.
        let run = if c == '"' {
            backslashes * 2 + 1
        } else {
            backslashes
        };
        out.extend(std::iter::repeat_n('\\', run));
        out.push(c);
        backslashes = 0;
    }
    out.extend(std::iter::repeat_n('\\', backslashes * 2));
    out.push('"');
    out
}

/// Splits a command line with the Microsoft C runtime rules.
#[must_use]
pub fn split_windows_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| *c == ' ' || *c == '\t').is_some() {}
        if chars.peek().is_none() {
            break;
        }
        let mut arg = String::new();
        let mut in_quotes = false;
        while let Some(&c) = chars.peek() {
            match c {
                ' ' | '\t' if !in_quotes => break,
                '\\' => {
                    let mut count = 0;
                    while chars.next_if_eq(&'\\').is_some() {
                        count += 1;
                    }
                    if chars.peek() == Some(&'"') {
                        arg.extend(std::iter::repeat_n('\\', count / 2));
                        if count % 2 == 1 {
                            chars.next();
                            arg.push('"');
                        }
                    } else {
                        arg.extend(std::iter::repeat_n('\\', count));
                    }
                }
                '"' => {
                    chars.next();
                    in_quotes = !in_quotes;
                }
                c => {
                    chars.next();
                    arg.push(c);
                }
            }
        }
        args.push(arg);
    }
    args
}

fn escape_percent(value: &str) -> String {
    value.replace('%', "%%")
}

fn unescape_percent(value: &str) -> String {
    value.replace("%%", "%")
}

/// Renders the `.cmd` launcher script with CRLF line endings.
#[must_use]
pub fn render_task_script(spec: &InstallSpec) -> String {
    let mut lines = vec!["@echo off".to_string()];
    if let Some(description) = spec.description() {
        lines.push(format!(
            "rem {}",
            escape_percent(&description.replace(['\r', '\n'], " "))
        ));
    }
    if let Some(dir) = spec.working_directory() {
        lines.push(format!(
            "cd /d \"{}\"",
            escape_percent(&dir.to_string_lossy())
        ));
    }
    for (key, value) in spec.persisted_environment() {
        lines.push(format!("set \"{}={}\"", escape_percent(&key), escape_percent(&value)));
    }
    let command = spec
        .program_arguments()
        .iter()
        .map(|arg| quote_windows_arg(arg))
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(escape_percent(&command));

    let mut script = lines.join("\r\n");
    script.push_str("\r\n");
    script
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &line[prefix.len()..])
}

/// Parses a launcher script back into a command.
///
/// Returns `None` when the script has no command line.
#[must_use]
pub fn parse_task_script(content: &str) -> Option<PersistedCommand> {
    let mut working_directory = None;
    let mut env = BTreeMap::new();
    let mut command = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty()
            || line.eq_ignore_ascii_case("@echo off")
            || line.eq_ignore_ascii_case("rem")
            || strip_prefix_ignore_case(line, "rem ").is_some()
        {
            continue;
        }
        if let Some(rest) = strip_prefix_ignore_case(line, "cd /d ") {
            let dir = rest.trim().trim_matches('"');
            working_directory = Some(PathBuf::from(unescape_percent(dir)));
            continue;
        }
        if let Some(rest) = strip_prefix_ignore_case(line, "set \"") {
            if let Some((key, value)) = rest.strip_suffix('"').and_then(|body| body.split_once('=')) {
                env.insert(unescape_percent(key), unescape_percent(value));
            }
            continue;
        }
        if command.is_none() {
            command = Some(split_windows_command_line(&unescape_percent(line)));
        }
    }

    let program_arguments = command.filter(|args| !args.is_empty())?;
    Some(PersistedCommand {
        program_arguments,
        working_directory,
        environment: non_empty(env),
        source_path: None,
    })
}

/// Parses `schtasks /Query /V /FO LIST` output.
#[must_use]
pub fn parse_schtasks_query(output: &str) -> RuntimeStatus {
    let status = output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Status:"))
        .map(str::trim);
    match status {
        Some("Running") => RuntimeStatus::running("Running", None),
        Some(state) if !state.is_empty() => RuntimeStatus::stopped(state),
        _ => RuntimeStatus::unknown(output.trim()),
    }
}

#[async_trait]
impl ServiceBackend for ScheduledTaskBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ScheduledTask
    }

    fn artifact_path(&self) -> PathBuf {
        self.script_path()
    }

    async fn install(&self, spec: &InstallSpec) -> Result<PathBuf> {
        spec.validate()?;
        let existed = exists(&self.script_path).await;

        self.write_script(spec)
            .await
            .map_err(|e| ServiceError::install("write task script", e))?;

        let task_command = quote_windows_arg(&self.script_path.to_string_lossy());
        let create = self
            .runner
            .run(
                "schtasks",
                &[
                    "/Create",
                    "/F",
                    "/SC",
                    "ONLOGON",
                    "/RL",
                    "LIMITED",
                    "/TN",
                    &self.task_name,
                    "/TR",
                    &task_command,
                ],
            )
            .await;
        if let Err(e) = create {
            if !existed {
                rollback_artifact(&self.script_path).await;
            }
            return Err(ServiceError::install("schtasks create", e));
        }

        self.runner
            .run("schtasks", &["/Run", "/TN", &self.task_name])
            .await
            .map_err(|e| ServiceError::install("schtasks run", e))?;

        tracing::info!(task = %self.task_name, path = %self.script_path.display(), "installed scheduled task");
        Ok(self.script_path())
    }

    async fn uninstall(&self) -> Result<UninstallReport> {
        let disable = match self
            .runner
            .run("schtasks", &["/Delete", "/F", "/TN", &self.task_name])
            .await
        {
            Ok(_) => DisableOutcome::Disabled,
            Err(e) => {
                tracing::warn!(task = %self.task_name, error = %e, "schtasks delete failed, removing anyway");
                DisableOutcome::Failed(e.to_string())
            }
        };

        let path = self.script_path();
        let artifact = match remove_artifact(&path).await {
            Ok(true) => ArtifactRemoval::Removed(path),
            Ok(false) => ArtifactRemoval::NotFound(path),
            Err(source) => {
                return Err(ServiceError::Uninstall {
                    path,
                    disabled: disable == DisableOutcome::Disabled,
                    source,
                });
            }
        };

        tracing::info!(task = %self.task_name, "uninstalled scheduled task");
        Ok(UninstallReport { artifact, disable })
    }

    async fn stop(&self) -> Result<()> {
        self.runner
            .run("schtasks", &["/End", "/TN", &self.task_name])
            .await?;
        tracing::info!(task = %self.task_name, "stopped scheduled task");
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        if let Ok(output) = self
            .runner
            .output("schtasks", &["/End", "/TN", &self.task_name])
            .await
        {
            tracing::debug!(task = %self.task_name, code = ?output.code, "schtasks end before restart");
        }
        self.runner
            .run("schtasks", &["/Run", "/TN", &self.task_name])
            .await?;
        tracing::info!(task = %self.task_name, "restarted scheduled task");
        Ok(())
    }

    async fn is_loaded(&self) -> bool {
        self.runner
            .output("schtasks", &["/Query", "/TN", &self.task_name])
            .await
            .is_ok_and(|output| output.success())
    }

    async fn read_command(&self) -> Option<PersistedCommand> {
        let content = tokio::fs::read_to_string(&self.script_path).await.ok()?;
        let mut command = parse_task_script(&content)?;
        command.source_path = Some(self.script_path());
        Some(command)
    }

    async fn read_runtime(&self) -> RuntimeStatus {
        match self
            .runner
            .run("schtasks", &["/Query", "/TN", &self.task_name, "/V", "/FO", "LIST"])
            .await
        {
            Ok(output) => parse_schtasks_query(&output.stdout),
            Err(e) => RuntimeStatus::unknown(e.to_string()),
        }
    }
}
