//! Backend implementations and selection.
//!
//! # Supported Platforms
//!
//! | Host | Backend | Artifact |
//! |------|---------|----------|
//! | macOS | [`LaunchAgentBackend`] | `~/Library/LaunchAgents/<label>.plist` |
//! | Linux | [`SystemdBackend`] | `~/.config/systemd/user/<unit>` |
//! | Windows | [`ScheduledTaskBackend`] | `<app-home>\<base>.cmd` + logon task |
//! | Termux | [`TermuxServiceBackend`] | `$PREFIX/var/service/<name>/` |

mod launchd;
mod schtasks;
mod systemd;
mod termux;

pub use launchd::{LaunchAgentBackend, parse_launchctl_print, parse_plist, render_plist};
pub use schtasks::{
    ScheduledTaskBackend, parse_schtasks_query, parse_task_script, quote_windows_arg,
    render_task_script, split_windows_command_line,
};
pub use systemd::{
    SystemdBackend, parse_systemctl_show, parse_unit, quote_exec_arg, render_unit,
    split_unit_words,
};
pub use termux::{
    DEFAULT_TERMUX_PREFIX, TermuxLayout, TermuxServiceBackend, parse_run_script, parse_sv_status,
    render_log_script, render_run_script,
};

use std::io;
use std::path::Path;
use std::sync::Arc;

use crate::backend::ServiceBackend;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::platform::{BackendKind, HostEnv};
use crate::runner::{CommandRunner, SystemRunner};

/// Selects the backend for a host.
///
/// This is the only place that branches on the platform. The selected
/// backend is then used through [`ServiceBackend`] alone.
///
/// # Errors
/// Returns [`crate::ServiceError::UnsupportedPlatform`] for an OS without a
/// backend, and a configuration error if the host lacks what the backend
/// needs to resolve its paths.
pub fn select_backend(
    host: &HostEnv,
    config: &ServiceConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn ServiceBackend>> {
    config.validate()?;
    let kind = BackendKind::detect(host)?;
    tracing::debug!(os = host.os_identifier(), backend = %kind, "selected service backend");
    build_backend(kind, host, config, runner)
}

/// Builds a specific backend regardless of the host OS.
///
/// # Errors
/// Returns a configuration error if the backend's paths cannot be resolved.
pub fn build_backend(
    kind: BackendKind,
    host: &HostEnv,
    config: &ServiceConfig,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn ServiceBackend>> {
    Ok(match kind {
        BackendKind::LaunchAgent => Box::new(LaunchAgentBackend::from_host(host, config, runner)?),
        BackendKind::Systemd => Box::new(SystemdBackend::from_host(host, config, runner)?),
        BackendKind::ScheduledTask => {
            Box::new(ScheduledTaskBackend::from_host(host, config, runner)?)
        }
        BackendKind::Termux => Box::new(TermuxServiceBackend::from_host(host, config, runner)?),
    })
}

/// Selects the backend for the current process with environment overrides
/// applied and the host's real supervisor tools.
///
/// # Errors
/// See [`select_backend`].
pub fn select_current() -> Result<Box<dyn ServiceBackend>> {
    let host = HostEnv::current();
    let config = ServiceConfig::from_env(&host)?;
    select_backend(&host, &config, Arc::new(SystemRunner::new()))
}

// =============================================================================
// Shared filesystem helpers
// =============================================================================

/// Writes an artifact file, marking it executable when asked.
pub(crate) async fn write_artifact(path: &Path, content: &str, executable: bool) -> io::Result<()> {
    tokio::fs::write(path, content).await?;
    set_mode(path, if executable { 0o755 } else { 0o644 }).await
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

/// Returns true if something exists at `path`.
pub(crate) async fn exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

/// Removes a file or directory tree. `Ok(false)` if nothing was there.
pub(crate) async fn remove_artifact(path: &Path) -> io::Result<bool> {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Removes an artifact left behind by a failed fresh install.
pub(crate) async fn rollback_artifact(path: &Path) {
    if let Err(e) = remove_artifact(path).await {
        tracing::warn!(path = %path.display(), error = %e, "failed to roll back service artifact");
    }
}
