//! Service manager - the single entry point for lifecycle operations.
//!
//! The backend is selected once and held for the lifetime of the manager.
//! Every operation is forwarded unchanged and logged; no code outside
//! [`crate::backends::select_backend`] branches on the platform.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::backend::ServiceBackend;
use crate::backends::select_backend;
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::platform::{BackendKind, HostEnv};
use crate::runner::{CommandRunner, SystemRunner};
use crate::types::{InstallSpec, PersistedCommand, RuntimeStatus, UninstallReport};

// =============================================================================
// ServiceSummary
// =============================================================================

/// Everything known about the service at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSummary {
    /// Backend label (`LaunchAgent`, `systemd`, ...).
    pub label: &'static str,
    /// Whether the supervisor has the service registered.
    pub loaded: bool,
    /// Backend wording of the loaded flag (`enabled`, `missing`, ...).
    pub loaded_text: &'static str,
    /// Persisted command, if installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<PersistedCommand>,
    /// Live runtime status.
    pub runtime: RuntimeStatus,
}

impl fmt::Display for ServiceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.label, self.loaded_text, self.runtime)?;
        if let Some(command) = &self.command {
            write!(f, " [{}]", command.program_arguments.join(" "))?;
        }
        Ok(())
    }
}

// =============================================================================
// ServiceManager
// =============================================================================

/// Manages the one gateway service through the host's backend.
pub struct ServiceManager {
    backend: Box<dyn ServiceBackend>,
}

impl ServiceManager {
    /// Wraps an already selected backend.
    #[must_use]
    pub fn new(backend: Box<dyn ServiceBackend>) -> Self {
        Self { backend }
    }

    /// Selects the backend for `host` and wraps it.
    ///
    /// # Errors
    /// Returns an error if the platform is unsupported or the configuration
    /// is invalid.
    pub fn for_host(
        host: &HostEnv,
        config: &ServiceConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        select_backend(host, config, runner).map(Self::new)
    }

    /// Manager for the current process, real tools, environment overrides.
    ///
    /// # Errors
    /// See [`ServiceManager::for_host`].
    pub fn current() -> Result<Self> {
        let host = HostEnv::current();
        let config = ServiceConfig::from_env(&host)?;
        Self::for_host(&host, &config, Arc::new(SystemRunner::new()))
    }

    /// Returns the selected backend.
    #[must_use]
    pub fn backend(&self) -> &dyn ServiceBackend {
        self.backend.as_ref()
    }

    /// Returns the backend kind.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Returns the user-facing backend label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.kind().label()
    }

    /// Returns the backend's wording for "loaded".
    #[must_use]
    pub fn loaded_text(&self) -> &'static str {
        self.kind().loaded_text()
    }

    /// Returns the backend's wording for "not loaded".
    #[must_use]
    pub fn not_loaded_text(&self) -> &'static str {
        self.kind().not_loaded_text()
    }

    /// Returns the artifact path.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.backend.artifact_path()
    }

    /// Installs (or re-installs) the service.
    ///
    /// # Errors
    /// See [`ServiceBackend::install`].
    pub async fn install(&self, spec: &InstallSpec) -> Result<PathBuf> {
        let program = spec.program_arguments().first().map_or("", String::as_str);
        tracing::info!(backend = self.label(), program, "installing service");
        let result = self.backend.install(spec).await;
        if let Err(e) = &result {
            tracing::warn!(backend = self.label(), error = %e, "service install failed");
        }
        result
    }

    /// Uninstalls the service.
    ///
    /// # Errors
    /// See [`ServiceBackend::uninstall`].
    pub async fn uninstall(&self) -> Result<UninstallReport> {
        tracing::info!(backend = self.label(), "uninstalling service");
        let report = self.backend.uninstall().await?;
        tracing::info!(backend = self.label(), outcome = %report, "service uninstalled");
        Ok(report)
    }

    /// Stops the service.
    ///
    /// # Errors
    /// See [`ServiceBackend::stop`].
    pub async fn stop(&self) -> Result<()> {
        tracing::info!(backend = self.label(), "stopping service");
        self.backend.stop().await
    }

    /// Restarts the service.
    ///
    /// # Errors
    /// See [`ServiceBackend::restart`].
    pub async fn restart(&self) -> Result<()> {
        tracing::info!(backend = self.label(), "restarting service");
        self.backend.restart().await
    }

    /// Returns true if the service is registered with the supervisor.
    pub async fn is_loaded(&self) -> bool {
        self.backend.is_loaded().await
    }

    /// Reads back the persisted command.
    pub async fn read_command(&self) -> Option<PersistedCommand> {
        self.backend.read_command().await
    }

    /// Queries the live runtime status.
    pub async fn read_runtime(&self) -> RuntimeStatus {
        let status = self.backend.read_runtime().await;
        tracing::debug!(backend = self.label(), status = %status, "read runtime status");
        status
    }

    /// Collects loaded flag, persisted command and runtime status.
    pub async fn summary(&self) -> ServiceSummary {
        let loaded = self.is_loaded().await;
        ServiceSummary {
            label: self.label(),
            loaded,
            loaded_text: if loaded {
                self.loaded_text()
            } else {
                self.not_loaded_text()
            },
            command: self.read_command().await,
            runtime: self.read_runtime().await,
        }
    }
}

impl fmt::Debug for ServiceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceManager")
            .field("backend", &self.kind())
            .field("artifact", &self.artifact_path())
            .finish()
    }
}
