//! Service test harness.
//!
//! # Toyota Way: Built-in Quality (品質の作り込み)
//! Quality cannot be inspected in; it must be built in.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use velador_core::{
    BackendKind, CommandRunner, HostEnv, InstallSpec, ServiceBackend, ServiceConfig,
    ServiceManager, select_backend,
};

use crate::chaos::{ChaosConfig, ChaosInjector};
use crate::error::{Result, TestError};
use crate::supervisor::{FakeSupervisor, ServiceState, Supervisor};

/// Every backend kind, in a stable order.
pub const ALL_KINDS: [BackendKind; 4] = [
    BackendKind::LaunchAgent,
    BackendKind::Systemd,
    BackendKind::ScheduledTask,
    BackendKind::Termux,
];

/// Isolated host for one backend, backed by a [`FakeSupervisor`].
///
/// The host's home directory, Termux prefix and every artifact live under a
/// temporary directory that is removed on drop.
pub struct ServiceHarness {
    kind: BackendKind,
    dir: TempDir,
    host: HostEnv,
    config: ServiceConfig,
    supervisor: Arc<FakeSupervisor>,
    timeout: Duration,
}

impl std::fmt::Debug for ServiceHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHarness")
            .field("kind", &self.kind)
            .field("root", &self.dir.path())
            .finish_non_exhaustive()
    }
}

impl ServiceHarness {
    /// Creates a harness whose host selects `kind`.
    ///
    /// # Errors
    /// Returns an error if the temporary directory cannot be created.
    pub fn new(kind: BackendKind) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let home = dir.path().join("home");
        std::fs::create_dir_all(&home)?;

        let os = match kind {
            BackendKind::LaunchAgent => "macos",
            BackendKind::Systemd | BackendKind::Termux => "linux",
            BackendKind::ScheduledTask => "windows",
        };
        let mut host = HostEnv::new(os)
            .with_arch("arm64")
            .with_release("1.0.0")
            .with_var("HOME", home.to_string_lossy())
            .with_uid(501);
        if kind == BackendKind::Termux {
            host = host
                .with_var("TERMUX_VERSION", "0.118.0")
                .with_var("PREFIX", dir.path().join("usr").to_string_lossy());
        }

        tracing::debug!(kind = %kind, root = %dir.path().display(), "created service harness");
        Ok(Self {
            kind,
            dir,
            host,
            config: ServiceConfig::default(),
            supervisor: FakeSupervisor::new(),
            timeout: Duration::from_secs(5),
        })
    }

    /// Creates one harness per backend kind.
    ///
    /// # Errors
    /// Returns an error if any harness cannot be created.
    pub fn all() -> Result<Vec<Self>> {
        ALL_KINDS.into_iter().map(Self::new).collect()
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the deadline used by [`Self::timed`].
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Starts injecting faults into the supervisor.
    pub fn with_chaos(&self, config: ChaosConfig) -> Arc<ChaosInjector> {
        self.supervisor.inject(config)
    }

    /// Returns the backend kind under test.
    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    /// Returns the temporary root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the simulated host.
    #[must_use]
    pub const fn host(&self) -> &HostEnv {
        &self.host
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the simulated supervisor.
    #[must_use]
    pub const fn supervisor(&self) -> &Arc<FakeSupervisor> {
        &self.supervisor
    }

    /// Returns the name the supervisor knows the service by.
    #[must_use]
    pub fn service_name(&self) -> String {
        match self.kind {
            BackendKind::LaunchAgent => self.config.launchd_label(),
            BackendKind::Systemd => self.config.systemd_unit(),
            BackendKind::ScheduledTask => self.config.scheduled_task_name(),
            BackendKind::Termux => self.config.termux_service_name(),
        }
    }

    /// Returns the supervisor's view of the service.
    #[must_use]
    pub fn service_state(&self) -> ServiceState {
        self.supervisor
            .state(Supervisor::for_kind(self.kind), &self.service_name())
    }

    /// Builds the backend through the selector.
    ///
    /// # Errors
    /// Returns an error if selection fails or picks a different kind.
    pub fn backend(&self) -> Result<Box<dyn ServiceBackend>> {
        let runner: Arc<dyn CommandRunner> = self.supervisor.clone();
        let backend = select_backend(&self.host, &self.config, runner)?;
        if backend.kind() != self.kind {
            return Err(TestError::harness(format!(
                "selector picked {} for a {} host",
                backend.kind(),
                self.kind
            )));
        }
        Ok(backend)
    }

    /// Builds a manager around the backend.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be built.
    pub fn manager(&self) -> Result<ServiceManager> {
        Ok(ServiceManager::new(self.backend()?))
    }

    /// Runs `fut` under the harness deadline.
    ///
    /// # Errors
    /// Returns [`TestError::Timeout`] if the deadline passes first.
    pub async fn timed<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| TestError::Timeout(self.timeout))
    }

    /// Checks the supervisor's loaded flag.
    ///
    /// # Errors
    /// Returns [`TestError::Assertion`] on mismatch.
    pub fn assert_registered(&self, expected: bool) -> Result<()> {
        let state = self.service_state();
        if state.loaded == expected {
            Ok(())
        } else {
            Err(TestError::assertion(format!(
                "{} service {} registered={}, expected {expected}",
                self.kind,
                self.service_name(),
                state.loaded
            )))
        }
    }
}

/// The gateway command used across lifecycle tests.
///
/// # Errors
/// Never fails in practice; the argument list is non-empty.
pub fn gateway_spec() -> Result<InstallSpec> {
    Ok(InstallSpec::new(["node", "server.js"])?.with_env("PORT", "8080"))
}
