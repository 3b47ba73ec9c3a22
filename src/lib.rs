//! Velador: Cross-Platform Gateway Service Lifecycle
//!
//! Installs, inspects and removes one long-running gateway process under the
//! host's native supervisor: launchd on macOS, systemd on Linux, Task
//! Scheduler on Windows, and runit (termux-services) on Android/Termux.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use velador::prelude::*;
//!
//! # async fn run() -> velador::core::Result<()> {
//! let manager = ServiceManager::current()?;
//! let spec = InstallSpec::new(["/usr/bin/node", "gateway.js"])?.with_env("PORT", "8080");
//! manager.install(&spec).await?;
//! println!("{}", manager.summary().await);
//! # Ok(())
//! # }
//! ```

pub use velador_core as core;
pub use velador_termux as termux;

/// Prelude module for common imports.
pub mod prelude {
    pub use velador_core::{
        BackendKind, CommandRunner, HostEnv, InstallSpec, OsSummary, PersistedCommand,
        RuntimeStatus, ServiceBackend, ServiceConfig, ServiceError, ServiceManager, ServiceStatus,
        ServiceSummary, SystemRunner, UninstallReport, select_backend,
    };
    pub use velador_termux::{DoctorNote, TermuxDevice, termux_doctor};
}
