// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # velador-core
//!
//! Cross-platform lifecycle management for one long-running gateway
//! service. A single [`ServiceBackend`] contract (install, uninstall, stop,
//! restart, is_loaded, read_command, read_runtime) is implemented by four
//! native supervisors:
//!
//! - [`LaunchAgentBackend`]: macOS launchd per-user agent
//! - [`SystemdBackend`]: Linux systemd user (or system) unit
//! - [`ScheduledTaskBackend`]: Windows Task Scheduler logon task
//! - [`TermuxServiceBackend`]: Android/Termux runit (termux-services)
//!
//! The backend is chosen once from an explicit [`HostEnv`] by
//! [`select_backend`] and held by a [`ServiceManager`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use velador_core::{InstallSpec, ServiceManager};
//!
//! let manager = ServiceManager::current()?;
//! let spec = InstallSpec::new(["/usr/bin/node", "gateway.js"])?.with_env("PORT", "8080");
//! manager.install(&spec).await?;
//! println!("{}", manager.summary().await);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod backends;
pub mod config;
pub mod error;
pub mod manager;
pub mod platform;
pub mod runner;
#[cfg(test)]
pub mod tests;
pub mod types;

pub use backend::ServiceBackend;
pub use backends::{
    LaunchAgentBackend, ScheduledTaskBackend, SystemdBackend, TermuxLayout, TermuxServiceBackend,
    build_backend, select_backend, select_current,
};
pub use config::ServiceConfig;
pub use error::{InstallCause, Result, ServiceError, ToolError, ToolResult};
pub use manager::{ServiceManager, ServiceSummary};
pub use platform::{BackendKind, HostEnv, HostOs, OsSummary, TERMUX_SENTINEL};
pub use runner::{CommandOutput, CommandRunner, SystemRunner, command_line};
pub use types::{
    ArtifactRemoval, DisableOutcome, InstallSpec, PersistedCommand, RuntimeStatus, ServiceStatus,
    UninstallReport,
};
