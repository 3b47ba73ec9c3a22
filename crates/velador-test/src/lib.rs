// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # velador-test
//!
//! Testing infrastructure for the velador service manager.
//!
//! This crate provides:
//! - **Simulated supervisors**: a stateful stand-in for `launchctl`,
//!   `systemctl`, `schtasks` and runit's `sv`
//! - **Fault injection**: missing tools, failing commands, added latency
//! - **Service harness**: an isolated host per backend kind
//! - **Falsification tests**: numbered claims run against every backend
//!
//! ## Iron Lotus Framework
//!
//! - **Built-in Quality** (品質の作り込み): Quality cannot be inspected in
//! - **Popperian Falsification**: Tests designed to refute claims
//!
//! ## Example
//!
//! ```rust,ignore
//! use velador_core::BackendKind;
//! use velador_test::{ChaosConfig, ServiceHarness, gateway_spec};
//!
//! let harness = ServiceHarness::new(BackendKind::Systemd)?;
//! harness.with_chaos(ChaosConfig::failing("systemctl", &["--user", "enable"], 1, "denied"));
//! let err = harness.backend()?.install(&gateway_spec()?).await.unwrap_err();
//! assert!(err.is_install());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod chaos;
pub mod error;
pub mod harness;
pub mod supervisor;

pub use chaos::{ChaosConfig, ChaosInjector, InjectedFailure};
pub use error::{Result, TestError};
pub use harness::{ALL_KINDS, ServiceHarness, gateway_spec};
pub use supervisor::{FakeSupervisor, ServiceState, Supervisor};

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`, defaulting to `warn`. Later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
