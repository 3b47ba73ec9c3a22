//! Termux environment checks.
//!
//! Both probes only ask whether the package's binaries can be started. A
//! usage error from `sv status` without arguments still proves that
//! termux-services is installed.

use serde::Serialize;
use velador_core::{CommandRunner, HostEnv};

/// Title used for every Termux note.
pub const TERMUX_NOTE_TITLE: &str = "Termux";

/// One finding to show the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorNote {
    /// Short heading.
    pub title: &'static str,
    /// What is wrong and how to fix it.
    pub message: String,
}

impl DoctorNote {
    fn termux(message: &str) -> Self {
        Self {
            title: TERMUX_NOTE_TITLE,
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for DoctorNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

const TERMUX_API_MISSING: &str = "Termux-api is not installed. Some features like notifications, camera, and location won't work.\nFix: pkg install termux-api";

const TERMUX_SERVICES_MISSING: &str =
    "termux-services is not installed. Background services won't work.\nFix: pkg install termux-services";

/// Checks the Termux add-on packages the gateway relies on.
///
/// Returns no notes when the host is not Termux.
pub async fn termux_doctor(host: &HostEnv, runner: &dyn CommandRunner) -> Vec<DoctorNote> {
    if !host.is_termux() {
        return Vec::new();
    }

    let mut notes = Vec::new();
    if let Err(err) = runner.output("termux-notification", &["-h"]).await {
        tracing::warn!(error = %err, "termux-api probe failed");
        notes.push(DoctorNote::termux(TERMUX_API_MISSING));
    }
    if !is_termux_services_available(runner).await {
        notes.push(DoctorNote::termux(TERMUX_SERVICES_MISSING));
    }
    notes
}

/// Returns true if the runit `sv` tool from termux-services can be started.
pub async fn is_termux_services_available(runner: &dyn CommandRunner) -> bool {
    match runner.output("sv", &["status"]).await {
        Ok(_) => true,
        Err(err) => {
            tracing::debug!(error = %err, "sv is unavailable");
            false
        }
    }
}
