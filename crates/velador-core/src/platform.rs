//! Host description and backend selection.
//!
//! Selection is a pure function of an explicit [`HostEnv`]: the OS
//! identifier plus, on Linux, the `TERMUX_VERSION` sentinel. No filesystem
//! heuristics are consulted, because Termux reports a plain Linux kernel.
//!
//! # Selection Table
//! | OS identifier        | Sentinel         | Backend         |
//! |----------------------|------------------|-----------------|
//! | `macos` / `darwin`   | -                | LaunchAgent     |
//! | `linux`              | `TERMUX_VERSION` | termux-services |
//! | `linux`              | unset            | systemd         |
//! | `windows` / `win32`  | -                | Scheduled Task  |
//! | anything else        | -                | error           |

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Environment variable whose presence marks a Termux host.
pub const TERMUX_SENTINEL: &str = "TERMUX_VERSION";

// =============================================================================
// HostOs
// =============================================================================

/// Operating systems with a service backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HostOs {
    /// macOS (launchd).
    MacOs,
    /// Linux (systemd, or runit under Termux).
    Linux,
    /// Windows (Task Scheduler).
    Windows,
}

impl HostOs {
    /// Parses an OS identifier (`std::env::consts::OS` or Node-style
    /// `process.platform` spellings), case-insensitively.
    #[must_use]
    pub fn parse(identifier: &str) -> Option<Self> {
        match identifier.trim().to_ascii_lowercase().as_str() {
            "macos" | "darwin" => Some(Self::MacOs),
            "linux" => Some(Self::Linux),
            "windows" | "win32" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// HostEnv
// =============================================================================

/// Explicit snapshot of the host: OS identifier, architecture, kernel
/// release and environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostEnv {
    os: String,
    arch: String,
    release: Option<String>,
    uid: Option<u32>,
    vars: HashMap<String, String>,
}

impl HostEnv {
    /// Creates a host description with no environment variables.
    #[must_use]
    pub fn new(os: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: std::env::consts::ARCH.to_string(),
            release: None,
            uid: None,
            vars: HashMap::new(),
        }
    }

    /// Captures the current process: OS, arch, kernel release and environment.
    ///
    /// When neither `HOME` nor `USERPROFILE` is set, `HOME` is seeded from
    /// the platform's home-directory lookup.
    #[must_use]
    pub fn current() -> Self {
        let mut host = Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            release: kernel_release(),
            uid: current_uid(),
            vars: std::env::vars().collect(),
        };
        if host.home_dir().is_none() {
            if let Some(home) = dirs_next::home_dir() {
                host.vars
                    .insert("HOME".to_string(), home.to_string_lossy().into_owned());
            }
        }
        host
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Sets the architecture.
    #[must_use]
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    /// Sets the kernel release.
    #[must_use]
    pub fn with_release(mut self, release: impl Into<String>) -> Self {
        self.release = Some(release.into());
        self
    }

    /// Sets the numeric user id.
    #[must_use]
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Returns the raw OS identifier.
    #[must_use]
    pub fn os_identifier(&self) -> &str {
        &self.os
    }

    /// Returns the parsed OS, if supported.
    #[must_use]
    pub fn os(&self) -> Option<HostOs> {
        HostOs::parse(&self.os)
    }

    /// Returns the architecture.
    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Returns the kernel release, if known.
    #[must_use]
    pub fn release(&self) -> Option<&str> {
        self.release.as_deref()
    }

    /// Returns the numeric user id, if known.
    #[must_use]
    pub const fn uid(&self) -> Option<u32> {
        self.uid
    }

    /// Returns a non-empty environment variable.
    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Returns true on Linux with the Termux sentinel set.
    #[must_use]
    pub fn is_termux(&self) -> bool {
        self.os() == Some(HostOs::Linux) && self.var(TERMUX_SENTINEL).is_some()
    }

    /// Resolves the user's home directory from `HOME`, then `USERPROFILE`.
    #[must_use]
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.var("HOME")
            .or_else(|| self.var("USERPROFILE"))
            .map(PathBuf::from)
    }
}

#[cfg(unix)]
fn kernel_release() -> Option<String> {
    nix::sys::utsname::uname()
        .ok()
        .map(|uts| uts.release().to_string_lossy().into_owned())
}

#[cfg(not(unix))]
fn kernel_release() -> Option<String> {
    None
}

#[cfg(unix)]
fn current_uid() -> Option<u32> {
    Some(nix::unistd::getuid().as_raw())
}

#[cfg(not(unix))]
fn current_uid() -> Option<u32> {
    None
}

// =============================================================================
// BackendKind
// =============================================================================

/// The four service backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    /// macOS per-user launch agent.
    LaunchAgent,
    /// Linux systemd user service.
    Systemd,
    /// Windows Task Scheduler logon task.
    ScheduledTask,
    /// Termux runit service (termux-services).
    Termux,
}

impl BackendKind {
    /// Chooses exactly one backend for the host.
    ///
    /// # Errors
    /// Returns [`ServiceError::UnsupportedPlatform`] for any OS without a backend.
    pub fn detect(host: &HostEnv) -> Result<Self> {
        match host.os() {
            Some(HostOs::MacOs) => Ok(Self::LaunchAgent),
            Some(HostOs::Linux) if host.is_termux() => Ok(Self::Termux),
            Some(HostOs::Linux) => Ok(Self::Systemd),
            Some(HostOs::Windows) => Ok(Self::ScheduledTask),
            None => Err(ServiceError::UnsupportedPlatform(
                host.os_identifier().to_string(),
            )),
        }
    }

    /// Returns the user-facing label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::LaunchAgent => "LaunchAgent",
            Self::Systemd => "systemd",
            Self::ScheduledTask => "Scheduled Task",
            Self::Termux => "termux-services",
        }
    }

    /// Returns the wording used when the service is loaded.
    #[must_use]
    pub const fn loaded_text(&self) -> &'static str {
        match self {
            Self::LaunchAgent => "loaded",
            Self::Systemd | Self::Termux => "enabled",
            Self::ScheduledTask => "registered",
        }
    }

    /// Returns the wording used when the service is not loaded.
    #[must_use]
    pub const fn not_loaded_text(&self) -> &'static str {
        match self {
            Self::LaunchAgent => "not loaded",
            Self::Systemd | Self::Termux => "disabled",
            Self::ScheduledTask => "missing",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// OsSummary
// =============================================================================

/// Short description of the host for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsSummary {
    /// Raw OS identifier.
    pub platform: String,
    /// Architecture.
    pub arch: String,
    /// Kernel release, `unknown` if not known.
    pub release: String,
    /// Display label.
    pub label: String,
}

impl OsSummary {
    /// Builds the summary for a host.
    #[must_use]
    pub fn resolve(host: &HostEnv) -> Self {
        let release = host.release().unwrap_or("unknown").to_string();
        let label = match host.var(TERMUX_SENTINEL) {
            Some(version) if host.is_termux() => {
                format!("android termux {version} ({})", host.arch())
            }
            _ => format!("{} {release} ({})", host.os_identifier(), host.arch()),
        };
        Self {
            platform: host.os_identifier().to_string(),
            arch: host.arch().to_string(),
            release,
            label,
        }
    }
}
