//! Core types for service lifecycle management.
//!
//! Install requests go in, persisted commands and runtime status come out.
//! Every backend speaks these types regardless of its artifact format.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

// =============================================================================
// InstallSpec
// =============================================================================

/// Abstract install request, rendered by each backend into its native artifact.
///
/// `program_arguments[0]` is the executable path. Environment entries whose
/// value is `None` are dropped before persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallSpec {
    program_arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    working_directory: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl InstallSpec {
    /// Creates a spec from an argument vector.
    ///
    /// # Errors
    /// Returns [`ServiceError::InvalidSpec`] if the vector is empty or the
    /// executable path is blank.
    pub fn new<I, S>(program_arguments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = Self {
            program_arguments: program_arguments.into_iter().map(Into::into).collect(),
            working_directory: None,
            environment: BTreeMap::new(),
            description: None,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), Some(value.into()));
        self
    }

    /// Merges an environment mapping; `None` values are kept here and
    /// dropped at render time.
    #[must_use]
    pub fn with_environment<I, K>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        self.environment
            .extend(env.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Sets the human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validates the install request.
    ///
    /// # Errors
    /// Returns an error if there is no executable.
    pub fn validate(&self) -> Result<()> {
        match self.program_arguments.first() {
            None => Err(ServiceError::invalid_spec(
                "programArguments must not be empty",
            )),
            Some(exe) if exe.trim().is_empty() => Err(ServiceError::invalid_spec(
                "programArguments[0] must be an executable path",
            )),
            Some(_) => Ok(()),
        }
    }

    /// Returns the argument vector.
    #[must_use]
    pub fn program_arguments(&self) -> &[String] {
        &self.program_arguments
    }

    /// Returns the working directory, if set.
    #[must_use]
    pub fn working_directory(&self) -> Option<&Path> {
        self.working_directory.as_deref()
    }

    /// Returns the description, if set.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the environment with absent values dropped.
    #[must_use]
    pub fn persisted_environment(&self) -> BTreeMap<String, String> {
        self.environment
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect()
    }
}

// =============================================================================
// PersistedCommand
// =============================================================================

/// Command reconstructed from whatever a backend persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCommand {
    /// Argument vector, executable first.
    pub program_arguments: Vec<String>,
    /// Working directory, if the artifact records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Environment, `None` when the artifact carries no entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<BTreeMap<String, String>>,
    /// Path of the artifact the command was read from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl PersistedCommand {
    /// Returns an environment value by key.
    #[must_use]
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment
            .as_ref()
            .and_then(|env| env.get(key))
            .map(String::as_str)
    }
}

/// Wraps a parsed environment map, collapsing an empty map to `None`.
pub(crate) fn non_empty(env: BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    if env.is_empty() { None } else { Some(env) }
}

// =============================================================================
// RuntimeStatus
// =============================================================================

/// Canonical liveness of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// The supervisor reports the service running.
    Running,
    /// The supervisor reports the service stopped.
    Stopped,
    /// The status could not be determined.
    Unknown,
}

impl ServiceStatus {
    /// Returns the status as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time runtime status.
///
/// Fields are private so the invariants hold by construction: `pid` only
/// with [`ServiceStatus::Running`], `detail` only with
/// [`ServiceStatus::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeStatus {
    status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl RuntimeStatus {
    /// Running, with backend substate and pid when determinable.
    ///
    /// A pid of zero is treated as undeterminable.
    #[must_use]
    pub fn running(state: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            status: ServiceStatus::Running,
            state: Some(state.into()),
            pid: pid.filter(|p| *p > 0),
            detail: None,
        }
    }

    /// Stopped, with backend substate.
    #[must_use]
    pub fn stopped(state: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Stopped,
            state: Some(state.into()),
            pid: None,
            detail: None,
        }
    }

    /// Unknown, carrying the raw text or error as diagnostic detail.
    #[must_use]
    pub fn unknown(detail: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Unknown,
            state: None,
            pid: None,
            detail: Some(detail.into()),
        }
    }

    /// Returns the canonical status.
    #[must_use]
    pub const fn status(&self) -> ServiceStatus {
        self.status
    }

    /// Returns the backend-specific substate.
    #[must_use]
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Returns the pid of a running service.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns the diagnostic detail of an unknown status.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns true if the service is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.status, ServiceStatus::Running)
    }
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(state) = &self.state {
            write!(f, " ({state})")?;
        }
        if let Some(pid) = self.pid {
            write!(f, " pid {pid}")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

// =============================================================================
// Uninstall outcome
// =============================================================================

/// What happened to the artifact during uninstall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactRemoval {
    /// The artifact existed and was removed.
    Removed(PathBuf),
    /// There was nothing to remove.
    NotFound(PathBuf),
}

impl ArtifactRemoval {
    /// Returns the artifact path.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Removed(p) | Self::NotFound(p) => p,
        }
    }
}

/// What happened to the supervisor registration during uninstall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisableOutcome {
    /// The supervisor accepted the disable request.
    Disabled,
    /// The disable request failed; uninstall continued anyway.
    Failed(String),
}

/// Result of a successful uninstall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallReport {
    /// Artifact removal outcome.
    pub artifact: ArtifactRemoval,
    /// Disable outcome.
    pub disable: DisableOutcome,
}

impl UninstallReport {
    /// Returns true if an artifact was actually removed.
    #[must_use]
    pub const fn removed(&self) -> bool {
        matches!(self.artifact, ArtifactRemoval::Removed(_))
    }
}

impl fmt::Display for UninstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.artifact {
            ArtifactRemoval::Removed(p) => write!(f, "Removed service: {}", p.display()),
            ArtifactRemoval::NotFound(p) => write!(f, "Service not found at {}", p.display()),
        }
    }
}
