//! Service configuration.
//!
//! Configuration is validated at load time with sensible defaults. Values
//! come from three layers, lowest first: built-in defaults, an optional TOML
//! file ([`ServiceConfig::load`]), and environment overrides
//! ([`ServiceConfig::apply_env`]).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};
use crate::platform::HostEnv;

/// Selects a named profile; names gain a `-<profile>` suffix.
pub const PROFILE_ENV: &str = "VELADOR_PROFILE";
/// Overrides the application home (state and logs).
pub const STATE_DIR_ENV: &str = "VELADOR_STATE_DIR";
/// Overrides the Termux service directory name.
pub const TERMUX_SERVICE_ENV: &str = "VELADOR_TERMUX_SERVICE";

/// Termux home when `HOME` is not available.
pub const TERMUX_HOME: &str = "/data/data/com.termux/files/home";

/// Configuration of the managed gateway service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base service name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Optional profile, appended to every service name.
    #[serde(default)]
    pub profile: Option<String>,

    /// Reverse-DNS prefix of the launchd label.
    #[serde(default = "default_label_prefix")]
    pub launchd_label_prefix: String,

    /// Windows scheduled task name.
    #[serde(default = "default_task_name")]
    pub task_name: String,

    /// Application home; defaults to `~/.velador`.
    #[serde(default)]
    pub app_home: Option<PathBuf>,

    /// Termux service directory name override.
    #[serde(default)]
    pub termux_service: Option<String>,

    /// Install a systemd user unit (`systemctl --user`) rather than a system unit.
    #[serde(default = "default_true")]
    pub systemd_user: bool,
}

const fn default_true() -> bool {
    true
}

fn default_name() -> String {
    "velador-gateway".to_string()
}

fn default_label_prefix() -> String {
    "dev.velador".to_string()
}

fn default_task_name() -> String {
    "Velador Gateway".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            profile: None,
            launchd_label_prefix: default_label_prefix(),
            task_name: default_task_name(),
            app_home: None,
            termux_service: None,
            systemd_user: true,
        }
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl ServiceConfig {
    /// Creates a configuration with a custom base name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Sets the application home.
    #[must_use]
    pub fn with_app_home(mut self, dir: impl Into<PathBuf>) -> Self {
        self.app_home = Some(dir.into());
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if a name contains characters unsafe for file names,
    /// unit names or labels.
    pub fn validate(&self) -> Result<()> {
        if !is_identifier(&self.name) {
            return Err(ServiceError::config(
                "name must be non-empty and contain only alphanumeric characters, hyphens, and underscores",
            ));
        }
        if let Some(profile) = &self.profile {
            if !is_identifier(profile) {
                return Err(ServiceError::config(
                    "profile must contain only alphanumeric characters, hyphens, and underscores",
                ));
            }
        }
        if let Some(svc) = &self.termux_service {
            if !is_identifier(svc) {
                return Err(ServiceError::config(
                    "termux_service must contain only alphanumeric characters, hyphens, and underscores",
                ));
            }
        }
        if self.launchd_label_prefix.is_empty()
            || !self
                .launchd_label_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(ServiceError::config(
                "launchd_label_prefix must be a reverse-DNS identifier",
            ));
        }
        if self.task_name.trim().is_empty() || self.task_name.contains('"') {
            return Err(ServiceError::config(
                "task_name must be non-empty and must not contain quotes",
            ));
        }
        Ok(())
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ServiceError::config(format!("failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ServiceError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the default configuration overlaid with environment overrides.
    ///
    /// # Errors
    /// Returns an error if an override fails validation.
    pub fn from_env(host: &HostEnv) -> Result<Self> {
        Self::default().apply_env(host)
    }

    /// Applies `VELADOR_PROFILE`, `VELADOR_STATE_DIR` and
    /// `VELADOR_TERMUX_SERVICE` overrides.
    ///
    /// # Errors
    /// Returns an error if the result fails validation.
    pub fn apply_env(mut self, host: &HostEnv) -> Result<Self> {
        if let Some(profile) = host.var(PROFILE_ENV) {
            self.profile = Some(profile.trim().to_string());
        }
        if let Some(dir) = host.var(STATE_DIR_ENV) {
            self.app_home = Some(PathBuf::from(dir));
        }
        if let Some(svc) = host.var(TERMUX_SERVICE_ENV) {
            self.termux_service = Some(svc.trim().to_string());
        }
        self.validate()?;
        Ok(self)
    }

    /// Returns the profile-qualified base name.
    #[must_use]
    pub fn service_base(&self) -> String {
        match self.profile.as_deref() {
            Some(profile) if !profile.is_empty() && profile != "default" => {
                format!("{}-{profile}", self.name)
            }
            _ => self.name.clone(),
        }
    }

    /// Returns the systemd unit file name.
    #[must_use]
    pub fn systemd_unit(&self) -> String {
        format!("{}.service", self.service_base())
    }

    /// Returns the launchd label.
    #[must_use]
    pub fn launchd_label(&self) -> String {
        format!("{}.{}", self.launchd_label_prefix, self.service_base())
    }

    /// Returns the scheduled task name.
    #[must_use]
    pub fn scheduled_task_name(&self) -> String {
        match self.profile.as_deref() {
            Some(profile) if !profile.is_empty() && profile != "default" => {
                format!("{} ({profile})", self.task_name)
            }
            _ => self.task_name.clone(),
        }
    }

    /// Returns the Termux service directory name.
    #[must_use]
    pub fn termux_service_name(&self) -> String {
        self.termux_service
            .clone()
            .unwrap_or_else(|| self.service_base())
    }

    /// Resolves the application home for a host.
    ///
    /// # Errors
    /// Returns an error if no home directory can be determined.
    pub fn resolve_app_home(&self, host: &HostEnv) -> Result<PathBuf> {
        if let Some(dir) = &self.app_home {
            return Ok(dir.clone());
        }
        let home = match host.home_dir() {
            Some(home) => home,
            None if host.is_termux() => PathBuf::from(TERMUX_HOME),
            None => {
                return Err(ServiceError::config(
                    "cannot determine home directory (HOME is not set)",
                ));
            }
        };
        Ok(home.join(".velador"))
    }
}
