//! Service backend abstraction.
//!
//! Every backend implements the same lifecycle contract for one fixed,
//! named service:
//! - install / uninstall: create or remove the native artifact and
//!   register or unregister it with the supervisor
//! - stop / restart: forward to the supervisor
//! - is_loaded / read_command / read_runtime: read-only, never fail
//!
//! No locking is performed. Two processes installing at the same time race
//! on the artifact (last writer wins) and rely on the supervisor's own
//! atomicity. Calls shell out to external tools and may block for as long
//! as those tools do; wrap them in `tokio::time::timeout` where that matters.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;
use crate::platform::BackendKind;
use crate::types::{InstallSpec, PersistedCommand, RuntimeStatus, UninstallReport};

/// OS-specific service lifecycle backend.
#[async_trait]
pub trait ServiceBackend: Send + Sync {
    /// Returns which backend this is.
    fn kind(&self) -> BackendKind;

    /// Returns the path of the artifact this backend manages.
    fn artifact_path(&self) -> PathBuf;

    /// Renders and persists the artifact, then enables it.
    ///
    /// Re-installing replaces any prior artifact. Returns the artifact path.
    ///
    /// # Errors
    /// Returns [`crate::ServiceError::Install`] if the artifact cannot be
    /// written or the supervisor refuses it, and
    /// [`crate::ServiceError::InvalidSpec`] for a malformed spec.
    async fn install(&self, spec: &InstallSpec) -> Result<PathBuf>;

    /// Disables the service and removes the artifact, both best-effort.
    ///
    /// A service that was never installed is a success with
    /// [`crate::ArtifactRemoval::NotFound`].
    ///
    /// # Errors
    /// Returns [`crate::ServiceError::Uninstall`] only if the artifact exists
    /// and cannot be removed.
    async fn uninstall(&self) -> Result<UninstallReport>;

    /// Stops the running service.
    ///
    /// # Errors
    /// Propagates supervisor failures, including a missing tool.
    async fn stop(&self) -> Result<()>;

    /// Restarts the service.
    ///
    /// # Errors
    /// Propagates supervisor failures, including a missing tool.
    async fn restart(&self) -> Result<()>;

    /// Returns true if the service is registered with the supervisor.
    async fn is_loaded(&self) -> bool;

    /// Reconstructs the persisted command, `None` if not installed or
    /// unparsable.
    async fn read_command(&self) -> Option<PersistedCommand>;

    /// Queries live status; failures become [`RuntimeStatus::unknown`].
    async fn read_runtime(&self) -> RuntimeStatus;
}

impl fmt::Debug for dyn ServiceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBackend")
            .field("kind", &self.kind())
            .field("artifact", &self.artifact_path())
            .finish()
    }
}
