//! Termux:API device wrappers.
//!
//! Each wrapper builds an argument vector from optional parameters, invokes
//! one fixed `termux-*` binary through the injected [`CommandRunner`], and
//! parses its stdout as JSON when the binary emits JSON. Binaries that print
//! nothing succeed on a zero exit.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use velador_core::{CommandRunner, command_line};

use crate::error::{DeviceError, Result};

/// A notification to post with `termux-notification`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notification {
    /// Title line.
    pub title: Option<String>,
    /// Body text.
    pub content: Option<String>,
    /// Identifier; posting again with the same id replaces the notification.
    pub id: Option<String>,
    /// Group key.
    pub group: Option<String>,
}

impl Notification {
    /// Creates a notification with a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Sets the body text.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the notification id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the group key.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Builds the `termux-notification` arguments. Empty fields are skipped.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (flag, value) in [
            ("-t", &self.title),
            ("-c", &self.content),
            ("--id", &self.id),
            ("-g", &self.group),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        }
        args
    }
}

/// Which camera to use for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    /// Front (selfie) camera.
    Front,
    /// Back camera.
    Back,
}

/// Snapshot request for `termux-camera-photo`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapRequest {
    /// Preferred facing, used when no device id is given.
    pub facing: Option<CameraFacing>,
    /// Explicit camera id from `termux-camera-info`.
    pub device_id: Option<String>,
}

impl SnapRequest {
    /// Returns the camera id: the explicit device id, else `1` for the
    /// front camera and `0` otherwise.
    #[must_use]
    pub fn camera_id(&self) -> &str {
        match self.device_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ if self.facing == Some(CameraFacing::Front) => "1",
            _ => "0",
        }
    }
}

/// A captured photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSnap {
    /// Image format, always `jpg`.
    pub format: &'static str,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Width in pixels, 0 when the camera tool does not report it.
    pub width: u32,
    /// Height in pixels, 0 when the camera tool does not report it.
    pub height: u32,
}

/// Location provider for `termux-location -p`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocationProvider {
    /// Satellite fix.
    #[default]
    Gps,
    /// Cell and wifi.
    Network,
    /// Whatever another app last requested.
    Passive,
}

impl LocationProvider {
    /// Returns the command-line value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Network => "network",
            Self::Passive => "passive",
        }
    }
}

/// Request kind for `termux-location -r`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LocationRequest {
    /// One fresh fix.
    #[default]
    Once,
    /// Last known fix.
    Last,
    /// Continuous updates.
    Updates,
}

impl LocationRequest {
    /// Returns the command-line value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Last => "last",
            Self::Updates => "updates",
        }
    }
}

/// An SMS to send with `termux-sms-send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    /// Recipient numbers.
    pub numbers: Vec<String>,
    /// Message body.
    pub text: String,
    /// SIM slot, for dual-SIM devices.
    pub slot: Option<u8>,
}

impl SmsMessage {
    /// Creates a message to the given recipients.
    #[must_use]
    pub fn new<I, S>(numbers: I, text: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            numbers: numbers.into_iter().map(Into::into).collect(),
            text: text.into(),
            slot: None,
        }
    }

    /// Sends from the given SIM slot.
    #[must_use]
    pub const fn with_slot(mut self, slot: u8) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Builds the `termux-sms-send` arguments.
    ///
    /// # Errors
    /// Returns [`DeviceError::InvalidRequest`] without recipients.
    pub fn args(&self) -> Result<Vec<String>> {
        let numbers: Vec<&str> = self
            .numbers
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .collect();
        if numbers.is_empty() {
            return Err(DeviceError::invalid_request("sms needs at least one recipient"));
        }
        let mut args = vec!["-n".to_string(), numbers.join(",")];
        if let Some(slot) = self.slot {
            args.push("-s".to_string());
            args.push(slot.to_string());
        }
        args.push(self.text.clone());
        Ok(args)
    }
}

/// Message box for `termux-sms-list -t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsBox {
    /// Every box.
    All,
    /// Received messages.
    Inbox,
    /// Sent messages.
    Sent,
    /// Drafts.
    Draft,
    /// Queued outgoing messages.
    Outbox,
}

impl SmsBox {
    /// Returns the command-line value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Draft => "draft",
            Self::Outbox => "outbox",
        }
    }
}

/// Filter for `termux-sms-list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmsQuery {
    /// Maximum number of messages.
    pub limit: Option<u32>,
    /// Messages to skip.
    pub offset: Option<u32>,
    /// Box to list.
    pub kind: Option<SmsBox>,
}

impl SmsQuery {
    /// Builds the `termux-sms-list` arguments.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(limit) = self.limit {
            args.extend(["-l".to_string(), limit.to_string()]);
        }
        if let Some(offset) = self.offset {
            args.extend(["-o".to_string(), offset.to_string()]);
        }
        if let Some(kind) = self.kind {
            args.extend(["-t".to_string(), kind.as_str().to_string()]);
        }
        args
    }
}

/// Output of `termux-battery-status`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryStatus {
    /// Health, e.g. `GOOD`.
    pub health: Option<String>,
    /// Charge level in percent.
    pub percentage: Option<u8>,
    /// Power source, e.g. `UNPLUGGED`, `PLUGGED_AC`.
    pub plugged: Option<String>,
    /// Charging state, e.g. `CHARGING`, `DISCHARGING`.
    pub status: Option<String>,
    /// Temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Current in microamperes.
    pub current: Option<i64>,
}

/// Termux:API access through a command runner.
#[derive(Clone)]
pub struct TermuxDevice {
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for TermuxDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermuxDevice").finish_non_exhaustive()
    }
}

impl TermuxDevice {
    /// Creates a device wrapper.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Posts a notification.
    pub async fn notify(&self, notification: &Notification) -> Result<()> {
        self.call("termux-notification", &notification.args()).await
    }

    /// Lists cameras as reported by `termux-camera-info`.
    pub async fn camera_list(&self) -> Result<serde_json::Value> {
        self.json("termux-camera-info", &[]).await
    }

    /// Takes a photo into `path` and returns its bytes.
    ///
    /// The file is left at `path`; callers choose a temporary location.
    pub async fn camera_snap(&self, request: &SnapRequest, path: &Path) -> Result<CameraSnap> {
        let path_arg = path.to_string_lossy().into_owned();
        let args = ["-c".to_string(), request.camera_id().to_string(), path_arg];
        self.call("termux-camera-photo", &args).await?;
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "captured photo");
        Ok(CameraSnap {
            format: "jpg",
            bytes,
            width: 0,
            height: 0,
        })
    }

    /// Reads the device location.
    pub async fn location(
        &self,
        provider: LocationProvider,
        request: LocationRequest,
    ) -> Result<serde_json::Value> {
        let args = [
            "-p".to_string(),
            provider.as_str().to_string(),
            "-r".to_string(),
            request.as_str().to_string(),
        ];
        self.json("termux-location", &args).await
    }

    /// Sends an SMS.
    pub async fn sms_send(&self, message: &SmsMessage) -> Result<()> {
        let args = message.args()?;
        self.call("termux-sms-send", &args).await
    }

    /// Lists SMS messages.
    pub async fn sms_list(&self, query: &SmsQuery) -> Result<serde_json::Value> {
        self.json("termux-sms-list", &query.args()).await
    }

    /// Reads the battery status.
    pub async fn battery(&self) -> Result<BatteryStatus> {
        self.json("termux-battery-status", &[]).await
    }

    /// Reads the current wifi connection.
    pub async fn wifi(&self) -> Result<serde_json::Value> {
        self.json("termux-wifi-connectioninfo", &[]).await
    }

    /// Reads telephony device info.
    pub async fn telephony(&self) -> Result<serde_json::Value> {
        self.json("termux-telephony-deviceinfo", &[]).await
    }

    /// Switches the torch on or off.
    pub async fn torch(&self, on: bool) -> Result<()> {
        let state = if on { "on" } else { "off" };
        self.call("termux-torch", &[state.to_string()]).await
    }

    async fn call(&self, program: &str, args: &[String]) -> Result<()> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run(program, &argv).await?;
        Ok(())
    }

    async fn json<T: DeserializeOwned>(&self, program: &str, args: &[String]) -> Result<T> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.run(program, &argv).await?;
        serde_json::from_str(&output.stdout).map_err(|source| DeviceError::Json {
            command: command_line(program, &argv),
            source,
        })
    }
}
