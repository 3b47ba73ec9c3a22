// Iron Lotus: Allow unwrap/expect in tests for clear failure messages
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

//! # velador-termux
//!
//! Android/Termux companions for the gateway service:
//!
//! - [`TermuxDevice`]: thin wrappers over the Termux:API binaries
//!   (notifications, camera, location, SMS, battery, wifi, telephony, torch)
//! - [`termux_doctor`]: checks that termux-api and termux-services are
//!   installed
//!
//! Everything runs through a [`velador_core::CommandRunner`], so the
//! wrappers are testable off-device.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod device;
pub mod doctor;
pub mod error;
#[cfg(test)]
mod test_support;

pub use device::{
    BatteryStatus, CameraFacing, CameraSnap, LocationProvider, LocationRequest, Notification,
    SmsBox, SmsMessage, SmsQuery, SnapRequest, TermuxDevice,
};
pub use doctor::{DoctorNote, TERMUX_NOTE_TITLE, is_termux_services_available, termux_doctor};
pub use error::{DeviceError, Result};
