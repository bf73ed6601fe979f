//! Outbound application events.
//!
//! The domain emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them; the firmware logs them to the console.

use crate::adapters::device_id::DeviceIdString;

use super::telemetry::{TelemetryRecord, VersionString};

/// Who drives the LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    /// LED follows the presence sensor.
    Automatic,
    /// LED set by remote command; sensor ignored.
    Manual,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The node finished booting.
    Started {
        device_id: DeviceIdString,
        version: VersionString,
    },

    /// Status record built on a poll tick.
    Telemetry(TelemetryRecord),

    /// The LED changed level.
    ActuatorChanged { on: bool, mode: ControlMode },

    /// Manual override was entered or cleared.
    ModeChanged(ControlMode),

    /// An `OTA` command was accepted (job spawned) or dropped because a
    /// job is already running.
    UpdateRequested { accepted: bool },
}
