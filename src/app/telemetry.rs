//! Telemetry record and publisher.
//!
//! Wire format (pipe-delimited, key-prefixed, fixed order, no escaping):
//!
//! ```text
//! tt<unix_seconds>|d<0|1>|c<count>|a<0|1>|v<version>|uid<device_id>
//! ```
//!
//! Published on every poll tick, retained, at-least-once. There is no
//! change detection: an unchanged state is still republished.

use core::fmt::{self, Write};

use log::{debug, warn};

use crate::adapters::device_id::DeviceIdString;
use crate::error::CommsError;
use crate::sensors::SensorReading;

use super::ports::{Qos, TelemetryPort};

/// Longest firmware version string carried in a record.
pub const MAX_VERSION_LEN: usize = 32;

pub type VersionString = heapless::String<MAX_VERSION_LEN>;

/// Encoded status line.
pub type TelemetryPayload = heapless::String<192>;

/// Point-in-time status snapshot. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub timestamp: u64,
    pub detected: bool,
    pub detection_count: u32,
    pub actuator_on: bool,
    pub firmware_version: VersionString,
    pub device_id: DeviceIdString,
}

impl TelemetryRecord {
    /// Assemble a record. Over-long version or id strings are rejected.
    pub fn new(
        timestamp: u64,
        reading: SensorReading,
        actuator_on: bool,
        firmware_version: &str,
        device_id: &str,
    ) -> Result<Self, CommsError> {
        Ok(Self {
            timestamp,
            detected: reading.object_detected,
            detection_count: reading.detection_count,
            actuator_on,
            firmware_version: VersionString::try_from(firmware_version)
                .map_err(|_| CommsError::PayloadTooLarge)?,
            device_id: DeviceIdString::try_from(device_id).map_err(|_| CommsError::PayloadTooLarge)?,
        })
    }

    /// Render the wire payload.
    pub fn encode(&self) -> Result<TelemetryPayload, CommsError> {
        let mut out = TelemetryPayload::new();
        write!(out, "{self}").map_err(|_| CommsError::PayloadTooLarge)?;
        Ok(out)
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tt{}|d{}|c{}|a{}|v{}|uid{}",
            self.timestamp,
            u8::from(self.detected),
            self.detection_count,
            u8::from(self.actuator_on),
            self.firmware_version,
            self.device_id,
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Publisher
// ───────────────────────────────────────────────────────────────

/// Sends status records to the fixed telemetry topic.
pub struct TelemetryPublisher<T> {
    port: T,
    topic: String,
    published: u32,
    failures: u32,
}

impl<T: TelemetryPort> TelemetryPublisher<T> {
    pub fn new(port: T, topic: impl Into<String>) -> Self {
        Self {
            port,
            topic: topic.into(),
            published: 0,
            failures: 0,
        }
    }

    /// Encode and publish one record (retain, at-least-once).
    ///
    /// Failures are counted and logged here; the caller just carries on
    /// to the next tick.
    pub fn publish(&mut self, record: &TelemetryRecord) -> Result<(), CommsError> {
        let result = record
            .encode()
            .and_then(|payload| {
                self.port
                    .publish(&self.topic, payload.as_bytes(), Qos::AtLeastOnce, true)
                    .map(|()| payload)
            });

        match result {
            Ok(payload) => {
                self.published = self.published.wrapping_add(1);
                debug!("telemetry: [{}] {}", self.published, payload);
                Ok(())
            }
            Err(e) => {
                self.failures = self.failures.wrapping_add(1);
                warn!("telemetry: publish to '{}' failed: {}", self.topic, e);
                Err(e)
            }
        }
    }

    pub fn published(&self) -> u32 {
        self.published
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Borrow the underlying port (test inspection).
    pub fn port(&self) -> &T {
        &self.port
    }
}
