//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ app / ota (domain)
//! ```
//!
//! Driven adapters (broker link, clock, event sinks, firmware transport)
//! implement these traits. The domain consumes them via generics, so the
//! core never touches ESP-IDF directly. GPIO goes through the
//! `embedded-hal` digital traits instead of a port of our own.

use core::time::Duration;
use std::sync::Arc;

use crate::error::CommsError;
use crate::ota::UpdateError;

// ───────────────────────────────────────────────────────────────
// Telemetry port (driven adapter: domain → broker)
// ───────────────────────────────────────────────────────────────

/// Delivery level requested for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

/// Publish side of the messaging link.
pub trait TelemetryPort {
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock seconds for telemetry timestamps.
pub trait ClockPort {
    fn unix_secs(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Update trigger (interpreter → orchestrator)
// ───────────────────────────────────────────────────────────────

/// Starts a firmware update job. Must not block: the job runs elsewhere.
pub trait UpdateTrigger {
    /// `Err(UpdateError::AlreadyInProgress)` when a job is active; the
    /// request is dropped, never queued.
    fn request_update(&self) -> Result<(), UpdateError>;
}

impl<T: UpdateTrigger + ?Sized> UpdateTrigger for Arc<T> {
    fn request_update(&self) -> Result<(), UpdateError> {
        (**self).request_update()
    }
}

// ───────────────────────────────────────────────────────────────
// Firmware transport (driven adapter: orchestrator ↔ HTTPS + OTA slot)
// ───────────────────────────────────────────────────────────────

/// Everything an update job needs from the platform.
///
/// Shared by reference with the job thread, hence `Send + Sync`. The
/// stream and writer are created on that thread and never leave it.
pub trait UpdatePlatform: Send + Sync + 'static {
    type Stream: ImageStream;
    type Writer: ImageWriter;

    /// Open a TLS-verified GET to `url`. Non-2xx status is an error.
    fn open_image(&self, url: &str, timeout: Duration) -> Result<Self::Stream, UpdateError>;

    /// Open the inactive firmware slot for writing.
    fn begin_write(&self) -> Result<Self::Writer, UpdateError>;

    /// Restart into the newly installed image. Does not return on device.
    fn restart(&self);
}

/// Body of the firmware download.
pub trait ImageStream {
    /// `Content-Length`, when the server sent one.
    fn content_length(&self) -> Option<u64>;

    /// Read the next chunk. `Ok(0)` marks end of body.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UpdateError>;
}

/// Inactive firmware slot. Dropping an unfinished writer aborts it.
pub trait ImageWriter {
    fn write(&mut self, chunk: &[u8]) -> Result<(), UpdateError>;

    /// Verify the image and make it the boot target.
    fn finalize(self) -> Result<(), UpdateError>;
}
