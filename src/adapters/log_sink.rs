//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (UART / USB-CDC in production, stderr on the host).

use log::{debug, info, warn};

use crate::app::events::{AppEvent, ControlMode};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                debug!(
                    "TELEM | t={} | detected={} count={} | led={}",
                    t.timestamp,
                    u8::from(t.detected),
                    t.detection_count,
                    if t.actuator_on { "ON" } else { "OFF" },
                );
            }
            AppEvent::ActuatorChanged { on, mode } => {
                info!("ACT   | led={} ({:?})", if *on { "ON" } else { "OFF" }, mode);
            }
            AppEvent::ModeChanged(ControlMode::Manual) => {
                info!("MODE  | manual override");
            }
            AppEvent::ModeChanged(ControlMode::Automatic) => {
                info!("MODE  | automatic");
            }
            AppEvent::UpdateRequested { accepted: true } => {
                info!("OTA   | job started");
            }
            AppEvent::UpdateRequested { accepted: false } => {
                warn!("OTA   | request refused");
            }
            AppEvent::Started { device_id, version } => {
                info!("START | id={} version={}", device_id, version);
            }
        }
    }
}
