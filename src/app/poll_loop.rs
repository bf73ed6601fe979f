//! Poll loop: the fixed-period driver.
//!
//! Each tick: sample the sensor, apply the automatic policy (skipped
//! under manual override), then publish a status record. The period is
//! measured deadline to deadline, so a slow publish shortens the next
//! sleep instead of stretching the cadence. Command traffic never
//! touches the schedule.

use core::time::Duration;
use std::time::Instant;

use embedded_hal::digital::{InputPin, OutputPin};
use log::{info, warn};

use crate::adapters::device_id::DeviceIdentity;
use crate::error::CommsError;
use crate::sensors::PresenceSensor;

use super::actuator::{self, SharedActuator};
use super::events::AppEvent;
use super::ports::{ClockPort, EventSink, TelemetryPort};
use super::telemetry::{TelemetryPublisher, TelemetryRecord, VersionString};

/// Fixed per-node parameters of the loop.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub period: Duration,
    pub identity: DeviceIdentity,
    pub firmware_version: VersionString,
}

pub struct PollLoop<S, A, T, C, E> {
    sensor: PresenceSensor<S>,
    actuator: SharedActuator<A>,
    publisher: TelemetryPublisher<T>,
    clock: C,
    sink: E,
    settings: PollSettings,
    ticks: u64,
}

impl<S, A, T, C, E> PollLoop<S, A, T, C, E>
where
    S: InputPin,
    A: OutputPin,
    T: TelemetryPort,
    C: ClockPort,
    E: EventSink,
{
    pub fn new(
        sensor: PresenceSensor<S>,
        actuator: SharedActuator<A>,
        publisher: TelemetryPublisher<T>,
        clock: C,
        sink: E,
        settings: PollSettings,
    ) -> Self {
        Self {
            sensor,
            actuator,
            publisher,
            clock,
            sink,
            settings,
            ticks: 0,
        }
    }

    /// Run one sample → policy → publish cycle.
    ///
    /// A failed publish is logged by the publisher and does not fail the
    /// tick; the record is returned either way.
    pub fn tick(&mut self) -> Result<TelemetryRecord, CommsError> {
        self.ticks = self.ticks.wrapping_add(1);
        let reading = self.sensor.read();

        let actuator_on = {
            let mut act = actuator::lock(&self.actuator);
            act.apply_automatic(&reading, &mut self.sink);
            act.state().led_on
        };

        let record = TelemetryRecord::new(
            self.clock.unix_secs(),
            reading,
            actuator_on,
            &self.settings.firmware_version,
            self.settings.identity.as_str(),
        )?;
        self.sink.emit(&AppEvent::Telemetry(record.clone()));
        self.publisher.publish(&record).ok();
        Ok(record)
    }

    /// Tick forever on the configured period.
    pub fn run(mut self) -> ! {
        let period = self.settings.period;
        info!("poll: running every {:?}", period);
        let mut deadline = Instant::now();
        loop {
            if let Err(e) = self.tick() {
                warn!("poll: tick {} produced no record: {}", self.ticks, e);
            }

            deadline += period;
            let now = Instant::now();
            match deadline.checked_duration_since(now) {
                Some(wait) => std::thread::sleep(wait),
                None => {
                    warn!("poll: tick {} overran by {:?}", self.ticks, now - deadline);
                    deadline = now;
                }
            }
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn publisher(&self) -> &TelemetryPublisher<T> {
        &self.publisher
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.settings.identity
    }
}
