//! Actuator controller: owns the LED and the manual-override flag.
//!
//! Two writers reach it, always through [`SharedActuator`]:
//! - the poll loop, via [`apply_automatic`](ActuatorController::apply_automatic),
//!   which is a no-op while manual override is set;
//! - the command interpreter, via [`set_manual`](ActuatorController::set_manual)
//!   and [`clear_manual`](ActuatorController::clear_manual).
//!
//! Every transition writes the pin before returning.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::drivers::status_led::IndicatorLed;
use crate::error::ActuatorError;
use crate::sensors::SensorReading;

use super::events::{AppEvent, ControlMode};
use super::ports::EventSink;

/// LED level and control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuatorState {
    pub led_on: bool,
    pub manual_override: bool,
}

impl ActuatorState {
    pub fn mode(&self) -> ControlMode {
        if self.manual_override {
            ControlMode::Manual
        } else {
            ControlMode::Automatic
        }
    }
}

/// Actuator shared between the poll loop and the command interpreter.
pub type SharedActuator<P> = Arc<Mutex<ActuatorController<P>>>;

/// Wrap a controller for sharing across tasks.
pub fn shared<P>(controller: ActuatorController<P>) -> SharedActuator<P> {
    Arc::new(Mutex::new(controller))
}

/// Lock the shared actuator. A panic in another holder does not leave the
/// state inconsistent (every method writes pin then flag), so a poisoned
/// lock is taken over rather than propagated.
pub fn lock<P>(actuator: &SharedActuator<P>) -> MutexGuard<'_, ActuatorController<P>> {
    actuator.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ActuatorController<P> {
    led: IndicatorLed<P>,
    state: ActuatorState,
}

impl<P: OutputPin> ActuatorController<P> {
    /// Start in automatic mode with the LED off.
    pub fn new(led: IndicatorLed<P>) -> Self {
        let led_on = led.is_lit();
        Self {
            led,
            state: ActuatorState {
                led_on,
                manual_override: false,
            },
        }
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    /// Apply the sensor-driven policy. Returns `true` if the LED changed.
    ///
    /// Does nothing under manual override. Only writes the pin when the
    /// level actually needs to change.
    pub fn apply_automatic(&mut self, reading: &SensorReading, sink: &mut impl EventSink) -> bool {
        if self.state.manual_override {
            return false;
        }

        let target = reading.object_detected;
        if target == self.state.led_on {
            return false;
        }

        match self.drive(target) {
            Ok(()) => {
                if target {
                    warn!("auto: object detected, LED ON");
                } else {
                    info!("auto: clear, LED OFF");
                }
                sink.emit(&AppEvent::ActuatorChanged {
                    on: target,
                    mode: ControlMode::Automatic,
                });
                true
            }
            Err(e) => {
                warn!("auto: LED write failed ({}), retrying next tick", e);
                false
            }
        }
    }

    /// Force the LED and enter manual override.
    pub fn set_manual(&mut self, on: bool, sink: &mut impl EventSink) -> Result<(), ActuatorError> {
        self.enter_mode(true, sink);
        self.drive(on)?;
        info!("manual: LED {}", if on { "ON" } else { "OFF" });
        sink.emit(&AppEvent::ActuatorChanged {
            on,
            mode: ControlMode::Manual,
        });
        Ok(())
    }

    /// Leave manual override and reset the LED to off.
    ///
    /// The sensor takes over from a known-off state on the next poll
    /// rather than inheriting a manual "on" with no detection behind it.
    pub fn clear_manual(&mut self, sink: &mut impl EventSink) -> Result<(), ActuatorError> {
        self.enter_mode(false, sink);
        self.drive(false)?;
        info!("auto: mode restored, LED reset");
        sink.emit(&AppEvent::ActuatorChanged {
            on: false,
            mode: ControlMode::Automatic,
        });
        Ok(())
    }

    /// Borrow the LED driver (test inspection).
    pub fn led(&self) -> &IndicatorLed<P> {
        &self.led
    }

    fn enter_mode(&mut self, manual: bool, sink: &mut impl EventSink) {
        if self.state.manual_override != manual {
            self.state.manual_override = manual;
            sink.emit(&AppEvent::ModeChanged(self.state.mode()));
        }
    }

    fn drive(&mut self, on: bool) -> Result<(), ActuatorError> {
        self.led.set(on)?;
        self.state.led_on = on;
        Ok(())
    }
}
