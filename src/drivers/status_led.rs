//! Single-colour indicator LED driver.
//!
//! Wraps any `embedded-hal` output pin (an `esp-idf-hal` `PinDriver` on
//! the device, a recording mock in tests) and remembers the last level
//! that was successfully written.

use embedded_hal::digital::OutputPin;

use crate::error::ActuatorError;

pub struct IndicatorLed<P> {
    pin: P,
    lit: bool,
}

impl<P: OutputPin> IndicatorLed<P> {
    /// Take ownership of the pin and drive it low.
    pub fn new(mut pin: P) -> Result<Self, ActuatorError> {
        pin.set_low().map_err(|_| ActuatorError::GpioWriteFailed)?;
        Ok(Self { pin, lit: false })
    }

    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        let res = if on { self.pin.set_high() } else { self.pin.set_low() };
        res.map_err(|_| ActuatorError::GpioWriteFailed)?;
        self.lit = on;
        Ok(())
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Borrow the underlying pin (test inspection).
    pub fn pin(&self) -> &P {
        &self.pin
    }
}
