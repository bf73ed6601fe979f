//! Infrared / photoelectric presence sensor.
//!
//! The module drives its output LOW while an object interrupts the beam
//! (active-low). Every sample is independent: no debouncing, no
//! hysteresis, no edge detection.
//!
//! The detection counter increments on *every* sample that reads
//! "present", so a stationary object is counted once per poll. This is
//! the reference behaviour and is kept on purpose.

use embedded_hal::digital::InputPin;
use log::{debug, info, warn};

use crate::error::SensorError;

/// One poll's worth of sensor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorReading {
    pub object_detected: bool,
    /// Running total of "present" samples since boot.
    pub detection_count: u32,
}

/// Active-low presence sensor with a monotonic detection counter.
pub struct PresenceSensor<P> {
    pin: P,
    detections: u32,
}

impl<P: InputPin> PresenceSensor<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, detections: 0 }
    }

    /// Sample the pin once.
    ///
    /// A failed GPIO read is logged and reported as "absent"; the sensor
    /// has no fault state of its own.
    pub fn read(&mut self) -> SensorReading {
        let object_detected = match self.sample() {
            Ok(present) => present,
            Err(e) => {
                warn!("presence: {}, treating sample as absent", e);
                false
            }
        };

        if object_detected {
            self.detections = self.detections.saturating_add(1);
            info!("presence: object detected (detection #{})", self.detections);
        } else {
            debug!("presence: clear");
        }

        SensorReading {
            object_detected,
            detection_count: self.detections,
        }
    }

    /// Total detections so far.
    pub fn detection_count(&self) -> u32 {
        self.detections
    }

    fn sample(&mut self) -> Result<bool, SensorError> {
        self.pin.is_low().map_err(|_| SensorError::GpioReadFailed)
    }
}
