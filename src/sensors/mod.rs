//! Sensor subsystem.
//!
//! The node has exactly one sensor: the active-low presence input read
//! by the poll loop.

pub mod presence;

pub use presence::{PresenceSensor, SensorReading};
