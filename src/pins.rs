//! GPIO pin assignments for the presence node.
//!
//! Single source of truth for the board wiring. `main` takes the matching
//! `Peripherals` pins; these constants document them and feed the logs.

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

/// On-board LED, active HIGH.
pub const LED_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Infrared / photoelectric obstacle sensor output.
/// LOW = object present, HIGH = clear. No internal pull resistors.
pub const PRESENCE_SENSOR_GPIO: i32 = 21;
