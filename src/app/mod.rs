//! Application core: pure domain logic, zero I/O.
//!
//! Actuator policy, command interpretation, telemetry encoding and the
//! poll loop. All interaction with the broker, clock and firmware slot
//! goes through the **port traits** in [`ports`]; GPIO goes through
//! `embedded-hal`. Everything here runs on the host in tests.

pub mod actuator;
pub mod commands;
pub mod events;
pub mod interpreter;
pub mod poll_loop;
pub mod ports;
pub mod telemetry;
