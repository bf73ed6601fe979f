//! System clock adapter.
//!
//! Reads the newlib / std wall clock. Nothing sets it on the device (no
//! SNTP), so timestamps there count seconds since boot.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::app::ports::ClockPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockPort for SystemClock {
    fn unix_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
