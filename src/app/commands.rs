//! Inbound commands and the queue that carries them.
//!
//! The MQTT adapter copies each received payload into an
//! [`InboundMessage`] and pushes it onto a [`CommandQueue`]. The
//! [`CommandInterpreter`](super::interpreter::CommandInterpreter) drains
//! the queue on its own task, so the transport's callback thread never
//! runs application logic.
//!
//! ```text
//! ┌──────────────┐ InboundMessage ┌──────────────────────┐
//! │  MQTT rx     │───────────────▶│  CommandInterpreter   │
//! │  (transport) │  CommandQueue  │  (own task)           │
//! └──────────────┘                └──────────────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;

/// Longest payload carried on the queue. Every recognised token is far
/// shorter; anything longer cannot be a command.
pub const MAX_COMMAND_LEN: usize = 64;

/// Queue depth for inbound messages.
pub const COMMAND_QUEUE_DEPTH: usize = 8;

/// Control tokens accepted on the command topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Force the LED on and enter manual override.
    On,
    /// Force the LED off and enter manual override.
    Off,
    /// Leave manual override; LED reset to off.
    Auto,
    /// Start a firmware update job.
    Ota,
}

impl Command {
    /// Match a raw payload against the vocabulary.
    ///
    /// Comparison is byte-exact: case-sensitive, no trimming. Anything
    /// else (including our own telemetry echoed back on a shared topic)
    /// yields `None`.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            b"ON" => Some(Self::On),
            b"OFF" => Some(Self::Off),
            b"AUTO" => Some(Self::Auto),
            b"OTA" => Some(Self::Ota),
            _ => None,
        }
    }
}

/// Raw payload received on the command topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub payload: Vec<u8, MAX_COMMAND_LEN>,
}

impl InboundMessage {
    /// Copy `data` into a message. `None` if it exceeds [`MAX_COMMAND_LEN`].
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        Vec::from_slice(data).ok().map(|payload| Self { payload })
    }

    /// Copy `data` unless it is longer than `limit` (itself capped at
    /// [`MAX_COMMAND_LEN`]).
    pub fn with_limit(data: &[u8], limit: usize) -> Option<Self> {
        if data.len() > limit {
            return None;
        }
        Self::from_slice(data)
    }
}

/// Transport → interpreter channel.
pub type CommandQueue = Channel<CriticalSectionRawMutex, InboundMessage, COMMAND_QUEUE_DEPTH>;
