//! Command interpreter: drains the [`CommandQueue`] and applies each
//! recognised token.
//!
//! | Token  | Effect                                              |
//! |--------|-----------------------------------------------------|
//! | `ON`   | LED on, manual override                             |
//! | `OFF`  | LED off, manual override                            |
//! | `AUTO` | clear override, LED off                             |
//! | `OTA`  | start an update job unless one is already running   |
//!
//! Anything else is dropped with a debug log. The interpreter never
//! blocks on an update: the job runs on its own thread.

use embedded_hal::digital::OutputPin;
use log::{debug, error, info, warn};

use crate::ota::UpdateError;

use super::actuator::{self, SharedActuator};
use super::commands::{Command, CommandQueue};
use super::events::AppEvent;
use super::ports::{EventSink, UpdateTrigger};

pub struct CommandInterpreter<P, T, E> {
    actuator: SharedActuator<P>,
    updates: T,
    sink: E,
    handled: u32,
    ignored: u32,
}

impl<P, T, E> CommandInterpreter<P, T, E>
where
    P: OutputPin,
    T: UpdateTrigger,
    E: EventSink,
{
    pub fn new(actuator: SharedActuator<P>, updates: T, sink: E) -> Self {
        Self {
            actuator,
            updates,
            sink,
            handled: 0,
            ignored: 0,
        }
    }

    /// Interpret one raw payload. Returns the command it matched, if any.
    pub fn handle(&mut self, payload: &[u8]) -> Option<Command> {
        let Some(cmd) = Command::parse(payload) else {
            self.ignored = self.ignored.wrapping_add(1);
            debug!("cmd: ignoring {}-byte payload", payload.len());
            return None;
        };
        self.handled = self.handled.wrapping_add(1);
        info!("cmd: {:?}", cmd);

        match cmd {
            Command::On | Command::Off => {
                let on = cmd == Command::On;
                if let Err(e) = actuator::lock(&self.actuator).set_manual(on, &mut self.sink) {
                    warn!("cmd: {:?} failed: {}", cmd, e);
                }
            }
            Command::Auto => {
                if let Err(e) = actuator::lock(&self.actuator).clear_manual(&mut self.sink) {
                    warn!("cmd: AUTO failed: {}", e);
                }
            }
            Command::Ota => {
                let accepted = match self.updates.request_update() {
                    Ok(()) => true,
                    Err(UpdateError::AlreadyInProgress) => {
                        warn!("cmd: OTA already in progress, request dropped");
                        false
                    }
                    Err(e) => {
                        error!("cmd: OTA could not start: {}", e);
                        false
                    }
                };
                self.sink.emit(&AppEvent::UpdateRequested { accepted });
            }
        }
        Some(cmd)
    }

    /// Wait for the next queued message and interpret it.
    pub async fn next(&mut self, queue: &CommandQueue) -> Option<Command> {
        let msg = queue.receive().await;
        self.handle(&msg.payload)
    }

    /// Serve the queue forever.
    pub async fn run(mut self, queue: &CommandQueue) {
        info!("cmd: interpreter running");
        loop {
            self.next(queue).await;
        }
    }

    /// Recognised commands processed so far.
    pub fn handled(&self) -> u32 {
        self.handled
    }

    /// Payloads dropped as unrecognised.
    pub fn ignored(&self) -> u32 {
        self.ignored
    }

    pub fn sink(&self) -> &E {
        &self.sink
    }

    pub fn actuator(&self) -> &SharedActuator<P> {
        &self.actuator
    }
}
