//! Streaming checks applied to a downloaded firmware image.
//!
//! The slot itself (`esp-ota`) verifies the full image on finalize; these
//! checks reject obviously wrong downloads early, before they are
//! written to flash.

use super::UpdateError;

/// First byte of every ESP application image.
pub const ESP_IMAGE_MAGIC: u8 = 0xE9;

/// Tracks a download as it streams in.
#[derive(Debug)]
pub struct ImageCheck {
    max_size: u32,
    expected: Option<u64>,
    received: u64,
}

impl ImageCheck {
    /// `expected` is the server's `Content-Length`, if any.
    pub fn new(max_size: u32, expected: Option<u64>) -> Result<Self, UpdateError> {
        match expected {
            Some(0) => return Err(UpdateError::EmptyImage),
            Some(len) if len > u64::from(max_size) => return Err(UpdateError::ImageTooLarge),
            _ => {}
        }
        Ok(Self {
            max_size,
            expected,
            received: 0,
        })
    }

    /// Validate the next chunk before it is written.
    pub fn accept(&mut self, chunk: &[u8]) -> Result<(), UpdateError> {
        let Some(&first) = chunk.first() else {
            return Ok(());
        };
        if self.received == 0 && first != ESP_IMAGE_MAGIC {
            return Err(UpdateError::BadMagic(first));
        }

        let received = self.received + chunk.len() as u64;
        if received > u64::from(self.max_size) {
            return Err(UpdateError::ImageTooLarge);
        }
        if let Some(expected) = self.expected {
            if received > expected {
                return Err(UpdateError::LengthMismatch { expected, received });
            }
        }
        self.received = received;
        Ok(())
    }

    /// Close the download. Returns the total byte count.
    pub fn finish(&self) -> Result<u64, UpdateError> {
        if self.received == 0 {
            return Err(UpdateError::EmptyImage);
        }
        match self.expected {
            Some(expected) if expected != self.received => Err(UpdateError::LengthMismatch {
                expected,
                received: self.received,
            }),
            _ => Ok(self.received),
        }
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}
