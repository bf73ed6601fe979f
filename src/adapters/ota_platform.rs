//! ESP-IDF firmware transport: HTTPS download into the inactive slot.
//!
//! - [`HttpImageStream`]: `EspHttpConnection` GET, server verified against
//!   the IDF certificate bundle, every socket operation bounded by the
//!   job timeout.
//! - [`SlotWriter`]: `esp-ota` session on the next OTA partition. Dropping
//!   it before `finalize` aborts the session and leaves the boot partition
//!   untouched.

use core::time::Duration;

use embedded_svc::http::Method;
use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};
use esp_idf_svc::sys::{ESP_ERR_HTTP_EAGAIN, ESP_ERR_TIMEOUT, EspError, esp_err_t};
use log::{info, warn};

use crate::app::ports::{ImageStream, ImageWriter, UpdatePlatform};
use crate::ota::UpdateError;

#[derive(Debug, Default, Clone, Copy)]
pub struct EspUpdatePlatform;

impl UpdatePlatform for EspUpdatePlatform {
    type Stream = HttpImageStream;
    type Writer = SlotWriter;

    fn open_image(&self, url: &str, timeout: Duration) -> Result<HttpImageStream, UpdateError> {
        let conf = HttpConfiguration {
            timeout: Some(timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = EspHttpConnection::new(&conf).map_err(transport_err)?;
        conn.initiate_request(Method::Get, url, &[]).map_err(transport_err)?;
        conn.initiate_response().map_err(transport_err)?;

        let status = conn.status();
        if !(200..300).contains(&status) {
            return Err(UpdateError::HttpStatus(status));
        }
        let content_length = conn
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok());
        info!("OTA: HTTP {} ({:?} bytes)", status, content_length);

        Ok(HttpImageStream { conn, content_length })
    }

    fn begin_write(&self) -> Result<SlotWriter, UpdateError> {
        let update = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("esp-ota begin failed: {:?}", e);
            UpdateError::NoPartition
        })?;
        Ok(SlotWriter { update })
    }

    fn restart(&self) {
        info!("OTA: rebooting into new firmware");
        esp_ota::restart();
    }
}

fn transport_err(e: EspError) -> UpdateError {
    warn!("OTA: HTTP transport error {:?}", e);
    if is_timeout(&e) {
        UpdateError::Timeout
    } else {
        UpdateError::ConnectFailed
    }
}

fn is_timeout(e: &EspError) -> bool {
    let code = e.code();
    code == ESP_ERR_TIMEOUT as esp_err_t || code == ESP_ERR_HTTP_EAGAIN as esp_err_t
}

pub struct HttpImageStream {
    conn: EspHttpConnection,
    content_length: Option<u64>,
}

impl ImageStream for HttpImageStream {
    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, UpdateError> {
        self.conn.read(buf).map_err(|e| {
            warn!("OTA: body read failed: {:?}", e);
            if is_timeout(&e) { UpdateError::Timeout } else { UpdateError::ReadFailed }
        })
    }
}

pub struct SlotWriter {
    update: esp_ota::OtaUpdate,
}

impl ImageWriter for SlotWriter {
    fn write(&mut self, chunk: &[u8]) -> Result<(), UpdateError> {
        self.update.write(chunk).map_err(|e| {
            warn!("esp-ota write failed: {:?}", e);
            UpdateError::WriteFailed
        })
    }

    fn finalize(self) -> Result<(), UpdateError> {
        let mut completed = self.update.finalize().map_err(|e| {
            warn!("esp-ota finalize failed: {:?}", e);
            UpdateError::VerifyFailed
        })?;
        completed.set_as_boot_partition().map_err(|e| {
            warn!("esp-ota set_as_boot_partition failed: {:?}", e);
            UpdateError::BootSetFailed
        })
    }
}
