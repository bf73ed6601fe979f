//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `device_id`    | (identity)         | eFuse station MAC        |
//! | `log_sink`     | EventSink          | Serial log output        |
//! | `time`         | ClockPort          | System wall clock        |
//! | `mqtt`         | TelemetryPort      | ESP-IDF MQTT client      |
//! |                | (command rx)       | CommandQueue             |
//! | `ota_platform` | UpdatePlatform     | HTTPS client + esp-ota   |
//! | `nvs`          | (bring-up)         | Default NVS partition    |
//! | `wifi`         | (bring-up)         | ESP-IDF WiFi STA         |
//!
//! The last four exist only on the device.

pub mod device_id;
pub mod log_sink;
pub mod time;

#[cfg(target_os = "espidf")]
pub mod mqtt;
#[cfg(target_os = "espidf")]
pub mod nvs;
#[cfg(target_os = "espidf")]
pub mod ota_platform;
#[cfg(target_os = "espidf")]
pub mod wifi;
