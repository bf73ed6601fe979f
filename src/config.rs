//! Node configuration.
//!
//! Two layers:
//! - [`NodeConfig`]: fixed operating parameters (poll period, topics, OTA
//!   endpoint and limits). Compiled-in defaults.
//! - [`Secrets`]: broker and Wi-Fi credentials, supplied as a build-time
//!   secret set. `build.rs` embeds `secrets.json` into the image and
//!   [`Secrets::embedded`] parses it at boot. There is no runtime override.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Topic used for both telemetry and commands.
pub const DEFAULT_TOPIC: &str = "irnode/presence";

/// Latest-firmware endpoint.
pub const DEFAULT_FIRMWARE_URL: &str = "https://firmware.irnode.dev/firmware/latest";

/// Version string reported in every telemetry record (`v4.0.0`).
pub const FIRMWARE_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

const EMBEDDED_SECRETS: &str = include_str!(concat!(env!("OUT_DIR"), "/secrets.json"));

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Timing ---
    /// Poll loop period (milliseconds)
    pub poll_interval_ms: u32,

    // --- Messaging ---
    /// Topic subscribed for inbound commands
    pub command_topic: String,
    /// Topic receiving the retained status line
    pub telemetry_topic: String,
    /// Longest inbound payload accepted onto the command queue (bytes)
    pub max_command_len: usize,

    // --- Firmware update ---
    /// HTTPS endpoint serving the latest image
    pub firmware_url: String,
    /// Version string published in telemetry
    pub firmware_version: String,
    /// Network I/O timeout for the image download (milliseconds)
    pub ota_timeout_ms: u32,
    /// Delay between a successful install and the restart (milliseconds)
    pub reboot_delay_ms: u32,
    /// Largest image accepted (bytes)
    pub max_image_size: u32,
    /// Download buffer size (bytes)
    pub ota_chunk_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,

            command_topic: DEFAULT_TOPIC.into(),
            telemetry_topic: DEFAULT_TOPIC.into(),
            max_command_len: crate::app::commands::MAX_COMMAND_LEN,

            firmware_url: DEFAULT_FIRMWARE_URL.into(),
            firmware_version: FIRMWARE_VERSION.into(),
            ota_timeout_ms: 30_000,
            reboot_delay_ms: 2000,
            max_image_size: 4 * 1024 * 1024, // 4 MB
            ota_chunk_size: 4096,
        }
    }
}

impl NodeConfig {
    /// Range-check every field. Rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms must be > 0"));
        }
        if self.command_topic.is_empty() || self.telemetry_topic.is_empty() {
            return Err(ConfigError::ValidationFailed("topics must not be empty"));
        }
        if self.max_command_len == 0 || self.max_command_len > crate::app::commands::MAX_COMMAND_LEN {
            return Err(ConfigError::ValidationFailed("max_command_len out of range"));
        }
        if !self.firmware_url.starts_with("https://") {
            return Err(ConfigError::ValidationFailed("firmware_url must be https"));
        }
        if self.firmware_version.is_empty()
            || self.firmware_version.len() > crate::app::telemetry::MAX_VERSION_LEN
        {
            return Err(ConfigError::ValidationFailed("firmware_version must be 1-32 bytes"));
        }
        if self.ota_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("ota_timeout_ms must be > 0"));
        }
        if self.max_image_size == 0 {
            return Err(ConfigError::ValidationFailed("max_image_size must be > 0"));
        }
        if self.ota_chunk_size == 0 {
            return Err(ConfigError::ValidationFailed("ota_chunk_size must be > 0"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Build-time secrets
// ---------------------------------------------------------------------------

/// Broker connection settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub broker_uri: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("broker_uri", &self.broker_uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Station credentials for network bring-up.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    #[serde(default)]
    pub wifi_password: String,
}

impl fmt::Debug for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkConfig")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_password", &"<redacted>")
            .finish()
    }
}

/// The build-time secret set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secrets {
    pub broker: BrokerConfig,
    pub network: NetworkConfig,
}

impl Secrets {
    /// Parse and validate the secret set compiled into this image.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json(EMBEDDED_SECRETS)
    }

    /// Parse and validate a secret set from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let secrets: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        secrets.validate()?;
        Ok(secrets)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        const SCHEMES: [&str; 4] = ["mqtt://", "mqtts://", "ws://", "wss://"];
        let uri = self.broker.broker_uri.as_str();
        if !SCHEMES.iter().any(|s| uri.starts_with(s)) || SCHEMES.contains(&uri) {
            return Err(ConfigError::ValidationFailed("broker_uri needs mqtt(s):// or ws(s):// and a host"));
        }
        if self.broker.client_id.is_empty() || self.broker.client_id.len() > 64 {
            return Err(ConfigError::ValidationFailed("client_id must be 1-64 bytes"));
        }
        if self.network.wifi_ssid.is_empty() || self.network.wifi_ssid.len() > 32 {
            return Err(ConfigError::ValidationFailed("wifi_ssid must be 1-32 bytes"));
        }
        if self.network.wifi_password.len() > 64 {
            return Err(ConfigError::ValidationFailed("wifi_password must be at most 64 bytes"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from configuration parsing and validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The embedded secret set is not valid JSON for [`Secrets`].
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "secret set corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
