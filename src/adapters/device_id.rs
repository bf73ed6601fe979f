//! Device identity derived from the Wi-Fi station MAC address.
//!
//! Produces a UUID-*shaped* string (`8-4-4-4-12` lowercase hex) built by
//! cycling through the six MAC bytes: bytes 0–5, then 0–5 again, then
//! 0–3. It is deterministic, not random. The identity is generated once
//! at startup and reused by every telemetry record.

use core::fmt::Write;

/// Fixed-size device ID string (36 chars).
pub type DeviceIdString = heapless::String<40>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Immutable identity of this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    mac: MacAddress,
    id: DeviceIdString,
}

impl DeviceIdentity {
    pub fn from_mac(mac: MacAddress) -> Self {
        Self {
            mac,
            id: device_id(&mac),
        }
    }

    pub fn mac(&self) -> &MacAddress {
        &self.mac
    }

    pub fn as_str(&self) -> &str {
        self.id.as_str()
    }

    pub fn id(&self) -> &DeviceIdString {
        &self.id
    }
}

/// Read the station MAC address.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> Result<MacAddress, esp_idf_svc::sys::EspError> {
    use esp_idf_svc::sys::{esp, esp_mac_type_t_ESP_MAC_WIFI_STA, esp_read_mac};

    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: `mac` is a valid 6-byte buffer for the duration of the call.
    esp!(unsafe { esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_WIFI_STA) })?;
    Ok(mac)
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> Result<MacAddress, core::convert::Infallible> {
    Ok([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE])
}

/// Derive the display id from the MAC.
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let m = |i: usize| mac[i % mac.len()];
    let mut id = DeviceIdString::new();
    // 36 chars always fit the 40-byte buffer.
    let _ = write!(
        id,
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        m(0), m(1), m(2), m(3),
        m(4), m(5),
        m(6), m(7),
        m(8), m(9),
        m(10), m(11), m(12), m(13), m(14), m(15),
    );
    id
}
