//! Wi-Fi station bring-up.
//!
//! Blocking connect with bounded retries. Failure here is fatal to the
//! boot sequence; the caller halts and the watchdog resets the chip.

use core::time::Duration;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{error, info, warn};

use crate::config::NetworkConfig;
use crate::error::Error;

/// Connect attempts before giving up.
const CONNECT_ATTEMPTS: u32 = 5;
const MAX_BACKOFF_SECS: u64 = 16;

pub type WifiLink = BlockingWifi<EspWifi<'static>>;

pub fn connect(
    modem: Modem,
    sysloop: EspSystemEventLoop,
    nvs: EspDefaultNvsPartition,
    network: &NetworkConfig,
) -> Result<WifiLink, Error> {
    let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs)).map_err(init_err("wifi driver"))?;
    let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop).map_err(init_err("wifi event loop"))?;

    let auth_method = if network.wifi_password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| Error::Init("wifi ssid too long"))?,
        password: network
            .wifi_password
            .as_str()
            .try_into()
            .map_err(|_| Error::Init("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))
    .map_err(init_err("wifi configuration"))?;

    wifi.start().map_err(init_err("wifi start"))?;
    info!("WiFi: connecting to '{}'", network.wifi_ssid);

    let mut backoff = 2;
    for attempt in 1..=CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("WiFi: connected (attempt {})", attempt);
                return Ok(wifi);
            }
            Err(e) => {
                warn!("WiFi: attempt {}/{} failed: {:?}", attempt, CONNECT_ATTEMPTS, e);
                if attempt < CONNECT_ATTEMPTS {
                    std::thread::sleep(Duration::from_secs(backoff));
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                }
            }
        }
    }
    Err(Error::Init("wifi connect"))
}

fn init_err(stage: &'static str) -> impl Fn(esp_idf_svc::sys::EspError) -> Error {
    move |e| {
        error!("WiFi: {} failed: {:?}", stage, e);
        Error::Init(stage)
    }
}
