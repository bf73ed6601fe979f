//! NVS flash bring-up.
//!
//! The Wi-Fi driver keeps calibration data in the default NVS partition,
//! so it must be initialised before the radio starts. On first boot or
//! after an IDF version change the partition is erased and retried once.

use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_sys::{
    ESP_ERR_NVS_NEW_VERSION_FOUND, ESP_ERR_NVS_NO_FREE_PAGES, EspError, esp, esp_err_t, nvs_flash_erase,
    nvs_flash_init,
};
use log::{info, warn};

pub fn init_storage() -> Result<EspDefaultNvsPartition, EspError> {
    // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
    // single main-task context before any concurrent NVS access.
    let ret = unsafe { nvs_flash_init() };
    if ret == ESP_ERR_NVS_NO_FREE_PAGES as esp_err_t || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as esp_err_t {
        warn!("NVS: erasing and re-initialising flash partition");
        esp!(unsafe { nvs_flash_erase() })?;
        esp!(unsafe { nvs_flash_init() })?;
    } else {
        esp!(ret)?;
    }
    info!("NVS: flash initialised");
    EspDefaultNvsPartition::take()
}
