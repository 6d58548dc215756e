//! Device identity derived from the ESP32 factory MAC address.
//!
//! The short id `CS-XXYYZZ` (last 3 MAC bytes, uppercase hex) is printed
//! in the boot banner and used as the MQTT client id; the hostname
//! `coop-snooper-xxyyzz` is handed to the Wi-Fi station.

use core::fmt::Write;

/// "CS-XXYYZZ".
pub type DeviceIdString = heapless::String<16>;

pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    let ret = unsafe { esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr()) };
    if ret != esp_idf_svc::sys::ESP_OK {
        log::warn!("DeviceId: eFuse MAC read failed ({})", ret);
    }
    mac
}

/// Simulation: a fixed MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0x24, 0x6F, 0x28, 0xC0, 0x0B, 0x5E]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "CS-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

pub fn hostname(mac: &MacAddress) -> heapless::String<32> {
    let mut name = heapless::String::<32>::new();
    let _ = write!(name, "coop-snooper-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}

/// Colon-separated MAC, as shown in the boot banner.
pub fn format_mac(mac: &MacAddress) -> heapless::String<17> {
    let mut s = heapless::String::<17>::new();
    let _ = write!(
        s,
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    s
}
