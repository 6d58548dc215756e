//! Wi-Fi station adapter.
//!
//! Brings the station up once at boot and answers the one question the
//! connection monitor asks: is the link layer associated right now?
//! Re-association after a drop is left to the ESP-IDF Wi-Fi driver.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` for
//!   bring-up, `esp_wifi_sta_get_ap_info` for the link check.
//! - **all other targets**: a process-wide flag tests can flip.

use core::fmt;

use log::info;

/// Connect attempts during boot before giving up.
pub const CONNECT_ATTEMPTS: u32 = 5;
/// Pause between boot-time connect attempts.
pub const CONNECT_RETRY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "Wi-Fi connection failed"),
        }
    }
}

impl std::error::Error for WifiError {}

/// Validated station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WifiCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl WifiCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, WifiError> {
        if ssid.is_empty() || !ssid.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
            return Err(WifiError::InvalidSsid);
        }
        if !password.is_empty() && !(8..=64).contains(&password.len()) {
            return Err(WifiError::InvalidPassword);
        }

        let mut s = heapless::String::new();
        s.push_str(ssid).map_err(|()| WifiError::InvalidSsid)?;
        let mut p = heapless::String::new();
        p.push_str(password).map_err(|()| WifiError::InvalidPassword)?;
        Ok(Self { ssid: s, password: p })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

/// Bring up the station and block until the network interface is up.
#[cfg(target_os = "espidf")]
pub fn connect_station(
    modem: esp_idf_svc::hal::modem::Modem,
    sys_loop: esp_idf_svc::eventloop::EspSystemEventLoop,
    nvs: esp_idf_svc::nvs::EspDefaultNvsPartition,
    credentials: &WifiCredentials,
) -> anyhow::Result<esp_idf_svc::wifi::EspWifi<'static>> {
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if credentials.is_open() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: credentials.ssid.clone(),
        password: credentials.password.clone(),
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("WiFi: started, connecting to '{}'", credentials.ssid());

    for attempt in 1..=CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("WiFi: connected on attempt {}", attempt);
                drop(wifi);
                return Ok(esp_wifi);
            }
            Err(e) => {
                log::warn!("WiFi: attempt {}/{} failed: {}", attempt, CONNECT_ATTEMPTS, e);
                let _ = wifi.disconnect();
                std::thread::sleep(core::time::Duration::from_millis(CONNECT_RETRY_DELAY_MS));
            }
        }
    }
    Err(WifiError::ConnectionFailed.into())
}

/// Whether the station is associated with an access point.
#[cfg(target_os = "espidf")]
pub fn link_active() -> bool {
    let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
    // SAFETY: the record is a plain C struct the call fills in.
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
    rc == esp_idf_svc::sys::ESP_OK
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_LINK: core::sync::atomic::AtomicBool = core::sync::atomic::AtomicBool::new(true);

#[cfg(not(target_os = "espidf"))]
pub fn link_active() -> bool {
    SIM_LINK.load(core::sync::atomic::Ordering::Acquire)
}

/// Simulation: mark the link up or down.
#[cfg(not(target_os = "espidf"))]
pub fn set_sim_link(active: bool) {
    info!("WiFi(sim): link {}", if active { "up" } else { "down" });
    SIM_LINK.store(active, core::sync::atomic::Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_ssid() {
        assert_eq!(
            WifiCredentials::new("", "password123"),
            Err(WifiError::InvalidSsid)
        );
    }

    #[test]
    fn rejects_short_password() {
        assert_eq!(
            WifiCredentials::new("Coop", "short"),
            Err(WifiError::InvalidPassword)
        );
    }

    #[test]
    fn rejects_long_ssid() {
        let ssid = "s".repeat(33);
        assert_eq!(
            WifiCredentials::new(&ssid, ""),
            Err(WifiError::InvalidSsid)
        );
    }

    #[test]
    fn open_and_wpa2_networks() {
        assert!(WifiCredentials::new("FarmGuest", "").unwrap().is_open());
        let wpa = WifiCredentials::new("FarmHouse", "henhouse42").unwrap();
        assert!(!wpa.is_open());
        assert_eq!(wpa.ssid(), "FarmHouse");
    }
}
