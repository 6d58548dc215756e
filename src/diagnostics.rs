//! Boot diagnostics.
//!
//! Prints the boot banner (firmware version, running partition, device
//! identity), confirms the running image to the OTA rollback logic, and
//! installs a panic hook that logs the reason before the reset.

use core::fmt;

use log::{error, info, warn};

use crate::adapters::device_id::{self, MacAddress};

pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the banner reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootInfo {
    pub firmware_version: &'static str,
    pub partition: heapless::String<16>,
    pub device_id: device_id::DeviceIdString,
    pub mac: MacAddress,
}

impl BootInfo {
    pub fn collect() -> Self {
        Self::from_parts(&running_partition_label(), device_id::read_mac())
    }

    pub fn from_parts(partition: &str, mac: MacAddress) -> Self {
        let mut p = heapless::String::new();
        // Partition labels are at most 16 bytes.
        let end = partition
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
            .take_while(|&end| end <= 16)
            .last()
            .unwrap_or(0);
        let _ = p.push_str(&partition[..end]);
        Self {
            firmware_version: FIRMWARE_VERSION,
            partition: p,
            device_id: device_id::device_id(&mac),
            mac,
        }
    }

    pub fn log_banner(&self) {
        info!("╔══════════════════════════════════════╗");
        info!("║  Coop Snooper v{:<22}║", self.firmware_version);
        info!("╚══════════════════════════════════════╝");
        info!("Boot: {}", self);
    }
}

impl fmt::Display for BootInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "firmware={} partition={} device={} mac={}",
            self.firmware_version,
            self.partition,
            self.device_id,
            device_id::format_mac(&self.mac)
        )
    }
}

#[cfg(target_os = "espidf")]
fn running_partition_label() -> String {
    // SAFETY: the running partition descriptor is static for the life of
    // the image and its label is NUL-terminated.
    unsafe {
        let part = esp_idf_svc::sys::esp_ota_get_running_partition();
        if part.is_null() {
            return "unknown".into();
        }
        core::ffi::CStr::from_ptr((*part).label.as_ptr())
            .to_string_lossy()
            .into_owned()
    }
}

#[cfg(not(target_os = "espidf"))]
fn running_partition_label() -> String {
    "sim".into()
}

// ───────────────────────────────────────────────────────────────
// OTA rollback
// ───────────────────────────────────────────────────────────────

/// Confirm the running image so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn mark_running_valid() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: running image marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn mark_running_valid() {
    warn!("OTA(sim): rollback check skipped");
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Log the panic reason and location before the default handler runs.
pub fn install_panic_handler() {
    let default = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => error!("PANIC: {}", reason),
        }
        default(info);
    }));
}
