//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the device if the dispatch loop stalls for longer than the
//! configured timeout.  The timeout must exceed the worst-case blocking
//! inside the loop: a full reconnect sequence sleeps
//! `max_attempts × delay_ms` (25 s with the defaults), so the loop
//! feeds the watchdog between attempts via [`Watchdog::timeout_for`].
//!
//! The dispatch loop must call `feed()` on every iteration.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

use crate::config::ReconnectPolicy;

/// Margin added on top of the longest blocking section.
const MARGIN_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    timeout_ms: u32,
}

impl Watchdog {
    /// Timeout that survives a complete reconnect sequence.
    pub fn timeout_for(policy: &ReconnectPolicy) -> u32 {
        policy
            .max_attempts
            .saturating_mul(policy.delay_ms)
            .saturating_add(MARGIN_MS)
    }

    /// Initialise and subscribe the current task to the TWDT.
    pub fn new(timeout_ms: u32) -> Self {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls on the current task; the config
            // struct outlives the reconfigure call.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!(
                        "Watchdog: reconfigure returned {} (may already be configured)",
                        ret
                    );
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    info!("Watchdog: subscribed ({}ms timeout, panic on trigger)", timeout_ms);
                } else {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                }

                Self {
                    subscribed,
                    timeout_ms,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("Watchdog(sim): no-op ({}ms)", timeout_ms);
            Self { timeout_ms }
        }
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    /// Feed the watchdog. Must be called at least once per timeout.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: only called from the subscribed task.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}
