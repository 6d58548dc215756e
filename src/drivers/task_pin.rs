//! Thread creation with core affinity.
//!
//! The update task (download + flash), the MQTT poll loop and the output
//! thread (LED and audio tasks) each get their own FreeRTOS task with a
//! chosen core, priority and stack.  On ESP-IDF the pthread config is
//! set right before `std::thread` spawns; elsewhere a plain named thread
//! is used.
//!
//! `esp_pthread_set_cfg()` is thread-local and only affects the *next*
//! `pthread_create()` from the calling thread, so nothing may spawn
//! between the two calls.

use std::io;
use std::thread::JoinHandle;

/// ESP32-S3 cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU): protocol stacks (WiFi, lwIP, MQTT).
    Pro = 0,
    /// Core 1 (APP_CPU): application tasks.
    App = 1,
}

/// Spawn `f` on `core`.  `name` must be NUL-terminated (`"ota_task\0"`).
#[cfg(target_os = "espidf")]
pub fn spawn_on_core<F>(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    // SAFETY: the config struct is fully initialised by the default
    // constructor and `name` is a 'static null-terminated string.
    let ret = unsafe {
        let mut cfg = esp_idf_svc::sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = i32::from(priority);
        cfg.stack_size = (stack_kb * 1024) as _;
        cfg.thread_name = name.as_ptr().cast();
        esp_idf_svc::sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_svc::sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Task: {} on {:?} core (prio {}, {} KB stack)",
        display_name,
        core,
        priority,
        stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .spawn(f)
}

/// Simulation fallback: ignores core affinity and priority.
#[cfg(not(target_os = "espidf"))]
pub fn spawn_on_core<F>(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: F,
) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Task(sim): {} ({} KB stack)",
        display_name,
        stack_kb
    );

    std::thread::Builder::new()
        .name(display_name.into())
        .stack_size(stack_kb.max(64) * 1024)
        .spawn(f)
}
