//! Coop Snooper firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MqttTransport    OtaUpdater      OutputPorts     LogEventSink │
//! │  (TransportPort)  (UpdatePort)    (Indicator +    (EventSink)  │
//! │                                    AudioPort)                  │
//! │  Board: composes the above + SystemPort                        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Orchestrator (pure logic)                 │    │
//! │  │  Router · Indicator · Update guard · Connection        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  EVENTS queue ◀── mqtt-poll thread · ota_task thread · Tick    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Build-time settings: `COOP_WIFI_SSID`, `COOP_WIFI_PASS`,
//! `COOP_MQTT_URL` and, optionally, `COOP_CONFIG_JSON` (a partial
//! [`SystemConfig`] override).

use core::time::Duration;
use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use coopsnooper::adapters::board::Board;
use coopsnooper::adapters::device_id;
use coopsnooper::adapters::log_sink::LogEventSink;
use coopsnooper::adapters::mqtt::MqttTransport;
use coopsnooper::adapters::ota::OtaUpdater;
use coopsnooper::adapters::wifi::{self, WifiCredentials};
use coopsnooper::app::service::Orchestrator;
use coopsnooper::config::SystemConfig;
use coopsnooper::diagnostics::{self, BootInfo};
use coopsnooper::error::Error;
use coopsnooper::drivers::amplifier::Amplifier;
use coopsnooper::drivers::status_led::StatusLed;
use coopsnooper::drivers::watchdog::Watchdog;
use coopsnooper::events::{self, EVENTS, Event, push_event};
use coopsnooper::output::{self, OutputPorts};
use coopsnooper::pins;

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_svc::hal::ledc::config::TimerConfig;
use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;

/// Dispatch loop poll interval.
const POLL_MS: u64 = 20;

fn load_config() -> SystemConfig {
    match option_env!("COOP_CONFIG_JSON") {
        Some(json) => match SystemConfig::from_json(json.as_bytes()) {
            Ok(cfg) => {
                info!("Config: build-time override applied");
                cfg
            }
            Err(e) => {
                warn!("Config: override rejected ({}), using defaults", e);
                SystemConfig::default()
            }
        },
        None => SystemConfig::default(),
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    diagnostics::install_panic_handler();

    let boot = BootInfo::collect();
    boot.log_banner();
    diagnostics::mark_running_valid();

    let config = load_config();
    let mut app = Orchestrator::new(config.clone()).map_err(Error::from)?;

    // ── 2. Network ────────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let credentials = WifiCredentials::new(
        env!("COOP_WIFI_SSID"),
        option_env!("COOP_WIFI_PASS").unwrap_or(""),
    )?;
    info!(
        "Device: {} (hostname {})",
        boot.device_id,
        device_id::hostname(&boot.mac)
    );
    // Held for the life of the firmware; dropping it stops the station.
    let _wifi = wifi::connect_station(peripherals.modem, sys_loop, nvs, &credentials)?;

    let mqtt = MqttTransport::start(env!("COOP_MQTT_URL"), &boot.device_id)?;

    // ── 3. Output thread (LED + amplifier) ────────────────────
    let ledc = peripherals.ledc;
    output::spawn(move || -> Result<_> {
        let timer = Arc::new(LedcTimerDriver::new(
            ledc.timer0,
            &TimerConfig::default()
                .frequency(Hertz(pins::LED_PWM_FREQ_HZ))
                .resolution(Resolution::Bits8),
        )?);
        // SAFETY: the LED and amplifier GPIOs are owned by nothing else.
        let (r, g, b, amp) = unsafe {
            (
                AnyOutputPin::new(pins::LED_R_GPIO),
                AnyOutputPin::new(pins::LED_G_GPIO),
                AnyOutputPin::new(pins::LED_B_GPIO),
                AnyOutputPin::new(pins::AMP_ENABLE_GPIO),
            )
        };
        let led = StatusLed::new(
            LedcDriver::new(ledc.channel0, Arc::clone(&timer), r)?,
            LedcDriver::new(ledc.channel1, Arc::clone(&timer), g)?,
            LedcDriver::new(ledc.channel2, timer, b)?,
        );
        let amp = Amplifier::new(PinDriver::output(amp)?)?;
        Ok((led, amp))
    })?;

    // ── 4. Core ───────────────────────────────────────────────
    let mut hw = Board::new(mqtt, OtaUpdater::firmware(&EVENTS), OutputPorts::new());
    let mut sink = LogEventSink::new();
    let watchdog = Watchdog::new(Watchdog::timeout_for(&config.reconnect));

    app.boot(&mut hw, &mut sink);
    info!("System ready. Entering event loop.");

    // ── 5. Event loop ─────────────────────────────────────────
    let tick_every = Duration::from_millis(u64::from(config.tick_interval_ms));
    let mut last_tick = hw.clock().uptime_ms();

    loop {
        let now = hw.clock().uptime_ms();
        if now.saturating_sub(last_tick) >= tick_every.as_millis() as u64 {
            last_tick = now;
            push_event(
                &EVENTS,
                Event::Tick {
                    uptime_secs: hw.clock().uptime_secs(),
                },
            );
        }

        events::drain_events(&EVENTS, |event| app.handle_event(event, &mut hw, &mut sink));

        watchdog.feed();
        std::thread::sleep(Duration::from_millis(POLL_MS));
    }
}
