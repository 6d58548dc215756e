//! Indicator and audio output tasks.
//!
//! The dispatch loop never touches the LED or the amplifier directly.
//! [`OutputPorts`] implements the indicator and audio ports by handing
//! work to two async tasks that share one dedicated thread:
//!
//! ```text
//!  ┌────────────────┐  IndicatorState  ┌─────────────────────────────────┐
//!  │ Dispatch loop  │────(10 deep)────▶│  Output thread                  │
//!  │ (OutputPorts)  │                  │  edge_executor::LocalExecutor   │
//!  │                │──AudioSettings──▶│   ┌───────────┐ ┌────────────┐  │
//!  └────────────────┘     (signal)     │   │ indicator │ │   audio    │  │
//!                                      │   │ 20ms ⏱    │ │ wake-on-sig│  │
//!                                      │   └───────────┘ └────────────┘  │
//!                                      └─────────────────────────────────┘
//! ```
//!
//! Indicator states are consumed in FIFO order; the pattern renderer
//! runs between them on a reactor timer.  When the queue is full the
//! oldest pending state is skipped, never the newest.  Audio settings only keep the
//! latest value, so a burst of setter calls wakes the audio task once.

use core::time::Duration;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::signal::Signal;
use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::{error, info, warn};

use crate::app::ports::{AudioPort, IndicatorPort};
use crate::drivers::amplifier::{Amplifier, AudioSettings};
use crate::drivers::led_patterns::LedPatternEngine;
use crate::drivers::status_led::StatusLed;
use crate::drivers::task_pin::{self, Core};
use crate::indicator::IndicatorState;

/// Depth of the indicator state queue.
pub const INDICATOR_QUEUE_CAP: usize = 10;

/// Pattern render interval.
const FRAME_MS: u64 = 20;

/// How long the amplifier stays powered for one squawk clip.
pub const SQUAWK_HOLD_MS: u64 = 3_000;

pub type IndicatorQueue = Channel<CriticalSectionRawMutex, IndicatorState, INDICATOR_QUEUE_CAP>;
pub type AudioSignal = Signal<CriticalSectionRawMutex, AudioSettings>;

/// Dispatch loop → indicator task.
pub static INDICATOR: IndicatorQueue = Channel::new();

/// Dispatch loop → audio task.
pub static AUDIO: AudioSignal = Signal::new();

// ───────────────────────────────────────────────────────────────
// Port side
// ───────────────────────────────────────────────────────────────

/// Producer half used by the dispatch loop.
pub struct OutputPorts<'q> {
    indicator: &'q IndicatorQueue,
    audio: &'q AudioSignal,
    settings: AudioSettings,
}

impl OutputPorts<'static> {
    /// Ports wired to the firmware's static queues.
    pub fn new() -> Self {
        Self::with_queues(&INDICATOR, &AUDIO)
    }
}

impl Default for OutputPorts<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'q> OutputPorts<'q> {
    pub fn with_queues(indicator: &'q IndicatorQueue, audio: &'q AudioSignal) -> Self {
        Self {
            indicator,
            audio,
            settings: AudioSettings::default(),
        }
    }

    /// Settings most recently pushed to the audio task.
    pub fn audio_settings(&self) -> AudioSettings {
        self.settings
    }

    fn push_audio(&mut self) {
        self.audio.signal(self.settings);
    }
}

impl IndicatorPort for OutputPorts<'_> {
    /// Queue `state` for the renderer.  A full queue sheds its oldest
    /// entry so the state the arbiter committed is always the last one
    /// rendered.
    fn show(&mut self, state: IndicatorState) {
        let Err(TrySendError::Full(state)) = self.indicator.try_send(state) else {
            return;
        };
        if let Ok(stale) = self.indicator.try_receive() {
            warn!("Indicator: queue full, skipped {}", stale);
        }
        if let Err(TrySendError::Full(dropped)) = self.indicator.try_send(state) {
            error!("Indicator: queue still full, dropped {}", dropped);
        }
    }
}

impl AudioPort for OutputPorts<'_> {
    fn set_playback(&mut self, enabled: bool) {
        self.settings.playback = enabled;
        self.push_audio();
    }

    fn set_volume(&mut self, level: f32) {
        self.settings.volume = level.clamp(0.0, 1.0);
        self.push_audio();
    }

    fn set_gain(&mut self, enabled: bool) {
        self.settings.gain = enabled;
        self.push_audio();
    }

    fn enable_amplifier(&mut self, enabled: bool) {
        self.settings.amplifier = enabled;
        self.push_audio();
    }
}

// ───────────────────────────────────────────────────────────────
// Task side
// ───────────────────────────────────────────────────────────────

/// Render indicator states onto the RGB LED.
pub async fn indicator_task<R, G, B>(queue: &IndicatorQueue, mut led: StatusLed<R, G, B>)
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    let mut engine = LedPatternEngine::new();
    engine.set_state(IndicatorState::BOOT);
    let mut last = Instant::now();

    loop {
        let next = futures_lite::future::or(async { Some(queue.receive().await) }, async {
            async_io_mini::Timer::after(Duration::from_millis(FRAME_MS)).await;
            None
        })
        .await;

        if let Some(state) = next {
            info!("Indicator: {}", state);
            engine.set_state(state);
        }

        let now = Instant::now();
        let delta = now.duration_since(last).as_millis() as u32;
        last = now;

        if let Err(e) = led.set_colour(engine.tick(delta)) {
            warn!("Indicator: {}", e);
        }
    }
}

/// Power the amplifier for one clip whenever audible settings arrive.
pub async fn audio_task<P: OutputPin>(signal: &AudioSignal, mut amp: Amplifier<P>) {
    loop {
        let settings = signal.wait().await;
        if !settings.audible() {
            if let Err(e) = amp.set_enabled(false) {
                warn!("Audio: {}", e);
            }
            continue;
        }

        info!(
            "Audio: squawk (volume={:.2}, gain={})",
            settings.volume, settings.gain
        );
        if let Err(e) = amp.set_enabled(true) {
            warn!("Audio: {}", e);
            continue;
        }
        async_io_mini::Timer::after(Duration::from_millis(SQUAWK_HOLD_MS)).await;
        if let Err(e) = amp.set_enabled(false) {
            warn!("Audio: {}", e);
        }
    }
}

fn run_output_loop<R, G, B, P>(led: StatusLed<R, G, B>, amp: Amplifier<P>)
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
    P: OutputPin,
{
    let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();

    executor.spawn(indicator_task(&INDICATOR, led)).detach();
    executor.spawn(audio_task(&AUDIO, amp)).detach();

    info!("Output: indicator and audio tasks started");
    futures_lite::future::block_on(executor.run(core::future::pending::<()>()));
}

/// Spawn the output thread on the application core.
///
/// `build` runs on the new thread and constructs the LED and amplifier
/// drivers there, so the peripheral drivers never cross threads.
pub fn spawn<R, G, B, P, E, F>(build: F) -> std::io::Result<std::thread::JoinHandle<()>>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
    P: OutputPin,
    E: core::fmt::Display,
    F: FnOnce() -> Result<(StatusLed<R, G, B>, Amplifier<P>), E> + Send + 'static,
{
    task_pin::spawn_on_core(Core::App, 5, 8, "output\0", move || match build() {
        Ok((led, amp)) => run_output_loop(led, amp),
        Err(e) => error!("Output: driver init failed: {}", e),
    })
}
