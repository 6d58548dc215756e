//! Board adapter: one value that implements every device port.
//!
//! The orchestrator takes a single `&mut impl DevicePorts`.  [`Board`]
//! composes the MQTT transport, the update runner and the output ports,
//! and adds the system services (restart, delay, uptime, heap) itself.
//!
//! | Port            | Delegates to        |
//! |-----------------|---------------------|
//! | `TransportPort` | `T` (MQTT adapter)  |
//! | `UpdatePort`    | `U` (OTA runner)    |
//! | `IndicatorPort` | `OutputPorts`       |
//! | `AudioPort`     | `OutputPorts`       |
//! | `SystemPort`    | this module         |

use core::time::Duration;

use log::{error, info};

use crate::app::ports::{
    AudioPort, IndicatorPort, Qos, SystemPort, TaskHandle, TaskState, TransportPort, UpdatePort,
};
use crate::error::{TransportError, UpdateError};
use crate::indicator::IndicatorState;
use crate::output::OutputPorts;
use crate::update::{UpdateCompletion, UpdateContext};

use super::time::MonotonicClock;

pub struct Board<T, U> {
    pub transport: T,
    pub updater: U,
    pub output: OutputPorts<'static>,
    clock: MonotonicClock,
    restarts: u32,
}

impl<T, U> Board<T, U> {
    pub fn new(transport: T, updater: U, output: OutputPorts<'static>) -> Self {
        Self {
            transport,
            updater,
            output,
            clock: MonotonicClock::new(),
            restarts: 0,
        }
    }

    /// Restart requests seen.  Only ever observable in simulation.
    pub fn restarts(&self) -> u32 {
        self.restarts
    }

    pub fn clock(&self) -> &MonotonicClock {
        &self.clock
    }
}

impl<T: TransportPort, U> TransportPort for Board<T, U> {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError> {
        self.transport.publish(topic, payload, qos, retain)
    }

    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), TransportError> {
        self.transport.subscribe(topic, qos)
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.transport.reconnect()
    }

    fn is_link_active(&self) -> bool {
        self.transport.is_link_active()
    }
}

impl<T, U: UpdatePort> UpdatePort for Board<T, U> {
    fn spawn_update_task(
        &mut self,
        context: UpdateContext,
        completion: UpdateCompletion,
    ) -> Result<TaskHandle, UpdateError> {
        self.updater.spawn_update_task(context, completion)
    }

    fn state_of(&self, handle: TaskHandle) -> TaskState {
        self.updater.state_of(handle)
    }

    fn terminate(&mut self, handle: TaskHandle) {
        self.updater.terminate(handle);
    }
}

impl<T, U> IndicatorPort for Board<T, U> {
    fn show(&mut self, state: IndicatorState) {
        self.output.show(state);
    }
}

impl<T, U> AudioPort for Board<T, U> {
    fn set_playback(&mut self, enabled: bool) {
        self.output.set_playback(enabled);
    }

    fn set_volume(&mut self, level: f32) {
        self.output.set_volume(level);
    }

    fn set_gain(&mut self, enabled: bool) {
        self.output.set_gain(enabled);
    }

    fn enable_amplifier(&mut self, enabled: bool) {
        self.output.enable_amplifier(enabled);
    }
}

impl<T, U> SystemPort for Board<T, U> {
    fn restart_device(&mut self) {
        self.restarts = self.restarts.wrapping_add(1);
        error!("System: restarting (uptime {}s)", self.clock.uptime_secs());
        restart();
    }

    fn delay(&mut self, duration: Duration) {
        info!("System: sleeping {}ms", duration.as_millis());
        std::thread::sleep(duration);
    }

    fn uptime_secs(&self) -> u64 {
        self.clock.uptime_secs()
    }

    fn free_heap_bytes(&self) -> u32 {
        free_heap()
    }
}

#[cfg(target_os = "espidf")]
fn restart() {
    // SAFETY: esp_restart never returns.
    unsafe { esp_idf_svc::sys::esp_restart() }
}

/// Simulation: the caller re-enters boot.
#[cfg(not(target_os = "espidf"))]
fn restart() {
    info!("System(sim): restart requested");
}

#[cfg(target_os = "espidf")]
fn free_heap() -> u32 {
    // SAFETY: read-only heap statistics query.
    unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
}

#[cfg(not(target_os = "espidf"))]
fn free_heap() -> u32 {
    256 * 1024
}
