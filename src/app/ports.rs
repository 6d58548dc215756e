//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Orchestrator (domain)
//! ```
//!
//! Driven adapters (MQTT client, OTA task runner, LED/audio output tasks,
//! board services, event sinks) implement these traits.  The
//! [`Orchestrator`](super::service::Orchestrator) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! Every port call is made from the single dispatch context.  Adapters
//! that hand work to other threads (update task, output tasks) do so
//! through their own queues.

use core::fmt;
use core::time::Duration;

use crate::error::{TransportError, UpdateError};
use crate::indicator::IndicatorState;
use crate::update::{UpdateCompletion, UpdateContext};

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ MQTT broker)
// ───────────────────────────────────────────────────────────────

/// MQTT delivery guarantee.  The appliance only ever uses `AtMostOnce`,
/// the other levels exist so adapters can map them faithfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Publish/subscribe session with the broker plus a view of the link layer.
pub trait TransportPort {
    /// Queue a message for the broker.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos, retain: bool)
    -> Result<(), TransportError>;

    /// Subscribe to a topic.  Duplicate subscriptions are harmless.
    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), TransportError>;

    /// Ask the client to re-establish the broker session.
    /// `Ok` means the attempt was initiated; `Connected` arrives as an event.
    fn reconnect(&mut self) -> Result<(), TransportError>;

    /// Whether the underlying Wi-Fi station is associated.
    fn is_link_active(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Update port (driven adapter: domain → firmware update task)
// ───────────────────────────────────────────────────────────────

/// Opaque reference to a spawned update task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(pub u32);

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// Runtime view of an update task, as reported by the task runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Unknown,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

pub trait UpdatePort {
    /// Start the update task.  The task owns `completion` and must signal
    /// through it (dropping it counts as an abandoned run).
    fn spawn_update_task(
        &mut self,
        context: UpdateContext,
        completion: UpdateCompletion,
    ) -> Result<TaskHandle, UpdateError>;

    fn state_of(&self, handle: TaskHandle) -> TaskState;

    /// Cooperatively cancel a running task.  Returns without waiting.
    fn terminate(&mut self, handle: TaskHandle);
}

// ───────────────────────────────────────────────────────────────
// Indicator / audio ports (driven adapters: domain → output tasks)
// ───────────────────────────────────────────────────────────────

pub trait IndicatorPort {
    /// Hand a new state to the indicator-output task.  Fire-and-forget.
    fn show(&mut self, state: IndicatorState);
}

pub trait AudioPort {
    fn set_playback(&mut self, enabled: bool);
    /// Linear volume, `0.0..=1.0`.
    fn set_volume(&mut self, level: f32);
    fn set_gain(&mut self, enabled: bool);
    fn enable_amplifier(&mut self, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain → board services)
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Reboot the device.  Never returns on hardware; simulation adapters
    /// record the request and return so tests can observe it.
    fn restart_device(&mut self);

    /// Block the dispatch context.
    fn delay(&mut self, duration: Duration);

    fn uptime_secs(&self) -> u64;

    fn free_heap_bytes(&self) -> u32;
}

/// Everything the orchestrator drives, as one bound.
///
/// A single adapter (the board) implements all of these; passing one
/// `&mut impl DevicePorts` avoids juggling several mutable borrows.
pub trait DevicePorts: TransportPort + UpdatePort + IndicatorPort + AudioPort + SystemPort {}

impl<T> DevicePorts for T where T: TransportPort + UpdatePort + IndicatorPort + AudioPort + SystemPort {}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
