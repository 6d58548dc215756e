//! Inbound event queue.
//!
//! Events are produced by:
//! - the MQTT client callback (connect, disconnect, data, error)
//! - the update task (run finished)
//! - the dispatch loop's own tick timer
//!
//! Events are consumed by the dispatch loop, strictly in arrival order,
//! one at a time.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ MQTT cb     │────▶│              │     │              │
//! │ Update task │────▶│  Event Queue │────▶│ Dispatch loop│
//! │ Tick        │────▶│  (bounded)   │     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};
use log::warn;

use crate::app::ports::TaskHandle;
use crate::error::{PayloadError, TransportFault};
use crate::update::UpdateOutcome;

/// Maximum inbound topic length (bytes).
pub const MAX_TOPIC_LEN: usize = 128;
/// Maximum inbound payload length (bytes).
pub const MAX_PAYLOAD_LEN: usize = 1024;
/// Maximum number of pending events.
pub const EVENT_QUEUE_CAP: usize = 16;

/// A received MQTT message, copied out of the client's buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String<MAX_TOPIC_LEN>,
    pub payload: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl InboundMessage {
    /// Copy topic and payload into fixed buffers.  Oversize frames are
    /// rejected rather than truncated.
    pub fn new(topic: &str, payload: &[u8]) -> Result<Self, PayloadError> {
        let mut t = String::new();
        t.push_str(topic).map_err(|()| PayloadError::TooLarge {
            len: topic.len(),
            max: MAX_TOPIC_LEN,
        })?;
        let p = Vec::from_slice(payload).map_err(|()| PayloadError::TooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        })?;
        Ok(Self { topic: t, payload: p })
    }
}

/// Everything the dispatch loop reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Broker session established.
    Connected,
    /// Broker session lost.
    Disconnected,
    /// Message received on a subscribed topic.
    Data(InboundMessage),
    /// Unrecoverable transport error reported by the client.
    TransportError(TransportFault),
    /// An update task finished (any outcome).
    UpdateFinished {
        handle: TaskHandle,
        outcome: UpdateOutcome,
    },
    /// Periodic housekeeping tick.
    Tick { uptime_secs: u64 },
}

pub type EventQueue = Channel<CriticalSectionRawMutex, Event, EVENT_QUEUE_CAP>;

/// The firmware's event queue.  Tests use their own local queues.
pub static EVENTS: EventQueue = Channel::new();

/// Push an event.  Never blocks; returns `false` (and logs) if the
/// queue is full and the event was dropped.
pub fn push_event(queue: &EventQueue, event: Event) -> bool {
    match queue.try_send(event) {
        Ok(()) => true,
        Err(embassy_sync::channel::TrySendError::Full(dropped)) => {
            warn!("Events: queue full, dropped {:?}", dropped);
            false
        }
    }
}

/// Pop the next event.  `None` if the queue is empty.
pub fn pop_event(queue: &EventQueue) -> Option<Event> {
    queue.try_receive().ok()
}

/// Drain all pending events into a callback, in FIFO order.
pub fn drain_events(queue: &EventQueue, mut handler: impl FnMut(Event)) {
    while let Some(event) = pop_event(queue) {
        handler(event);
    }
}
