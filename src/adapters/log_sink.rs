//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one line per application event to
//! the ESP-IDF logger (UART / USB-CDC).  Alerts, drops and restarts are
//! logged at `warn`/`error` so they survive a raised log level.

use log::{error, info, warn};

use crate::app::events::{AppEvent, DropReason};
use crate::app::ports::EventSink;
use crate::connection::ReconnectOutcome;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink {
    emitted: u32,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written since boot.
    pub fn emitted(&self) -> u32 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted = self.emitted.wrapping_add(1);
        match event {
            AppEvent::Started(state) => info!("START | indicator={}", state),
            AppEvent::IndicatorChanged { from, to } => info!("LED | {} -> {}", from, to),
            AppEvent::AlertRaised(state) => warn!("ALERT | squawk for {}", state),
            AppEvent::IndicatorSuppressed(state) => {
                info!("LED | {} suppressed, indicator is sticky", state);
            }
            AppEvent::ConnectionChanged(state) => info!("MQTT | {:?}", state),
            AppEvent::Reconnect(ReconnectOutcome::Reconnected { attempts }) => {
                info!("MQTT | reconnect initiated after {} attempt(s)", attempts);
            }
            AppEvent::Reconnect(ReconnectOutcome::Exhausted { attempts }) => {
                error!("MQTT | reconnect abandoned after {} attempts", attempts);
            }
            AppEvent::Reconnect(ReconnectOutcome::LinkDown) => {
                warn!("MQTT | link down, reconnect skipped");
            }
            AppEvent::UpdateStarted(handle) => info!("OTA | started {}", handle),
            AppEvent::UpdateRejected { handle, state } => {
                warn!("OTA | rejected, {:?} still {}", handle, state);
            }
            AppEvent::UpdateSpawnFailed(e) => error!("OTA | spawn failed: {}", e),
            AppEvent::UpdateFinished { handle, outcome } => {
                info!("OTA | {} finished: {}", handle, outcome);
            }
            AppEvent::UpdateTimedOut(handle) => error!("OTA | {} timed out", handle),
            AppEvent::MessageDropped(DropReason::Payload(e)) => warn!("DROP | payload: {}", e),
            AppEvent::MessageDropped(DropReason::UnknownLabel(label)) => {
                warn!("DROP | unknown label '{}'", label);
            }
            AppEvent::MessageDropped(DropReason::UnknownTopic(topic)) => {
                warn!("DROP | unknown topic '{}'", topic);
            }
            AppEvent::RestartRequested(reason) => error!("RESTART | {:?}", reason),
        }
    }
}
