//! Outbound application events.
//!
//! The [`Orchestrator`](super::service::Orchestrator) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, cloud logger, …).

use crate::app::ports::{TaskHandle, TaskState};
use crate::connection::{ConnectionState, ReconnectOutcome};
use crate::error::{PayloadError, TransportFault, UpdateError};
use crate::indicator::IndicatorState;
use crate::update::UpdateOutcome;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The orchestrator booted (carries the initial indicator).
    Started(IndicatorState),

    /// A status report changed the indicator.
    IndicatorChanged {
        from: IndicatorState,
        to: IndicatorState,
    },

    /// The squawk was sounded for this state.
    AlertRaised(IndicatorState),

    /// A status report was ignored because the indicator is sticky.
    IndicatorSuppressed(IndicatorState),

    /// Broker session state changed.
    ConnectionChanged(ConnectionState),

    /// Outcome of the disconnect handling.
    Reconnect(ReconnectOutcome),

    UpdateStarted(TaskHandle),

    /// A second update was requested while one is in flight.
    UpdateRejected {
        handle: Option<TaskHandle>,
        state: TaskState,
    },

    UpdateSpawnFailed(UpdateError),

    UpdateFinished {
        handle: TaskHandle,
        outcome: UpdateOutcome,
    },

    /// The running update passed its deadline.
    UpdateTimedOut(TaskHandle),

    /// A message was dropped (bad payload, unknown label or topic).
    MessageDropped(DropReason),

    /// The device is about to restart.
    RestartRequested(RestartReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Payload(PayloadError),
    UnknownLabel(String),
    UnknownTopic(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    TransportFault(TransportFault),
    /// A new image was written and marked bootable.
    UpdateApplied,
    UpdateTimeout,
    UpdateFailed,
}
