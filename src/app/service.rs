//! Application service: the hexagonal core.
//!
//! [`Orchestrator`] owns the indicator arbiter, the update guard and the
//! connection monitor.  It receives one [`Event`] at a time and turns it
//! into port calls.  All I/O flows through port traits injected at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!  Event ───────▶ │         Orchestrator          │ ──▶ EventSink
//!                 │  Router · Indicator · Update  │
//! DevicePorts ◀── │        · Connection           │
//!                 └──────────────────────────────┘
//! ```

use log::{error, info, warn};

use crate::config::SystemConfig;
use crate::connection::{ConnectionMonitor, ConnectionState};
use crate::error::{ConfigError, TransportFault};
use crate::events::Event;
use crate::indicator::arbiter::{ApplyOutcome, IndicatorArbiter};
use crate::indicator::{IndicatorState, Vocabulary};
use crate::router::{Route, parse_status_label};
use crate::telemetry::{self, TelemetryReport};
use crate::update::{StartOutcome, UpdateContext, UpdateGuard, UpdateOutcome, UpdateSlot, UpdateStatus};

use super::events::{AppEvent, DropReason, RestartReason};
use super::ports::{DevicePorts, EventSink, Qos, SystemPort, TaskHandle, TransportPort};

// ───────────────────────────────────────────────────────────────
// Orchestrator
// ───────────────────────────────────────────────────────────────

/// Event-driven device orchestration.
pub struct Orchestrator {
    config: SystemConfig,
    vocabulary: Vocabulary,
    indicator: IndicatorArbiter,
    update: UpdateGuard,
    connection: ConnectionMonitor,
    /// Telemetry goes out once on the first connect after boot.
    boot_telemetry_sent: bool,
}

impl Orchestrator {
    /// Construct the orchestrator from a validated configuration.
    ///
    /// Does **not** touch any port; call [`boot`](Self::boot) next.
    pub fn new(config: SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            vocabulary: Vocabulary::new(&config.indicator_aliases),
            indicator: IndicatorArbiter::new(),
            update: UpdateGuard::new(),
            connection: ConnectionMonitor::new(config.reconnect),
            boot_telemetry_sent: false,
            config,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter the boot state: flashing white, no update, disconnected.
    ///
    /// Also the re-entry point after a restart request on targets where
    /// the restart returns (simulation).
    pub fn boot(&mut self, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        self.update.reset();
        self.connection = ConnectionMonitor::new(self.config.reconnect);
        self.boot_telemetry_sent = false;
        self.indicator.force(IndicatorState::BOOT, hw);
        sink.emit(&AppEvent::Started(IndicatorState::BOOT));
        info!("Orchestrator: booted as '{}' ({})", self.config.device_name, self.config.location);
    }

    // ── Dispatch ──────────────────────────────────────────────

    /// Process one event to completion.
    pub fn handle_event(&mut self, event: Event, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        match event {
            Event::Connected => self.on_connected(hw, sink),
            Event::Disconnected => self.on_disconnected(hw, sink),
            Event::Data(msg) => self.handle_message(&msg.topic, &msg.payload, hw, sink),
            Event::TransportError(fault) => self.on_transport_error(fault, hw, sink),
            Event::UpdateFinished { handle, outcome } => {
                self.on_update_finished(handle, outcome, hw, sink);
            }
            Event::Tick { uptime_secs } => self.on_tick(uptime_secs, hw, sink),
        }
    }

    /// Route one inbound message by exact topic match.
    pub fn handle_message(
        &mut self,
        topic: &str,
        payload: &[u8],
        hw: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) {
        match Route::classify(topic, &self.config.topics) {
            Route::Status => self.on_status(payload, hw, sink),
            Route::UpdateTrigger => self.on_update_trigger(hw, sink),
            Route::TelemetryRequest => {
                info!("Router: telemetry requested");
                self.publish_telemetry(hw);
            }
            Route::Unknown => {
                warn!("Router: unhandled topic '{}' ({} bytes)", topic, payload.len());
                sink.emit(&AppEvent::MessageDropped(DropReason::UnknownTopic(topic.into())));
            }
        }
    }

    // ── Connection lifecycle ──────────────────────────────────

    fn on_connected(&mut self, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        self.connection.on_connected(&self.config.topics, hw);
        sink.emit(&AppEvent::ConnectionChanged(ConnectionState::Connected));

        if !self.boot_telemetry_sent {
            self.publish_telemetry(hw);
            self.boot_telemetry_sent = true;
        }
    }

    fn on_disconnected(&mut self, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        if let Some(handle) = self.update.terminate(hw) {
            warn!("Orchestrator: disconnect cancelled update {}", handle);
        }
        sink.emit(&AppEvent::ConnectionChanged(ConnectionState::Disconnected));

        let outcome = self.connection.on_disconnected(hw);
        sink.emit(&AppEvent::Reconnect(outcome));
    }

    fn on_transport_error(
        &mut self,
        fault: TransportFault,
        hw: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) {
        sink.emit(&AppEvent::RestartRequested(RestartReason::TransportFault(fault)));
        self.connection.on_transport_error(fault, hw);
        self.boot(hw, sink);
    }

    // ── Status reports ────────────────────────────────────────

    fn on_status(&mut self, payload: &[u8], hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        let label = match parse_status_label(payload, &self.config.status_field) {
            Ok(label) => label,
            Err(e) => {
                warn!("Status: dropped report: {}", e);
                sink.emit(&AppEvent::MessageDropped(DropReason::Payload(e)));
                return;
            }
        };

        let Some(requested) = self.vocabulary.resolve(&label) else {
            warn!("Status: unknown label '{}'", label);
            sink.emit(&AppEvent::MessageDropped(DropReason::UnknownLabel(label)));
            return;
        };

        match self.indicator.apply(requested, hw) {
            ApplyOutcome::Committed { previous, alert } => {
                if alert {
                    sink.emit(&AppEvent::AlertRaised(requested));
                }
                sink.emit(&AppEvent::IndicatorChanged {
                    from: previous,
                    to: requested,
                });
            }
            ApplyOutcome::Suppressed => sink.emit(&AppEvent::IndicatorSuppressed(requested)),
            ApplyOutcome::Rejected => {
                sink.emit(&AppEvent::MessageDropped(DropReason::UnknownLabel(label)));
            }
        }
    }

    // ── Firmware update ───────────────────────────────────────

    fn on_update_trigger(&mut self, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        info!("Update: requested");
        self.publish_progress(hw, "OTA update requested");

        let context = UpdateContext {
            firmware_url: self.config.update.firmware_url.clone(),
            timeout_secs: self.config.update.timeout_secs,
        };
        let now = hw.uptime_secs();

        match self.update.try_start_update(context, now, &mut self.indicator, hw) {
            Ok(StartOutcome::Started(handle)) => sink.emit(&AppEvent::UpdateStarted(handle)),
            Ok(StartOutcome::AlreadyRunning { handle, state }) => {
                let message = format!(
                    "OTA task is already running or not yet cleaned up, skipping OTA update. task_state={}",
                    state
                );
                self.publish_progress(hw, &message);
                sink.emit(&AppEvent::UpdateRejected { handle, state });
            }
            Err(e) => {
                self.publish_progress(hw, &format!("OTA update could not start: {}", e));
                sink.emit(&AppEvent::UpdateSpawnFailed(e));
            }
        }
    }

    fn on_update_finished(
        &mut self,
        handle: TaskHandle,
        outcome: UpdateOutcome,
        hw: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) {
        sink.emit(&AppEvent::UpdateFinished { handle, outcome });

        match self.update.take_outcome(Some(handle)) {
            Some((handle, recorded)) => self.act_on_outcome(handle, recorded, hw, sink),
            None => info!("Update: {} finish ignored ({}), superseded or handled", handle, outcome),
        }
    }

    /// Act on a finished run: restart into the new image or after a
    /// failure.  Called once per run.
    fn act_on_outcome(
        &mut self,
        handle: TaskHandle,
        outcome: UpdateOutcome,
        hw: &mut impl DevicePorts,
        sink: &mut impl EventSink,
    ) {
        self.publish_progress(hw, &format!("OTA update {}", outcome));
        match outcome {
            UpdateOutcome::Succeeded => {
                info!("Update: {} applied, restarting into new image", handle);
                self.restart(RestartReason::UpdateApplied, hw, sink);
            }
            UpdateOutcome::Failed(_) | UpdateOutcome::Abandoned => {
                error!("Update: {} {}, restarting", handle, outcome);
                self.restart(RestartReason::UpdateFailed, hw, sink);
            }
            UpdateOutcome::Cancelled => {}
        }
    }

    fn on_tick(&mut self, uptime_secs: u64, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        // The finish event may have been lost (queue full, task panicked).
        if let Some((handle, outcome)) = self.update.take_outcome(None) {
            warn!("Update: {} finished ({}) without a finish event", handle, outcome);
            self.act_on_outcome(handle, outcome, hw, sink);
            return;
        }

        let Some(handle) = self.update.overdue(uptime_secs, self.config.update.timeout_secs) else {
            return;
        };
        error!(
            "Update: {} exceeded {}s deadline, restarting",
            handle, self.config.update.timeout_secs
        );
        sink.emit(&AppEvent::UpdateTimedOut(handle));
        self.update.terminate(hw);
        self.publish_progress(hw, "OTA update timed out");
        self.restart(RestartReason::UpdateTimeout, hw, sink);
    }

    fn restart(&mut self, reason: RestartReason, hw: &mut impl DevicePorts, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::RestartRequested(reason));
        hw.restart_device();
        self.boot(hw, sink);
    }

    // ── Outbound messages ─────────────────────────────────────

    fn publish_progress(&self, transport: &mut impl TransportPort, message: &str) {
        let payload = telemetry::device_message(&self.config.device_name, message);
        if let Err(e) = transport.publish(
            &self.config.topics.update_progress,
            payload.as_bytes(),
            Qos::AtMostOnce,
            false,
        ) {
            warn!("Update: progress publish failed: {}", e);
        }
    }

    fn publish_telemetry(&self, hw: &mut (impl TransportPort + SystemPort)) {
        let report = self.build_telemetry(&*hw);
        let json = match report.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Telemetry: serialisation failed: {}", e);
                return;
            }
        };
        match hw.publish(
            &self.config.topics.telemetry_report,
            json.as_bytes(),
            Qos::AtMostOnce,
            false,
        ) {
            Ok(()) => info!("Telemetry: report published"),
            Err(e) => warn!("Telemetry: publish failed: {}", e),
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current state.
    pub fn build_telemetry(&self, system: &impl SystemPort) -> TelemetryReport {
        TelemetryReport::new(
            &self.config.device_name,
            &self.config.location,
            system.uptime_secs(),
            system.free_heap_bytes(),
            self.connection.state(),
            self.indicator.current(),
            self.update.status(),
        )
    }

    pub fn indicator(&self) -> IndicatorState {
        self.indicator.current()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn update_status(&self) -> UpdateStatus {
        self.update.status()
    }

    pub fn update_slot(&self) -> UpdateSlot {
        self.update.snapshot()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}
