//! Connection lifecycle monitor.
//!
//! Tracks the broker session and reacts to its lifecycle:
//!
//! - **connected**: subscribe to the inbound topics and ask peers for
//!   their current status.
//! - **disconnected**: bounded reconnect, only while the Wi-Fi link is up.
//!   The dispatch context sleeps between attempts, so no other event is
//!   processed meanwhile.
//! - **transport error**: log the detail and restart the device.

use core::time::Duration;

use log::{error, info, warn};

use crate::app::ports::{Qos, SystemPort, TransportPort};
use crate::config::{ReconnectPolicy, TopicConfig};
use crate::error::TransportFault;
use crate::telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

// ───────────────────────────────────────────────────────────────
// Retry counter
// ───────────────────────────────────────────────────────────────

/// Per-disconnect attempt budget.  Created fresh on every disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryCounter {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl RetryCounter {
    pub fn new(policy: &ReconnectPolicy) -> Self {
        Self {
            attempts: 0,
            max_attempts: policy.max_attempts,
            delay: Duration::from_millis(u64::from(policy.delay_ms)),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Count one failed attempt.
    pub fn record_failure(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }
}

/// Result of the disconnect handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// A reconnect was initiated after `attempts` tries (1-based).
    Reconnected { attempts: u32 },
    /// Every attempt failed; the monitor gives up until the next event.
    Exhausted { attempts: u32 },
    /// The Wi-Fi link is down, no attempt was made.
    LinkDown,
}

// ───────────────────────────────────────────────────────────────
// Monitor
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    policy: ReconnectPolicy,
    last_retry: Option<RetryCounter>,
}

impl ConnectionMonitor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            policy,
            last_retry: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Counter used by the most recent disconnect, for diagnostics.
    pub fn last_retry(&self) -> Option<RetryCounter> {
        self.last_retry
    }

    /// Session established: subscribe and announce.
    ///
    /// Subscribe/publish failures are logged only; the session stays up.
    pub fn on_connected(&mut self, topics: &TopicConfig, transport: &mut impl TransportPort) {
        self.state = ConnectionState::Connected;
        self.last_retry = None;

        for topic in topics.inbound() {
            match transport.subscribe(topic, Qos::AtMostOnce) {
                Ok(()) => info!("MQTT: subscribed to {}", topic),
                Err(e) => warn!("MQTT: subscribe to {} failed: {}", topic, e),
            }
        }

        let announce = telemetry::status_request_payload();
        match transport.publish(&topics.status_announce, announce.as_bytes(), Qos::AtMostOnce, false) {
            Ok(()) => info!("MQTT: status request published"),
            Err(e) => warn!("MQTT: status request publish failed: {}", e),
        }
    }

    /// Session lost: retry while the link is up, at most
    /// `max_attempts` times with `delay` after each failure.
    pub fn on_disconnected(
        &mut self,
        ports: &mut (impl TransportPort + SystemPort),
    ) -> ReconnectOutcome {
        self.state = ConnectionState::Disconnected;

        if !ports.is_link_active() {
            info!("MQTT: disconnected, Wi-Fi link down, skipping reconnect");
            return ReconnectOutcome::LinkDown;
        }

        let mut counter = RetryCounter::new(&self.policy);
        let outcome = loop {
            if counter.exhausted() {
                error!(
                    "MQTT: reconnect abandoned after {} attempts",
                    counter.attempts()
                );
                break ReconnectOutcome::Exhausted {
                    attempts: counter.attempts(),
                };
            }
            match ports.reconnect() {
                Ok(()) => {
                    let attempts = counter.attempts() + 1;
                    info!("MQTT: reconnect initiated (attempt {})", attempts);
                    break ReconnectOutcome::Reconnected { attempts };
                }
                Err(e) => {
                    warn!(
                        "MQTT: reconnect attempt {} failed: {}",
                        counter.attempts() + 1,
                        e
                    );
                    ports.delay(counter.delay());
                    counter.record_failure();
                }
            }
        };

        self.last_retry = Some(counter);
        outcome
    }

    /// Unrecoverable transport error: log by kind, then restart.
    pub fn on_transport_error(&mut self, fault: TransportFault, system: &mut impl SystemPort) {
        match fault {
            TransportFault::Tls {
                esp_err,
                stack_err,
                cert_flags,
            } => {
                error!("MQTT: last ESP error code: 0x{:x}", esp_err);
                error!("MQTT: last TLS stack error code: 0x{:x}", stack_err);
                error!("MQTT: TLS cert verify flags: 0x{:x}", cert_flags);
            }
            TransportFault::ConnectionRefused { code } => {
                error!("MQTT: connection refused: 0x{:x}", code);
            }
            TransportFault::Unknown { code } => {
                error!("MQTT: unknown error type: 0x{:x}", code);
            }
        }
        self.state = ConnectionState::Disconnected;
        error!("MQTT: transport error is fatal, restarting");
        system.restart_device();
    }
}
