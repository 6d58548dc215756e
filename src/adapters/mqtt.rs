//! MQTT transport adapter.
//!
//! Implements [`TransportPort`].  The client's connection half is polled
//! on its own thread; every event it yields is translated into an
//! [`Event`] and pushed onto the dispatch queue.  The poll thread never
//! acts on events itself.
//!
//! ```text
//!  ┌──────────────┐  conn.next()  ┌─────────────┐  push_event  ┌────────────┐
//!  │ ESP-MQTT     │──────────────▶│ mqtt-poll   │─────────────▶│  EVENTS    │
//!  │ (esp-tls)    │               │ thread      │              │  (16 deep) │
//!  └──────────────┘               └─────────────┘              └────────────┘
//! ```
//!
//! `reconnect()` rebuilds the client, which starts a fresh session and a
//! fresh poll thread.  The old client is dropped first so only one
//! session is ever open.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: an in-memory transport that records traffic.

use log::warn;

use crate::app::ports::{Qos, TransportPort};
use crate::error::{TransportError, TransportFault};
use crate::events::{Event, EventQueue, InboundMessage, push_event};

// ───────────────────────────────────────────────────────────────
// Event translation (target independent)
// ───────────────────────────────────────────────────────────────

/// First ESP-TLS error code (`ESP_ERR_ESP_TLS_BASE`).
const ESP_TLS_ERR_BASE: i32 = 0x8000;
/// One past the last ESP-TLS error code.
const ESP_TLS_ERR_END: i32 = 0x8100;
/// MQTT 3.1.1 CONNACK refusal codes.
const CONNACK_REFUSED: core::ops::RangeInclusive<i32> = 1..=5;

/// Diagnostic codes reported with a client error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ErrorReport {
    /// Last ESP error code (TLS layer or socket).
    pub esp_err: i32,
    /// Last error code from the TLS stack itself.
    pub stack_err: i32,
    /// Certificate verification flags.
    pub cert_flags: i32,
}

/// Map an error reported by the client onto a [`TransportFault`].
pub fn classify_error(report: ErrorReport) -> TransportFault {
    let code = report.esp_err;
    if (ESP_TLS_ERR_BASE..ESP_TLS_ERR_END).contains(&code) {
        TransportFault::Tls {
            esp_err: code,
            stack_err: report.stack_err,
            cert_flags: report.cert_flags,
        }
    } else if CONNACK_REFUSED.contains(&code) {
        TransportFault::ConnectionRefused { code }
    } else {
        TransportFault::Unknown { code }
    }
}

/// Copy a received message into an event.  Oversize messages are
/// dropped here so they never reach the dispatch loop.
pub fn data_event(topic: &str, payload: &[u8]) -> Option<Event> {
    match InboundMessage::new(topic, payload) {
        Ok(msg) => Some(Event::Data(msg)),
        Err(e) => {
            warn!("MQTT: dropped message on '{}': {}", topic, e);
            None
        }
    }
}

/// Forward one translated event to the dispatch queue.
fn forward(queue: &EventQueue, event: Option<Event>) {
    if let Some(event) = event {
        push_event(queue, event);
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF implementation
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use super::{ErrorReport, classify_error, data_event, forward};
    use crate::app::ports::Qos;
    use crate::drivers::task_pin::{self, Core};
    use crate::error::TransportError;
    use crate::events::{EVENTS, Event};

    use esp_idf_svc::mqtt::client::{
        Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration, QoS,
    };
    use log::{info, warn};

    pub(super) fn qos(q: Qos) -> QoS {
        match q {
            Qos::AtMostOnce => QoS::AtMostOnce,
            Qos::AtLeastOnce => QoS::AtLeastOnce,
            Qos::ExactlyOnce => QoS::ExactlyOnce,
        }
    }

    pub(super) fn connect(
        url: &str,
        client_id: &str,
    ) -> Result<EspMqttClient<'static>, TransportError> {
        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        let (client, conn) = EspMqttClient::new(url, &conf).map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            TransportError::ReconnectFailed(e.code())
        })?;

        task_pin::spawn_on_core(Core::Pro, 6, 6, "mqtt-poll\0", move || poll(conn)).map_err(
            |e| {
                warn!("MQTT: poll thread spawn failed: {}", e);
                TransportError::ReconnectFailed(-1)
            },
        )?;

        info!("MQTT: client started for {}", url);
        Ok(client)
    }

    /// Drain the connection until the client is dropped.
    fn poll(mut conn: EspMqttConnection) {
        while let Ok(event) = conn.next() {
            let translated = match event.payload() {
                EventPayload::Connected(_) => Some(Event::Connected),
                EventPayload::Disconnected => Some(Event::Disconnected),
                EventPayload::Received {
                    topic,
                    data,
                    details: Details::Complete,
                    ..
                } => data_event(topic.unwrap_or_default(), data),
                EventPayload::Received { topic, .. } => {
                    warn!("MQTT: chunked message on {:?} dropped", topic);
                    None
                }
                EventPayload::Error(e) => Some(Event::TransportError(classify_error(
                    ErrorReport {
                        esp_err: e.code(),
                        ..ErrorReport::default()
                    },
                ))),
                _ => None,
            };
            forward(&EVENTS, translated);
        }
        info!("MQTT: connection closed, poll thread exiting");
    }
}

#[cfg(target_os = "espidf")]
pub struct MqttTransport {
    url: String,
    client_id: String,
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
}

#[cfg(target_os = "espidf")]
impl MqttTransport {
    /// Start the client.  Lifecycle events arrive on the event queue.
    pub fn start(url: &str, client_id: &str) -> anyhow::Result<Self> {
        let client = esp::connect(url, client_id).map_err(crate::error::Error::from)?;
        Ok(Self {
            url: url.into(),
            client_id: client_id.into(),
            client: Some(client),
        })
    }
}

#[cfg(target_os = "espidf")]
impl TransportPort for MqttTransport {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotStarted)?;
        client
            .publish(topic, esp::qos(qos), retain, payload)
            .map(|_| ())
            .map_err(|e| TransportError::PublishFailed(e.code()))
    }

    fn subscribe(&mut self, topic: &str, qos: Qos) -> Result<(), TransportError> {
        let client = self.client.as_mut().ok_or(TransportError::NotStarted)?;
        client
            .subscribe(topic, esp::qos(qos))
            .map(|_| ())
            .map_err(|e| TransportError::SubscribeFailed(e.code()))
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        // Dropping the old client closes its connection and ends its poll thread.
        self.client = None;
        self.client = Some(esp::connect(&self.url, &self.client_id)?);
        Ok(())
    }

    fn is_link_active(&self) -> bool {
        super::wifi::link_active()
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation implementation
// ───────────────────────────────────────────────────────────────

/// A message published through the simulated transport.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: Qos,
    pub retain: bool,
}

/// In-memory transport: records traffic and reports lifecycle events on
/// the given queue, so the dispatch loop sees the same sequence it would
/// on hardware.
#[cfg(not(target_os = "espidf"))]
pub struct MqttTransport {
    queue: &'static EventQueue,
    /// Number of upcoming `reconnect()` calls that fail.
    failing_reconnects: u32,
    pub published: Vec<Published>,
    pub subscriptions: Vec<String>,
    pub reconnects: u32,
}

#[cfg(not(target_os = "espidf"))]
impl MqttTransport {
    /// "Connect": queue a `Connected` event.
    pub fn start(queue: &'static EventQueue) -> Self {
        log::info!("MQTT(sim): session up");
        push_event(queue, Event::Connected);
        Self {
            queue,
            failing_reconnects: 0,
            published: Vec::new(),
            subscriptions: Vec::new(),
            reconnects: 0,
        }
    }

    /// Drive the simulated Wi-Fi link the transport reports.
    pub fn set_link_active(&mut self, active: bool) {
        super::wifi::set_sim_link(active);
    }

    pub fn fail_next_reconnects(&mut self, count: u32) {
        self.failing_reconnects = count;
    }

    /// Simulate a message arriving from the broker.
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        forward(self.queue, data_event(topic, payload));
    }

    /// Simulate the broker dropping the session.
    pub fn drop_session(&self) {
        push_event(self.queue, Event::Disconnected);
    }

    /// Simulate a client error.
    pub fn fail(&self, report: ErrorReport) {
        push_event(self.queue, Event::TransportError(classify_error(report)));
    }
}

#[cfg(not(target_os = "espidf"))]
impl TransportPort for MqttTransport {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: Qos,
        retain: bool,
    ) -> Result<(), TransportError> {
        log::info!("MQTT(sim): publish {} ({} bytes)", topic, payload.len());
        self.published.push(Published {
            topic: topic.into(),
            payload: payload.to_vec(),
            qos,
            retain,
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: Qos) -> Result<(), TransportError> {
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.into());
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.reconnects += 1;
        if self.failing_reconnects > 0 {
            self.failing_reconnects -= 1;
            return Err(TransportError::ReconnectFailed(-1));
        }
        push_event(self.queue, Event::Connected);
        Ok(())
    }

    fn is_link_active(&self) -> bool {
        super::wifi::link_active()
    }
}
