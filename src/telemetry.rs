//! Outbound JSON payloads.
//!
//! Three message shapes leave the device:
//!
//! - the status-request announcement, `{"message":"status_request"}`;
//! - device-keyed diagnostics on the update-progress topic,
//!   `{"<device>":"<text>"}`;
//! - the telemetry report ([`TelemetryReport`]).

use serde::Serialize;
use serde_json::{Map, Value};

use crate::connection::ConnectionState;
use crate::indicator::IndicatorState;
use crate::update::UpdateStatus;

pub fn status_request_payload() -> String {
    serde_json::json!({ "message": "status_request" }).to_string()
}

/// `{"<device_name>": "<message>"}`
pub fn device_message(device_name: &str, message: &str) -> String {
    let mut map = Map::new();
    map.insert(device_name.into(), Value::String(message.into()));
    Value::Object(map).to_string()
}

/// Snapshot published on the telemetry-report topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryReport {
    pub device: String,
    pub location: String,
    pub firmware_version: &'static str,
    pub uptime_secs: u64,
    pub free_heap_bytes: u32,
    pub connected: bool,
    pub indicator: IndicatorState,
    pub update_status: &'static str,
}

impl TelemetryReport {
    pub fn new(
        device: &str,
        location: &str,
        uptime_secs: u64,
        free_heap_bytes: u32,
        connection: ConnectionState,
        indicator: IndicatorState,
        update_status: UpdateStatus,
    ) -> Self {
        Self {
            device: device.into(),
            location: location.into(),
            firmware_version: env!("CARGO_PKG_VERSION"),
            uptime_secs,
            free_heap_bytes,
            connected: connection == ConnectionState::Connected,
            indicator,
            update_status: match update_status {
                UpdateStatus::Idle => "idle",
                UpdateStatus::Running => "running",
                UpdateStatus::Terminating => "terminating",
                UpdateStatus::Completed => "completed",
            },
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
