//! Inbound topic routing and status payload parsing.
//!
//! Topics are matched exactly against the configured inbound set; there
//! is no wildcard or prefix matching.

use serde_json::Value;

use crate::config::TopicConfig;
use crate::error::PayloadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Status,
    UpdateTrigger,
    TelemetryRequest,
    Unknown,
}

impl Route {
    pub fn classify(topic: &str, topics: &TopicConfig) -> Self {
        if topic == topics.status {
            Self::Status
        } else if topic == topics.update_trigger {
            Self::UpdateTrigger
        } else if topic == topics.telemetry_request {
            Self::TelemetryRequest
        } else {
            Self::Unknown
        }
    }
}

/// Extract the status label from a JSON status report.
///
/// Fails closed: anything other than an object with a string `field`
/// yields an error and no label.
pub fn parse_status_label(payload: &[u8], field: &str) -> Result<String, PayloadError> {
    let json: Value = serde_json::from_slice(payload).map_err(|_| PayloadError::InvalidJson)?;
    let object = json.as_object().ok_or(PayloadError::InvalidJson)?;
    match object.get(field) {
        None => Err(PayloadError::MissingField),
        Some(Value::String(label)) => Ok(label.clone()),
        Some(_) => Err(PayloadError::NotString),
    }
}
