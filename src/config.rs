//! System configuration parameters
//!
//! All tunable parameters for the Coop Snooper appliance: identity, MQTT
//! topic surface, reconnect policy, firmware update source and status
//! label aliases.  Defaults match the deployed Farm House unit; a JSON
//! document may override any subset of fields.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::indicator::IndicatorState;

/// MQTT topic surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    // --- Inbound ---
    /// Status reports from the coop controller.
    pub status: String,
    /// Firmware update requests.
    pub update_trigger: String,
    /// Telemetry requests.
    pub telemetry_request: String,

    // --- Outbound ---
    /// Status-request announcement published on every connect.
    pub status_announce: String,
    /// Update progress and diagnostics.
    pub update_progress: String,
    /// Telemetry reports.
    pub telemetry_report: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            status: "coop-controller/status".into(),
            update_trigger: "coop-snooper/ota-update".into(),
            telemetry_request: "coop-snooper/telemetry-request".into(),
            status_announce: "coop-controller/status-request".into(),
            update_progress: "coop-snooper/ota-progress".into(),
            telemetry_report: "coop-snooper/telemetry".into(),
        }
    }
}

impl TopicConfig {
    /// The three topics subscribed on every connect.
    pub fn inbound(&self) -> [&str; 3] {
        [
            self.status.as_str(),
            self.update_trigger.as_str(),
            self.telemetry_request.as_str(),
        ]
    }

    fn outbound(&self) -> [&str; 3] {
        [
            self.status_announce.as_str(),
            self.update_progress.as_str(),
            self.telemetry_report.as_str(),
        ]
    }
}

/// Bounded reconnect after a broker disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    /// Sleep after each failed attempt (milliseconds).
    pub delay_ms: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay_ms: 5000,
        }
    }
}

/// Firmware update source and deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdatePolicy {
    pub firmware_url: String,
    /// A run still in flight after this long restarts the device.
    pub timeout_secs: u32,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            firmware_url:
                "https://charlies-farm-ota.s3.us-east-2.amazonaws.com/coop-snooper/coop-snooper.bin"
                    .into(),
            timeout_secs: 900,
        }
    }
}

/// Deployment-specific status label → indicator mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorAlias {
    pub label: String,
    pub state: IndicatorState,
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Identity ---
    /// Key used in outbound JSON messages (also the Wi-Fi hostname).
    pub device_name: String,
    /// Installation site reported in telemetry.
    pub location: String,

    // --- MQTT ---
    pub topics: TopicConfig,
    /// JSON field of a status report that carries the label.
    pub status_field: String,
    pub reconnect: ReconnectPolicy,

    // --- Update ---
    pub update: UpdatePolicy,

    // --- Indicator ---
    /// Checked before the built-in label vocabulary.
    pub indicator_aliases: Vec<IndicatorAlias>,

    // --- Timing ---
    /// Dispatch loop tick (milliseconds); drives the update deadline check.
    pub tick_interval_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            device_name: "coop-snooper".into(),
            location: "Farm House".into(),
            topics: TopicConfig::default(),
            status_field: "LED".into(),
            reconnect: ReconnectPolicy::default(),
            update: UpdatePolicy::default(),
            indicator_aliases: Vec::new(),
            tick_interval_ms: 1000,
        }
    }
}

impl SystemConfig {
    /// Parse a (possibly partial) JSON override on top of the defaults.
    pub fn from_json(json: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(json).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the dispatch logic cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() {
            return Err(ConfigError::ValidationFailed("device_name: empty"));
        }
        if self.status_field.is_empty() {
            return Err(ConfigError::ValidationFailed("status_field: empty"));
        }

        let inbound = self.topics.inbound();
        if inbound.iter().chain(self.topics.outbound().iter()).any(|t| t.is_empty()) {
            return Err(ConfigError::ValidationFailed("topics: empty topic"));
        }
        if inbound[0] == inbound[1] || inbound[0] == inbound[2] || inbound[1] == inbound[2] {
            return Err(ConfigError::ValidationFailed(
                "topics: inbound topics must be distinct",
            ));
        }

        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "reconnect.max_attempts: must be at least 1",
            ));
        }
        if self.reconnect.delay_ms == 0 {
            return Err(ConfigError::ValidationFailed("reconnect.delay_ms: must be > 0"));
        }

        if self.update.firmware_url.is_empty() {
            return Err(ConfigError::ValidationFailed("update.firmware_url: empty"));
        }
        if self.update.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed("update.timeout_secs: must be > 0"));
        }

        if self
            .indicator_aliases
            .iter()
            .any(|a| a.state.is_sticky())
        {
            return Err(ConfigError::ValidationFailed(
                "indicator_aliases: sticky state is reserved for updates",
            ));
        }

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms: must be > 0"));
        }
        Ok(())
    }
}
