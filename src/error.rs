//! Unified error types for the Coop Snooper firmware.
//!
//! Each concern (transport, payload parsing, firmware update, config) owns
//! a small typed enum; every one of them converts into the firmware-wide
//! [`Error`] so the dispatch loop can log failures uniformly.  None of
//! these errors is fatal on its own: the only path to a device restart is
//! a [`TransportFault`] reported by the MQTT client.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A publish, subscribe or reconnect call failed.
    Transport(TransportError),
    /// An inbound payload could not be interpreted.
    Payload(PayloadError),
    /// The firmware update task could not be started or failed.
    Update(UpdateError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Payload(e) => write!(f, "payload: {e}"),
            Self::Update(e) => write!(f, "update: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors (recoverable, reported by the MQTT client API)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No client session exists (never started or torn down).
    NotStarted,
    /// The client refused to queue the publish.
    PublishFailed(i32),
    /// The client refused the subscription request.
    SubscribeFailed(i32),
    /// The reconnect request was rejected.
    ReconnectFailed(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "client not started"),
            Self::PublishFailed(rc) => write!(f, "publish failed (rc={rc})"),
            Self::SubscribeFailed(rc) => write!(f, "subscribe failed (rc={rc})"),
            Self::ReconnectFailed(rc) => write!(f, "reconnect failed (rc={rc})"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Transport faults (unrecoverable, always followed by a restart)
// ---------------------------------------------------------------------------

/// Error report delivered by the MQTT client's event callback.
///
/// Unlike [`TransportError`] these are never retried locally: the
/// orchestrator logs the detail and restarts the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFault {
    /// TLS layer failure with the three diagnostic codes the stack reports.
    Tls {
        esp_err: i32,
        stack_err: i32,
        cert_flags: i32,
    },
    /// The broker refused the connection with the given return code.
    ConnectionRefused { code: i32 },
    /// Any other error type, carried as the raw discriminant.
    Unknown { code: i32 },
}

impl fmt::Display for TransportFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tls {
                esp_err,
                stack_err,
                cert_flags,
            } => write!(
                f,
                "TLS failure (esp_err=0x{esp_err:x}, stack_err=0x{stack_err:x}, cert_flags=0x{cert_flags:x})"
            ),
            Self::ConnectionRefused { code } => write!(f, "connection refused (rc=0x{code:x})"),
            Self::Unknown { code } => write!(f, "unknown error type 0x{code:x}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Payload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload is not valid JSON (or not a JSON object).
    InvalidJson,
    /// The status field is absent.
    MissingField,
    /// The status field is present but is not a string.
    NotString,
    /// Topic or payload exceeds the fixed inbound buffer.
    TooLarge { len: usize, max: usize },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson => write!(f, "invalid JSON"),
            Self::MissingField => write!(f, "missing status field"),
            Self::NotString => write!(f, "status field is not a string"),
            Self::TooLarge { len, max } => write!(f, "{len} bytes exceeds {max} byte limit"),
        }
    }
}

impl From<PayloadError> for Error {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

// ---------------------------------------------------------------------------
// Update errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// The update task could not be created.
    SpawnFailed,
    /// The HTTP download failed or returned a bad status.
    DownloadFailed(u16),
    /// Writing the image to the OTA partition failed.
    WriteFailed,
    /// The image did not verify or could not be made bootable.
    VerifyFailed,
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailed => write!(f, "update task spawn failed"),
            Self::DownloadFailed(0) => write!(f, "download failed"),
            Self::DownloadFailed(status) => write!(f, "download failed (HTTP {status})"),
            Self::WriteFailed => write!(f, "flash write failed"),
            Self::VerifyFailed => write!(f, "image verification failed"),
        }
    }
}

impl From<UpdateError> for Error {
    fn from(e: UpdateError) -> Self {
        Self::Update(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored or supplied config failed deserialization.
    Corrupted,
    /// A config field failed validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
