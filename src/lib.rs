//! Coop Snooper firmware library.
//!
//! Exposes the orchestration core and its adapters for integration
//! testing.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; on other targets
//! the adapters fall back to simulation stubs.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod indicator;
pub mod output;
pub mod router;
pub mod telemetry;
pub mod update;

pub mod adapters;
pub mod drivers;
pub mod pins;
