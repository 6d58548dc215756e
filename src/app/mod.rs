//! Application core: pure domain logic, zero I/O.
//!
//! This module contains the dispatch rules for the Coop Snooper:
//! connection lifecycle handling, status-driven indicator changes and
//! firmware update admission.  All interaction with the MQTT client, the
//! LED, the speaker and the update task happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! peripherals.

pub mod events;
pub mod ports;
pub mod service;
