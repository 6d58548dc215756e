//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the orchestrator
//! against the recording mock device.  All tests run on the host with no
//! real hardware required.

mod mock_device;
mod orchestrator_tests;
mod update_flow_tests;
