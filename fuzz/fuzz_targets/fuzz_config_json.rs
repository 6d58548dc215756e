//! Fuzz target: `SystemConfig::from_json`
//!
//! Any configuration the parser accepts must also pass validation and
//! build an orchestrator.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use coopsnooper::app::service::Orchestrator;
use coopsnooper::config::SystemConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(config) = SystemConfig::from_json(data) {
        assert_eq!(config.validate(), Ok(()));
        assert!(Orchestrator::new(config).is_ok());
    }
});
