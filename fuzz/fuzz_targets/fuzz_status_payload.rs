//! Fuzz target: status report routing and parsing
//!
//! The first byte picks the topic (one of the three inbound topics or an
//! arbitrary string), the rest is the payload.  Parsing must never panic,
//! and a resolved label must never produce the sticky indicator.
//!
//! cargo fuzz run fuzz_status_payload

#![no_main]

use coopsnooper::config::TopicConfig;
use coopsnooper::indicator::Vocabulary;
use coopsnooper::router::{Route, parse_status_label};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, payload)) = data.split_first() else {
        return;
    };
    let topics = TopicConfig::default();
    let topic = match selector % 4 {
        0 => topics.status.clone(),
        1 => topics.update_trigger.clone(),
        2 => topics.telemetry_request.clone(),
        _ => String::from_utf8_lossy(payload).into_owned(),
    };

    if Route::classify(&topic, &topics) != Route::Status {
        return;
    }
    if let Ok(label) = parse_status_label(payload, "LED") {
        if let Some(state) = Vocabulary::default().resolve(&label) {
            assert!(!state.is_sticky(), "status label resolved to sticky state");
        }
    }
});
