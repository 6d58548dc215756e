//! Integration tests for the event → orchestrator → ports pipeline:
//! status reports, routing, connection lifecycle and transport errors.

use core::time::Duration;

use super::mock_device::{Call, MockDevice, RecordingSink};

use coopsnooper::app::events::{AppEvent, DropReason, RestartReason};
use coopsnooper::app::service::Orchestrator;
use coopsnooper::config::{IndicatorAlias, SystemConfig};
use coopsnooper::connection::{ConnectionState, ReconnectOutcome};
use coopsnooper::error::{ConfigError, PayloadError, TransportFault};
use coopsnooper::events::{Event, InboundMessage};
use coopsnooper::indicator::{Colour, IndicatorState};

fn booted(config: SystemConfig) -> (Orchestrator, MockDevice, RecordingSink) {
    let mut app = Orchestrator::new(config).unwrap();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    app.boot(&mut hw, &mut sink);
    hw.clear();
    sink.events.clear();
    (app, hw, sink)
}

fn make_app() -> (Orchestrator, MockDevice, RecordingSink) {
    booted(SystemConfig::default())
}

fn status(app: &mut Orchestrator, hw: &mut MockDevice, sink: &mut RecordingSink, payload: &str) {
    let topic = app.config().topics.status.clone();
    let msg = InboundMessage::new(&topic, payload.as_bytes()).unwrap();
    app.handle_event(Event::Data(msg), hw, sink);
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_shows_flashing_white() {
    let mut app = Orchestrator::new(SystemConfig::default()).unwrap();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    app.boot(&mut hw, &mut sink);

    assert_eq!(hw.shown(), vec![IndicatorState::Flashing(Colour::White)]);
    assert_eq!(app.indicator(), IndicatorState::BOOT);
    assert_eq!(app.connection_state(), ConnectionState::Disconnected);
    assert_eq!(sink.events, vec![AppEvent::Started(IndicatorState::BOOT)]);
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = SystemConfig::default();
    config.reconnect.max_attempts = 0;
    assert!(matches!(
        Orchestrator::new(config),
        Err(ConfigError::ValidationFailed(_))
    ));
}

// ── Status reports ────────────────────────────────────────────

#[test]
fn aliased_flashing_red_squawks_once_before_showing() {
    let mut config = SystemConfig::default();
    config.indicator_aliases.push(IndicatorAlias {
        label: "RED".into(),
        state: IndicatorState::Flashing(Colour::Red),
    });
    let (mut app, mut hw, mut sink) = booted(config);

    status(&mut app, &mut hw, &mut sink, r#"{"LED":"RED"}"#);

    assert_eq!(
        hw.calls,
        vec![
            Call::Playback(true),
            Call::Volume(1.0),
            Call::Gain(true),
            Call::Amplifier(true),
            Call::Show(IndicatorState::Flashing(Colour::Red)),
        ]
    );
    assert_eq!(sink.count(|e| matches!(e, AppEvent::AlertRaised(_))), 1);
    assert_eq!(app.indicator(), IndicatorState::Flashing(Colour::Red));
}

#[test]
fn solid_colour_is_shown_without_squawk() {
    let (mut app, mut hw, mut sink) = make_app();

    status(&mut app, &mut hw, &mut sink, r#"{"LED":"RED"}"#);

    assert_eq!(hw.squawks(), 0);
    assert_eq!(hw.shown(), vec![IndicatorState::Solid(Colour::Red)]);
    assert!(sink.events.contains(&AppEvent::IndicatorChanged {
        from: IndicatorState::BOOT,
        to: IndicatorState::Solid(Colour::Red),
    }));
}

#[test]
fn peer_labels_are_translated() {
    let (mut app, mut hw, mut sink) = make_app();

    status(&mut app, &mut hw, &mut sink, r#"{"LED":"SENSING_DOOR_SENSOR_ERROR"}"#);
    assert_eq!(app.indicator(), IndicatorState::Solid(Colour::Blue));

    status(&mut app, &mut hw, &mut sink, r#"{"LED":"SENSING_DOOR_CLOSED"}"#);
    assert_eq!(app.indicator(), IndicatorState::Solid(Colour::Green));
}

#[test]
fn flashing_green_never_squawks() {
    let (mut app, mut hw, mut sink) = make_app();
    status(&mut app, &mut hw, &mut sink, r#"{"LED":"FLASHING_GREEN"}"#);
    assert_eq!(hw.squawks(), 0);
    assert_eq!(app.indicator(), IndicatorState::Flashing(Colour::Green));
}

#[test]
fn non_string_field_changes_nothing() {
    let (mut app, mut hw, mut sink) = make_app();

    status(&mut app, &mut hw, &mut sink, r#"{"LED":42}"#);

    assert!(hw.calls.is_empty());
    assert_eq!(app.indicator(), IndicatorState::BOOT);
    assert_eq!(
        sink.events,
        vec![AppEvent::MessageDropped(DropReason::Payload(PayloadError::NotString))]
    );
}

#[test]
fn invalid_json_changes_nothing() {
    let (mut app, mut hw, mut sink) = make_app();

    status(&mut app, &mut hw, &mut sink, "LED=RED");

    assert!(hw.calls.is_empty());
    assert_eq!(
        sink.events,
        vec![AppEvent::MessageDropped(DropReason::Payload(PayloadError::InvalidJson))]
    );
}

#[test]
fn unknown_label_changes_nothing() {
    let (mut app, mut hw, mut sink) = make_app();

    status(&mut app, &mut hw, &mut sink, r#"{"LED":"PURPLE"}"#);

    assert!(hw.calls.is_empty());
    assert_eq!(
        sink.events,
        vec![AppEvent::MessageDropped(DropReason::UnknownLabel("PURPLE".into()))]
    );
}

#[test]
fn sticky_label_from_peer_is_ignored() {
    let (mut app, mut hw, mut sink) = make_app();

    status(&mut app, &mut hw, &mut sink, r#"{"LED":"STICKY_FLASHING_GREEN"}"#);

    assert!(hw.calls.is_empty());
    assert_eq!(app.indicator(), IndicatorState::BOOT);
}

// ── Routing ───────────────────────────────────────────────────

#[test]
fn unknown_topic_is_dropped() {
    let (mut app, mut hw, mut sink) = make_app();

    app.handle_message("coop-controller/status/extra", br#"{"LED":"RED"}"#, &mut hw, &mut sink);

    assert!(hw.calls.is_empty());
    assert_eq!(
        sink.events,
        vec![AppEvent::MessageDropped(DropReason::UnknownTopic(
            "coop-controller/status/extra".into()
        ))]
    );
}

#[test]
fn telemetry_request_publishes_report() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.uptime = 42;
    let request = app.config().topics.telemetry_request.clone();

    app.handle_message(&request, b"", &mut hw, &mut sink);

    let reports = hw.published_on(&app.config().topics.telemetry_report);
    assert_eq!(reports.len(), 1);
    let report: serde_json::Value = serde_json::from_str(&reports[0]).unwrap();
    assert_eq!(report["device"], "coop-snooper");
    assert_eq!(report["uptime_secs"], 42);
    assert_eq!(report["indicator"], "FLASHING_WHITE");
}

// ── Connection lifecycle ──────────────────────────────────────

#[test]
fn connect_subscribes_and_requests_status() {
    let (mut app, mut hw, mut sink) = make_app();
    let topics = app.config().topics.clone();

    app.handle_event(Event::Connected, &mut hw, &mut sink);

    assert_eq!(
        hw.subscriptions(),
        vec![
            topics.status.clone(),
            topics.update_trigger.clone(),
            topics.telemetry_request.clone()
        ]
    );
    assert_eq!(
        hw.published_on(&topics.status_announce),
        vec![r#"{"message":"status_request"}"#.to_string()]
    );
    assert_eq!(app.connection_state(), ConnectionState::Connected);
}

#[test]
fn boot_telemetry_is_sent_on_first_connect_only() {
    let (mut app, mut hw, mut sink) = make_app();
    let report_topic = app.config().topics.telemetry_report.clone();

    app.handle_event(Event::Connected, &mut hw, &mut sink);
    app.handle_event(Event::Disconnected, &mut hw, &mut sink);
    app.handle_event(Event::Connected, &mut hw, &mut sink);

    assert_eq!(hw.published_on(&report_topic).len(), 1);
    assert_eq!(hw.published_on(&app.config().topics.status_announce).len(), 2);
}

#[test]
fn reconnect_gives_up_after_five_attempts() {
    let (mut app, mut hw, mut sink) = make_app();
    app.handle_event(Event::Connected, &mut hw, &mut sink);
    hw.clear();
    hw.failing_reconnects = u32::MAX;

    app.handle_event(Event::Disconnected, &mut hw, &mut sink);

    assert_eq!(hw.reconnects(), 5);
    assert_eq!(hw.delays(), vec![Duration::from_secs(5); 5]);
    assert_eq!(hw.restarts(), 0);
    assert_eq!(
        sink.last(),
        Some(&AppEvent::Reconnect(ReconnectOutcome::Exhausted { attempts: 5 }))
    );
    assert_eq!(app.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn reconnect_stops_at_first_success() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.failing_reconnects = 2;

    app.handle_event(Event::Disconnected, &mut hw, &mut sink);

    assert_eq!(hw.reconnects(), 3);
    assert_eq!(hw.delays().len(), 2);
    assert_eq!(
        sink.last(),
        Some(&AppEvent::Reconnect(ReconnectOutcome::Reconnected { attempts: 3 }))
    );
}

#[test]
fn reconnect_is_skipped_while_link_is_down() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.link_active = false;

    app.handle_event(Event::Disconnected, &mut hw, &mut sink);

    assert_eq!(hw.reconnects(), 0);
    assert!(hw.delays().is_empty());
    assert_eq!(sink.last(), Some(&AppEvent::Reconnect(ReconnectOutcome::LinkDown)));
}

#[test]
fn every_disconnect_gets_a_fresh_budget() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.failing_reconnects = u32::MAX;

    app.handle_event(Event::Disconnected, &mut hw, &mut sink);
    app.handle_event(Event::Disconnected, &mut hw, &mut sink);

    assert_eq!(hw.reconnects(), 10);
}

// ── Transport errors ──────────────────────────────────────────

#[test]
fn transport_error_restarts_and_reboots_core() {
    let (mut app, mut hw, mut sink) = make_app();
    status(&mut app, &mut hw, &mut sink, r#"{"LED":"BLUE"}"#);
    app.handle_event(Event::Connected, &mut hw, &mut sink);
    sink.events.clear();

    let fault = TransportFault::Tls {
        esp_err: 0x8001,
        stack_err: 0x2700,
        cert_flags: 0x8,
    };
    app.handle_event(Event::TransportError(fault), &mut hw, &mut sink);

    assert_eq!(hw.restarts(), 1);
    assert_eq!(
        sink.events[0],
        AppEvent::RestartRequested(RestartReason::TransportFault(fault))
    );
    assert_eq!(app.indicator(), IndicatorState::BOOT);
    assert_eq!(app.connection_state(), ConnectionState::Disconnected);
}

#[test]
fn refused_connection_also_restarts() {
    let (mut app, mut hw, mut sink) = make_app();
    app.handle_event(
        Event::TransportError(TransportFault::ConnectionRefused { code: 5 }),
        &mut hw,
        &mut sink,
    );
    assert_eq!(hw.restarts(), 1);
}
