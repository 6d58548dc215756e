//! Integration tests for the firmware update flow: single-flight
//! admission, the sticky indicator, termination on disconnect, the
//! deadline and the outcome handling.

use super::mock_device::{Call, MockDevice, RecordingSink};

use coopsnooper::app::events::{AppEvent, RestartReason};
use coopsnooper::app::ports::{TaskHandle, TaskState};
use coopsnooper::app::service::Orchestrator;
use coopsnooper::config::SystemConfig;
use coopsnooper::error::UpdateError;
use coopsnooper::events::Event;
use coopsnooper::indicator::{Colour, IndicatorState};
use coopsnooper::update::{UpdateOutcome, UpdateStatus};

fn make_app() -> (Orchestrator, MockDevice, RecordingSink) {
    let mut app = Orchestrator::new(SystemConfig::default()).unwrap();
    let mut hw = MockDevice::new();
    let mut sink = RecordingSink::new();
    app.boot(&mut hw, &mut sink);
    app.handle_event(Event::Connected, &mut hw, &mut sink);
    hw.clear();
    sink.events.clear();
    (app, hw, sink)
}

fn trigger(app: &mut Orchestrator, hw: &mut MockDevice, sink: &mut RecordingSink) {
    let topic = app.config().topics.update_trigger.clone();
    app.handle_message(&topic, b"", hw, sink);
}

fn start(app: &mut Orchestrator, hw: &mut MockDevice, sink: &mut RecordingSink) -> TaskHandle {
    trigger(app, hw, sink);
    match sink.last() {
        Some(AppEvent::UpdateStarted(handle)) => *handle,
        other => panic!("update not started: {:?}", other),
    }
}

fn progress(app: &Orchestrator, hw: &MockDevice) -> Vec<String> {
    hw.published_on(&app.config().topics.update_progress)
}

// ── Admission ─────────────────────────────────────────────────

#[test]
fn trigger_starts_update_with_sticky_indicator() {
    let (mut app, mut hw, mut sink) = make_app();

    let handle = start(&mut app, &mut hw, &mut sink);

    assert_eq!(app.update_status(), UpdateStatus::Running);
    assert_eq!(app.update_slot().handle, Some(handle));
    assert_eq!(app.indicator(), IndicatorState::StickyFlashingGreen);

    // Sticky indicator is shown before the task is spawned.
    let show = hw
        .calls
        .iter()
        .position(|c| *c == Call::Show(IndicatorState::StickyFlashingGreen))
        .unwrap();
    let spawn = hw
        .calls
        .iter()
        .position(|c| matches!(c, Call::SpawnUpdate(_)))
        .unwrap();
    assert!(show < spawn);

    assert_eq!(
        progress(&app, &hw),
        vec![r#"{"coop-snooper":"OTA update requested"}"#.to_string()]
    );
}

#[test]
fn second_trigger_is_rejected_while_running() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);
    hw.clear();

    trigger(&mut app, &mut hw, &mut sink);

    assert_eq!(hw.count(|c| matches!(c, Call::SpawnUpdate(_))), 0);
    assert_eq!(
        sink.last(),
        Some(&AppEvent::UpdateRejected {
            handle: Some(handle),
            state: TaskState::Running,
        })
    );
    let messages = progress(&app, &hw);
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[1],
        r#"{"coop-snooper":"OTA task is already running or not yet cleaned up, skipping OTA update. task_state=running"}"#
    );
    assert_eq!(app.update_slot().handle, Some(handle));
}

#[test]
fn completed_run_admits_a_new_one() {
    let (mut app, mut hw, mut sink) = make_app();
    let first = start(&mut app, &mut hw, &mut sink);
    hw.take_completion(first).complete(UpdateOutcome::Cancelled);
    hw.finished.push(first);
    assert_eq!(app.update_status(), UpdateStatus::Completed);

    let second = start(&mut app, &mut hw, &mut sink);
    assert_ne!(first, second);
    assert_eq!(app.update_status(), UpdateStatus::Running);
}

#[test]
fn spawn_failure_restores_indicator_and_releases_slot() {
    let (mut app, mut hw, mut sink) = make_app();
    let status = app.config().topics.status.clone();
    app.handle_message(&status, br#"{"LED":"YELLOW"}"#, &mut hw, &mut sink);
    hw.spawn_fails = true;

    trigger(&mut app, &mut hw, &mut sink);

    assert_eq!(
        sink.last(),
        Some(&AppEvent::UpdateSpawnFailed(UpdateError::SpawnFailed))
    );
    assert_eq!(app.update_status(), UpdateStatus::Idle);
    assert_eq!(app.indicator(), IndicatorState::Solid(Colour::Yellow));
    assert_eq!(
        hw.shown().last(),
        Some(&IndicatorState::Solid(Colour::Yellow))
    );

    hw.spawn_fails = false;
    start(&mut app, &mut hw, &mut sink);
}

// ── Sticky indicator ──────────────────────────────────────────

#[test]
fn status_reports_are_suppressed_during_update() {
    let (mut app, mut hw, mut sink) = make_app();
    start(&mut app, &mut hw, &mut sink);
    hw.clear();

    let status = app.config().topics.status.clone();
    app.handle_message(&status, br#"{"LED":"FLASHING_RED"}"#, &mut hw, &mut sink);

    assert!(hw.calls.is_empty());
    assert_eq!(
        sink.last(),
        Some(&AppEvent::IndicatorSuppressed(IndicatorState::Flashing(Colour::Red)))
    );
    assert_eq!(app.indicator(), IndicatorState::StickyFlashingGreen);
}

// ── Outcomes ──────────────────────────────────────────────────

#[test]
fn successful_run_restarts_into_new_image() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);

    assert!(hw.take_completion(handle).complete(UpdateOutcome::Succeeded));
    app.handle_event(
        Event::UpdateFinished {
            handle,
            outcome: UpdateOutcome::Succeeded,
        },
        &mut hw,
        &mut sink,
    );

    assert_eq!(hw.restarts(), 1);
    assert!(sink
        .events
        .contains(&AppEvent::RestartRequested(RestartReason::UpdateApplied)));
    // Back through boot: sticky cleared, slot idle.
    assert_eq!(app.indicator(), IndicatorState::BOOT);
    assert_eq!(app.update_status(), UpdateStatus::Idle);
}

#[test]
fn failed_run_restarts() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);
    let outcome = UpdateOutcome::Failed(UpdateError::DownloadFailed(404));

    hw.take_completion(handle).complete(outcome);
    app.handle_event(Event::UpdateFinished { handle, outcome }, &mut hw, &mut sink);

    assert_eq!(hw.restarts(), 1);
    assert!(sink
        .events
        .contains(&AppEvent::RestartRequested(RestartReason::UpdateFailed)));
}

#[test]
fn dropped_completion_restarts_on_next_tick() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);

    // The task died without queueing a finish event.
    drop(hw.take_completion(handle));

    let slot = app.update_slot();
    assert_eq!(slot.status, UpdateStatus::Completed);
    assert_eq!(slot.last_outcome, Some(UpdateOutcome::Abandoned));

    app.handle_event(Event::Tick { uptime_secs: 1 }, &mut hw, &mut sink);

    assert_eq!(hw.restarts(), 1);
    assert!(sink
        .events
        .contains(&AppEvent::RestartRequested(RestartReason::UpdateFailed)));
    assert_eq!(app.indicator(), IndicatorState::BOOT);
}

#[test]
fn lost_success_event_still_boots_new_image() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);
    hw.take_completion(handle).complete(UpdateOutcome::Succeeded);

    app.handle_event(Event::Tick { uptime_secs: 1 }, &mut hw, &mut sink);

    assert_eq!(hw.restarts(), 1);
    assert!(sink
        .events
        .contains(&AppEvent::RestartRequested(RestartReason::UpdateApplied)));
}

#[test]
fn finish_event_and_tick_act_only_once() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);
    let outcome = UpdateOutcome::Cancelled;
    hw.take_completion(handle).complete(outcome);

    app.handle_event(Event::UpdateFinished { handle, outcome }, &mut hw, &mut sink);
    hw.clear();
    app.handle_event(Event::Tick { uptime_secs: 1 }, &mut hw, &mut sink);

    assert_eq!(hw.restarts(), 0);
    assert!(hw.calls.is_empty());
}

// ── Termination ───────────────────────────────────────────────

#[test]
fn disconnect_terminates_running_update() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);

    app.handle_event(Event::Disconnected, &mut hw, &mut sink);

    assert!(hw.calls.contains(&Call::Terminate(handle)));
    // Not admissible until the cancelled task signals.
    assert_eq!(app.update_status(), UpdateStatus::Terminating);
    assert_eq!(app.update_slot().handle, Some(handle));
    // The indicator stays sticky until the device restarts.
    assert_eq!(app.indicator(), IndicatorState::StickyFlashingGreen);
}

#[test]
fn trigger_is_rejected_until_terminated_run_signals() {
    let (mut app, mut hw, mut sink) = make_app();
    let first = start(&mut app, &mut hw, &mut sink);
    let cancelled = hw.take_completion(first);
    app.handle_event(Event::Disconnected, &mut hw, &mut sink);
    app.handle_event(Event::Connected, &mut hw, &mut sink);
    hw.clear();

    trigger(&mut app, &mut hw, &mut sink);
    assert_eq!(hw.count(|c| matches!(c, Call::SpawnUpdate(_))), 0);
    assert_eq!(
        sink.last(),
        Some(&AppEvent::UpdateRejected {
            handle: Some(first),
            state: TaskState::Running,
        })
    );

    assert!(!cancelled.complete(UpdateOutcome::Succeeded));
    assert_eq!(app.update_status(), UpdateStatus::Idle);
    app.handle_event(
        Event::UpdateFinished {
            handle: first,
            outcome: UpdateOutcome::Succeeded,
        },
        &mut hw,
        &mut sink,
    );
    assert_eq!(hw.restarts(), 0);

    let second = start(&mut app, &mut hw, &mut sink);
    assert_ne!(first, second);
    assert_eq!(app.update_status(), UpdateStatus::Running);
    assert_eq!(app.update_slot().handle, Some(second));
}

#[test]
fn terminated_run_that_never_signals_hits_the_deadline() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);
    app.handle_event(Event::Disconnected, &mut hw, &mut sink);
    let timeout = u64::from(app.config().update.timeout_secs);

    app.handle_event(Event::Tick { uptime_secs: timeout }, &mut hw, &mut sink);

    assert!(sink.events.contains(&AppEvent::UpdateTimedOut(handle)));
    assert_eq!(hw.restarts(), 1);
    assert_eq!(app.update_status(), UpdateStatus::Idle);
}

#[test]
fn cancelled_outcome_does_not_restart() {
    let (mut app, mut hw, mut sink) = make_app();
    let handle = start(&mut app, &mut hw, &mut sink);
    app.handle_event(Event::Disconnected, &mut hw, &mut sink);
    hw.take_completion(handle).complete(UpdateOutcome::Cancelled);

    app.handle_event(
        Event::UpdateFinished {
            handle,
            outcome: UpdateOutcome::Cancelled,
        },
        &mut hw,
        &mut sink,
    );
    app.handle_event(Event::Tick { uptime_secs: 1 }, &mut hw, &mut sink);
    assert_eq!(hw.restarts(), 0);
    assert_eq!(app.update_status(), UpdateStatus::Idle);
}

// ── Deadline ──────────────────────────────────────────────────

#[test]
fn overdue_update_is_terminated_and_restarts() {
    let (mut app, mut hw, mut sink) = make_app();
    hw.uptime = 100;
    let handle = start(&mut app, &mut hw, &mut sink);
    let timeout = u64::from(app.config().update.timeout_secs);

    app.handle_event(Event::Tick { uptime_secs: 100 + timeout - 1 }, &mut hw, &mut sink);
    assert_eq!(hw.restarts(), 0);

    app.handle_event(Event::Tick { uptime_secs: 100 + timeout }, &mut hw, &mut sink);

    assert!(sink.events.contains(&AppEvent::UpdateTimedOut(handle)));
    assert!(hw.calls.contains(&Call::Terminate(handle)));
    assert_eq!(hw.restarts(), 1);
    assert!(sink
        .events
        .contains(&AppEvent::RestartRequested(RestartReason::UpdateTimeout)));
    assert_eq!(app.update_status(), UpdateStatus::Idle);
}

#[test]
fn tick_without_update_does_nothing() {
    let (mut app, mut hw, mut sink) = make_app();
    app.handle_event(Event::Tick { uptime_secs: 1_000_000 }, &mut hw, &mut sink);
    assert!(hw.calls.is_empty());
    assert!(sink.events.is_empty());
}
