//! Mock device for integration tests.
//!
//! Implements every port the orchestrator drives and records each call,
//! so tests can assert on the full command history (including ordering
//! between the squawk and the indicator update) without hardware.

use core::time::Duration;

use coopsnooper::app::events::AppEvent;
use coopsnooper::app::ports::{
    AudioPort, EventSink, IndicatorPort, Qos, SystemPort, TaskHandle, TaskState, TransportPort,
    UpdatePort,
};
use coopsnooper::error::{TransportError, UpdateError};
use coopsnooper::indicator::IndicatorState;
use coopsnooper::update::{UpdateCompletion, UpdateContext};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Publish { topic: String, payload: String },
    Subscribe(String),
    Reconnect,
    Delay(Duration),
    Show(IndicatorState),
    Playback(bool),
    Volume(f32),
    Gain(bool),
    Amplifier(bool),
    SpawnUpdate(String),
    Terminate(TaskHandle),
    Restart,
}

// ── MockDevice ────────────────────────────────────────────────

pub struct MockDevice {
    pub calls: Vec<Call>,
    pub link_active: bool,
    /// Reconnect attempts that fail before one succeeds.
    pub failing_reconnects: u32,
    pub spawn_fails: bool,
    pub uptime: u64,
    /// Completion tokens of spawned runs, newest last.
    pub completions: Vec<(TaskHandle, UpdateCompletion)>,
    /// Handles the runner reports as completed.
    pub finished: Vec<TaskHandle>,
    next_handle: u32,
}

#[allow(dead_code)]
impl MockDevice {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            link_active: true,
            failing_reconnects: 0,
            spawn_fails: false,
            uptime: 0,
            completions: Vec::new(),
            finished: Vec::new(),
            next_handle: 0,
        }
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn reconnects(&self) -> usize {
        self.count(|c| matches!(c, Call::Reconnect))
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Delay(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    pub fn restarts(&self) -> usize {
        self.count(|c| matches!(c, Call::Restart))
    }

    pub fn shown(&self) -> Vec<IndicatorState> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Show(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn squawks(&self) -> usize {
        self.count(|c| matches!(c, Call::Amplifier(true)))
    }

    pub fn published_on(&self, topic: &str) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Publish { topic: t, payload } if t == topic => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Subscribe(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    /// Take the completion token of the given run.
    pub fn take_completion(&mut self, handle: TaskHandle) -> UpdateCompletion {
        let idx = self
            .completions
            .iter()
            .position(|(h, _)| *h == handle)
            .expect("no completion for handle");
        self.completions.remove(idx).1
    }
}

impl TransportPort for MockDevice {
    fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        _qos: Qos,
        _retain: bool,
    ) -> Result<(), TransportError> {
        self.calls.push(Call::Publish {
            topic: topic.into(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });
        Ok(())
    }

    fn subscribe(&mut self, topic: &str, _qos: Qos) -> Result<(), TransportError> {
        self.calls.push(Call::Subscribe(topic.into()));
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.calls.push(Call::Reconnect);
        if self.failing_reconnects > 0 {
            self.failing_reconnects -= 1;
            return Err(TransportError::ReconnectFailed(-1));
        }
        Ok(())
    }

    fn is_link_active(&self) -> bool {
        self.link_active
    }
}

impl UpdatePort for MockDevice {
    fn spawn_update_task(
        &mut self,
        context: UpdateContext,
        completion: UpdateCompletion,
    ) -> Result<TaskHandle, UpdateError> {
        self.calls.push(Call::SpawnUpdate(context.firmware_url));
        if self.spawn_fails {
            return Err(UpdateError::SpawnFailed);
        }
        self.next_handle += 1;
        let handle = TaskHandle(self.next_handle);
        self.completions.push((handle, completion));
        Ok(handle)
    }

    fn state_of(&self, handle: TaskHandle) -> TaskState {
        if self.finished.contains(&handle) {
            TaskState::Completed
        } else if handle.0 >= 1 && handle.0 <= self.next_handle {
            TaskState::Running
        } else {
            TaskState::Unknown
        }
    }

    fn terminate(&mut self, handle: TaskHandle) {
        self.calls.push(Call::Terminate(handle));
    }
}

impl IndicatorPort for MockDevice {
    fn show(&mut self, state: IndicatorState) {
        self.calls.push(Call::Show(state));
    }
}

impl AudioPort for MockDevice {
    fn set_playback(&mut self, enabled: bool) {
        self.calls.push(Call::Playback(enabled));
    }

    fn set_volume(&mut self, level: f32) {
        self.calls.push(Call::Volume(level));
    }

    fn set_gain(&mut self, enabled: bool) {
        self.calls.push(Call::Gain(enabled));
    }

    fn enable_amplifier(&mut self, enabled: bool) {
        self.calls.push(Call::Amplifier(enabled));
    }
}

impl SystemPort for MockDevice {
    fn restart_device(&mut self) {
        self.calls.push(Call::Restart);
    }

    fn delay(&mut self, duration: Duration) {
        self.calls.push(Call::Delay(duration));
    }

    fn uptime_secs(&self) -> u64 {
        self.uptime
    }

    fn free_heap_bytes(&self) -> u32 {
        128 * 1024
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn last(&self) -> Option<&AppEvent> {
        self.events.last()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
