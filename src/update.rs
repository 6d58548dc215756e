//! Single-flight firmware update guard.
//!
//! At most one update task may run at a time.  The slot that records the
//! running task is shared between the dispatch context (admission,
//! termination, deadline checks) and the update task itself (completion),
//! so it lives behind one blocking mutex.
//!
//! ```text
//!            claim (locked)              complete(gen) (locked)
//!   Idle ───────────────────▶ Running ─────────────────────────▶ Completed
//!    ▲ ▲  ◀──── release ─────┘   │                                   │
//!    │ │                terminate│                                   │
//!    │ │                         ▼                                   │
//!    │ └─ complete(gen) ── Terminating                               │
//!    └──────────────────────────── claim ◀───────────────────────────┘
//! ```
//!
//! Cancellation is cooperative, so a terminated task may still be
//! writing flash.  The slot stays in `Terminating` (not admissible)
//! until that run's token signals or drops.
//!
//! Every claim bumps a generation counter.  The [`UpdateCompletion`]
//! token carries the generation it was issued for, so a task that
//! finishes after a reset can never release a newer run.

use core::cell::RefCell;
use core::fmt;
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

use crate::app::ports::{IndicatorPort, TaskHandle, TaskState, UpdatePort};
use crate::error::UpdateError;
use crate::indicator::IndicatorState;
use crate::indicator::arbiter::IndicatorArbiter;

// ───────────────────────────────────────────────────────────────
// Slot
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    Idle,
    Running,
    /// Cancel requested; the task has not yet signalled.
    Terminating,
    Completed,
}

impl UpdateStatus {
    /// Whether a new update may be admitted.
    pub const fn is_admissible(self) -> bool {
        matches!(self, Self::Idle | Self::Completed)
    }

    /// Whether a task may still be running.
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Running | Self::Terminating)
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Terminating => f.write_str("terminating"),
            Self::Completed => f.write_str("completed"),
        }
    }
}

/// How an update task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Image written and marked bootable.
    Succeeded,
    Failed(UpdateError),
    /// Stopped by [`UpdatePort::terminate`].
    Cancelled,
    /// The task dropped its completion token without signalling.
    Abandoned,
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(e) => write!(f, "failed: {e}"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Abandoned => f.write_str("abandoned"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSlot {
    pub status: UpdateStatus,
    pub handle: Option<TaskHandle>,
    pub generation: u32,
    /// Uptime at which the current/last run was admitted.
    pub started_secs: u64,
    pub last_outcome: Option<UpdateOutcome>,
    /// Set once the dispatch loop has acted on `last_outcome`.
    pub outcome_handled: bool,
}

impl UpdateSlot {
    const fn new() -> Self {
        Self {
            status: UpdateStatus::Idle,
            handle: None,
            generation: 0,
            started_secs: 0,
            last_outcome: None,
            outcome_handled: false,
        }
    }
}

type SharedSlot = Mutex<CriticalSectionRawMutex, RefCell<UpdateSlot>>;

// ───────────────────────────────────────────────────────────────
// Task-side types
// ───────────────────────────────────────────────────────────────

/// Parameters handed to the update task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateContext {
    pub firmware_url: String,
    pub timeout_secs: u32,
}

/// Completion signal owned by the update task.
///
/// Consumed by [`complete`](Self::complete).  Dropping it unsignalled
/// (early return, panic unwinding) records [`UpdateOutcome::Abandoned`].
pub struct UpdateCompletion {
    slot: Arc<SharedSlot>,
    generation: u32,
    signalled: bool,
}

impl UpdateCompletion {
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Mark the run finished.  Returns `false` if the run was already
    /// superseded (terminated, or a newer run was admitted).  A
    /// terminated run still frees the slot.
    pub fn complete(mut self, outcome: UpdateOutcome) -> bool {
        self.signalled = true;
        mark_completed(&self.slot, self.generation, outcome)
    }
}

impl fmt::Debug for UpdateCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateCompletion")
            .field("generation", &self.generation)
            .field("signalled", &self.signalled)
            .finish()
    }
}

impl Drop for UpdateCompletion {
    fn drop(&mut self) {
        if !self.signalled {
            warn!("Update: run {} ended without signalling", self.generation);
            mark_completed(&self.slot, self.generation, UpdateOutcome::Abandoned);
        }
    }
}

fn mark_completed(slot: &SharedSlot, generation: u32, outcome: UpdateOutcome) -> bool {
    slot.lock(|cell| {
        let mut s = cell.borrow_mut();
        if s.generation != generation {
            return false;
        }
        match s.status {
            UpdateStatus::Running => {
                s.status = UpdateStatus::Completed;
                s.last_outcome = Some(outcome);
                s.outcome_handled = false;
                true
            }
            UpdateStatus::Terminating => {
                s.status = UpdateStatus::Idle;
                s.handle = None;
                false
            }
            UpdateStatus::Idle | UpdateStatus::Completed => false,
        }
    })
}

// ───────────────────────────────────────────────────────────────
// Guard
// ───────────────────────────────────────────────────────────────

/// Result of [`UpdateGuard::try_start_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(TaskHandle),
    /// A run is in flight; nothing was changed.
    AlreadyRunning {
        handle: Option<TaskHandle>,
        state: TaskState,
    },
}

#[derive(Debug)]
pub struct UpdateGuard {
    slot: Arc<SharedSlot>,
}

impl Default for UpdateGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateGuard {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(RefCell::new(UpdateSlot::new()))),
        }
    }

    pub fn snapshot(&self) -> UpdateSlot {
        self.slot.lock(|cell| *cell.borrow())
    }

    pub fn status(&self) -> UpdateStatus {
        self.snapshot().status
    }

    /// Admit a new update if none is running.
    ///
    /// On admission the indicator is forced sticky *before* the task is
    /// spawned.  If the spawn fails the claim is released and the previous
    /// indicator restored.
    pub fn try_start_update(
        &self,
        context: UpdateContext,
        now_secs: u64,
        indicator: &mut IndicatorArbiter,
        ports: &mut (impl UpdatePort + IndicatorPort),
    ) -> Result<StartOutcome, UpdateError> {
        let generation = match self.claim(now_secs) {
            Ok(generation) => generation,
            Err(handle) => {
                let state = handle.map_or(TaskState::Unknown, |h| ports.state_of(h));
                warn!("Update: already running ({:?}, state={})", handle, state);
                return Ok(StartOutcome::AlreadyRunning { handle, state });
            }
        };

        let previous = indicator.force(IndicatorState::StickyFlashingGreen, ports);
        let completion = UpdateCompletion {
            slot: Arc::clone(&self.slot),
            generation,
            signalled: false,
        };

        match ports.spawn_update_task(context, completion) {
            Ok(handle) => {
                self.attach(generation, handle);
                info!("Update: run {} started as {}", generation, handle);
                Ok(StartOutcome::Started(handle))
            }
            Err(e) => {
                self.release(generation);
                indicator.force(previous, ports);
                warn!("Update: spawn failed ({}), indicator restored to {}", e, previous);
                Err(e)
            }
        }
    }

    /// Request cancellation of the running task (if any).
    ///
    /// The slot moves to `Terminating` and only returns to `Idle` when
    /// the cancelled run's token signals or drops.
    pub fn terminate(&self, ports: &mut impl UpdatePort) -> Option<TaskHandle> {
        let handle = self.slot.lock(|cell| {
            let mut s = cell.borrow_mut();
            if s.status != UpdateStatus::Running {
                return None;
            }
            s.status = UpdateStatus::Terminating;
            s.last_outcome = Some(UpdateOutcome::Cancelled);
            s.outcome_handled = true;
            Some(s.handle)
        })?;

        if let Some(h) = handle {
            ports.terminate(h);
            info!("Update: terminated {}", h);
        }
        handle
    }

    /// The live task if it was admitted at least `timeout_secs` ago.
    /// Covers a cancelled run that never signals, too.
    pub fn overdue(&self, now_secs: u64, timeout_secs: u32) -> Option<TaskHandle> {
        let s = self.snapshot();
        let expired = now_secs.saturating_sub(s.started_secs) >= u64::from(timeout_secs);
        (s.status.is_live() && expired).then_some(s.handle).flatten()
    }

    /// Claim the outcome of the finished run for handling.
    ///
    /// Returns it once per run: the `UpdateFinished` event and the tick
    /// fallback race for it, and only the first one acts.
    pub fn take_outcome(&self, handle: Option<TaskHandle>) -> Option<(TaskHandle, UpdateOutcome)> {
        self.slot.lock(|cell| {
            let mut s = cell.borrow_mut();
            if s.status != UpdateStatus::Completed || s.outcome_handled {
                return None;
            }
            let current = s.handle?;
            if handle.is_some_and(|h| h != current) {
                return None;
            }
            let outcome = s.last_outcome?;
            s.outcome_handled = true;
            Some((current, outcome))
        })
    }

    /// Forget any run.  Outstanding tokens become stale.
    pub fn reset(&self) {
        self.slot.lock(|cell| {
            let mut s = cell.borrow_mut();
            s.status = UpdateStatus::Idle;
            s.handle = None;
            s.generation = s.generation.wrapping_add(1);
        });
    }

    // ── Locked transitions ────────────────────────────────────

    /// Idle/Completed → Running in one locked step.  `Err` carries the
    /// handle of the run that blocked the claim.
    fn claim(&self, now_secs: u64) -> Result<u32, Option<TaskHandle>> {
        self.slot.lock(|cell| {
            let mut s = cell.borrow_mut();
            if !s.status.is_admissible() {
                return Err(s.handle);
            }
            s.generation = s.generation.wrapping_add(1);
            s.status = UpdateStatus::Running;
            s.handle = None;
            s.started_secs = now_secs;
            s.last_outcome = None;
            s.outcome_handled = false;
            Ok(s.generation)
        })
    }

    fn attach(&self, generation: u32, handle: TaskHandle) {
        self.slot.lock(|cell| {
            let mut s = cell.borrow_mut();
            if s.generation == generation {
                s.handle = Some(handle);
            }
        });
    }

    fn release(&self, generation: u32) {
        self.slot.lock(|cell| {
            let mut s = cell.borrow_mut();
            if s.generation == generation {
                s.status = UpdateStatus::Idle;
                s.handle = None;
                s.last_outcome = Some(UpdateOutcome::Failed(UpdateError::SpawnFailed));
                s.outcome_handled = true;
            }
        });
    }
}
