//! Indicator arbitration: sticky override and alert decision.
//!
//! The arbiter is the single writer of the indicator state.  It lives in
//! the dispatch context, so the sticky check and the commit cannot be
//! interleaved with another writer.
//!
//! ```text
//!   requested ──▶ sticky? ──yes──▶ Suppressed
//!                   │no
//!                   ▼
//!            alert_fires(prev, req) ──yes──▶ AudioPort (before show)
//!                   │
//!                   ▼
//!            IndicatorPort::show(req) ──▶ Committed
//! ```

use log::{info, warn};

use crate::app::ports::{AudioPort, IndicatorPort};

use super::IndicatorState;

/// Result of [`IndicatorArbiter::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The new state was committed.
    Committed {
        previous: IndicatorState,
        alert: bool,
    },
    /// The indicator is sticky; the request was ignored.
    Suppressed,
    /// The sticky state may only be entered through [`IndicatorArbiter::force`].
    Rejected,
}

/// Pure alert decision.
///
/// Fires only when the indicator was not sticky and the request is a
/// flashing alarm colour.
pub fn alert_fires(previous: IndicatorState, requested: IndicatorState) -> bool {
    if previous.is_sticky() {
        return false;
    }
    matches!(requested, IndicatorState::Flashing(c) if c.is_alarm())
}

/// Sound the squawk: playback on, full volume, gain on, amplifier on.
pub fn squawk(audio: &mut impl AudioPort) {
    audio.set_playback(true);
    audio.set_volume(1.0);
    audio.set_gain(true);
    audio.enable_amplifier(true);
}

/// Owner of the current [`IndicatorState`].
#[derive(Debug)]
pub struct IndicatorArbiter {
    current: IndicatorState,
}

impl Default for IndicatorArbiter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorArbiter {
    pub fn new() -> Self {
        Self {
            current: IndicatorState::BOOT,
        }
    }

    pub fn current(&self) -> IndicatorState {
        self.current
    }

    /// Apply a state derived from a status report.
    pub fn apply(
        &mut self,
        requested: IndicatorState,
        ports: &mut (impl IndicatorPort + AudioPort),
    ) -> ApplyOutcome {
        if self.current.is_sticky() {
            info!("Indicator: sticky, ignoring {}", requested);
            return ApplyOutcome::Suppressed;
        }
        if requested.is_sticky() {
            warn!("Indicator: sticky state requested by status report, rejected");
            return ApplyOutcome::Rejected;
        }

        let previous = self.current;
        let alert = alert_fires(previous, requested);
        if alert {
            info!("Indicator: {} raises alert", requested);
            squawk(ports);
        }
        ports.show(requested);
        self.current = requested;

        ApplyOutcome::Committed { previous, alert }
    }

    /// Set the state unconditionally, without alert evaluation.
    /// Returns the previous state.
    pub fn force(&mut self, state: IndicatorState, ports: &mut impl IndicatorPort) -> IndicatorState {
        let previous = self.current;
        ports.show(state);
        self.current = state;
        previous
    }
}
