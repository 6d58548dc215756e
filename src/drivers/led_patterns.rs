//! LED pattern engine.
//!
//! Renders the current [`IndicatorState`] into time-varying RGB values.
//! The indicator-output task calls `tick()` every pattern step and feeds
//! the result into `StatusLed::set_colour()`.
//!
//! ## Pattern types
//!
//! | State                  | Pattern      | Rate   |
//! |------------------------|--------------|--------|
//! | `Solid(c)`             | Solid        | -      |
//! | `Flashing(c)`          | Blink        | 2 Hz   |
//! | `StickyFlashingGreen`  | DoubleBlink  | 1 Hz   |
//! | `Off`                  | Off          | -      |
//!
//! The sticky update indicator uses a double blink so it can be told
//! apart from a plain flashing-green status.

use crate::indicator::{Colour, IndicatorState};

/// Colour as (R, G, B) tuple, each 0–255.
pub type Rgb = (u8, u8, u8);

/// Pattern identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternId {
    Solid,
    Blink,
    DoubleBlink,
    Off,
}

pub const BLINK_PERIOD_MS: u32 = 500;
pub const DOUBLE_BLINK_PERIOD_MS: u32 = 1000;

/// RGB value for a named colour.
pub const fn colour_rgb(colour: Colour) -> Rgb {
    match colour {
        Colour::Red => (255, 0, 0),
        Colour::Green => (0, 255, 0),
        Colour::Blue => (0, 0, 255),
        Colour::Yellow => (255, 200, 0),
        Colour::Cyan => (0, 200, 200),
        Colour::Magenta => (255, 0, 255),
        Colour::Orange => (255, 100, 0),
        Colour::White => (255, 255, 255),
    }
}

/// Map an indicator state to its colour and pattern.
pub const fn pattern_for(state: IndicatorState) -> (Rgb, PatternId) {
    match state {
        IndicatorState::Off => ((0, 0, 0), PatternId::Off),
        IndicatorState::Solid(c) => (colour_rgb(c), PatternId::Solid),
        IndicatorState::Flashing(c) => (colour_rgb(c), PatternId::Blink),
        IndicatorState::StickyFlashingGreen => (colour_rgb(Colour::Green), PatternId::DoubleBlink),
    }
}

/// LED pattern engine. Stack-allocated, no heap.
pub struct LedPatternEngine {
    phase_ms: u32,
    colour: Rgb,
    pattern: PatternId,
}

impl Default for LedPatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LedPatternEngine {
    pub fn new() -> Self {
        Self {
            phase_ms: 0,
            colour: (0, 0, 0),
            pattern: PatternId::Off,
        }
    }

    /// Switch to the pattern for `state`.  Restarts the phase so a new
    /// flashing state always begins with the LED on.
    pub fn set_state(&mut self, state: IndicatorState) {
        let (colour, pattern) = pattern_for(state);
        self.colour = colour;
        self.pattern = pattern;
        self.phase_ms = 0;
    }

    pub fn pattern(&self) -> PatternId {
        self.pattern
    }

    /// Current RGB output without advancing the phase.
    pub fn output(&self) -> Rgb {
        let on = match self.pattern {
            PatternId::Solid => true,
            PatternId::Off => false,
            PatternId::Blink => (self.phase_ms % BLINK_PERIOD_MS) < BLINK_PERIOD_MS / 2,
            PatternId::DoubleBlink => {
                let cycle = self.phase_ms % DOUBLE_BLINK_PERIOD_MS;
                cycle < 100 || (200..300).contains(&cycle)
            }
        };
        if on { self.colour } else { (0, 0, 0) }
    }

    /// Advance the pattern phase and return the current RGB output.
    pub fn tick(&mut self, delta_ms: u32) -> Rgb {
        self.phase_ms = self.phase_ms.wrapping_add(delta_ms);
        self.output()
    }
}
