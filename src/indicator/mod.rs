//! Indicator vocabulary: colours, indicator states and label resolution.
//!
//! Status reports carry a free-form label (`"FLASHING_RED"`,
//! `"LED_GREEN"`, `"SENSING_DOOR_OPEN"` …).  [`Vocabulary::resolve`]
//! turns that label into an [`IndicatorState`]; the [`arbiter`] then
//! decides whether the state may be shown and whether it sounds the
//! alert.
//!
//! Resolution order:
//!
//! | Step | Source                         | Example                          |
//! |------|--------------------------------|----------------------------------|
//! | 1    | configured alias table         | `RED` → `FLASHING_RED`           |
//! | 2    | peer-device labels             | `SENSING_DOOR_OPEN` → `RED`      |
//! | 3    | structural LED vocabulary      | `LED_FLASHING_CYAN`              |
//!
//! Matching is exact and case-sensitive.

pub mod arbiter;

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::IndicatorAlias;

// ───────────────────────────────────────────────────────────────
// Colour
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colour {
    Red,
    Green,
    Blue,
    Yellow,
    Cyan,
    Magenta,
    Orange,
    White,
}

impl Colour {
    pub const ALL: [Colour; 8] = [
        Colour::Red,
        Colour::Green,
        Colour::Blue,
        Colour::Yellow,
        Colour::Cyan,
        Colour::Magenta,
        Colour::Orange,
        Colour::White,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "RED",
            Self::Green => "GREEN",
            Self::Blue => "BLUE",
            Self::Yellow => "YELLOW",
            Self::Cyan => "CYAN",
            Self::Magenta => "MAGENTA",
            Self::Orange => "ORANGE",
            Self::White => "WHITE",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }

    /// Colours whose flashing form sounds the audible alert.
    /// Green (update in progress) and white (booting) never do.
    pub const fn is_alarm(self) -> bool {
        matches!(
            self,
            Self::Red | Self::Blue | Self::Yellow | Self::Cyan | Self::Magenta | Self::Orange
        )
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ───────────────────────────────────────────────────────────────
// IndicatorState
// ───────────────────────────────────────────────────────────────

/// What the status LED is showing.
///
/// `StickyFlashingGreen` marks a firmware update in progress.  Once
/// entered, status reports can no longer change the indicator; only a
/// restart (boot) leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorState {
    Off,
    Solid(Colour),
    Flashing(Colour),
    StickyFlashingGreen,
}

impl IndicatorState {
    /// Indicator shown from power-on until the first status report.
    pub const BOOT: IndicatorState = IndicatorState::Flashing(Colour::White);

    pub const fn is_sticky(self) -> bool {
        matches!(self, Self::StickyFlashingGreen)
    }
}

impl fmt::Display for IndicatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("OFF"),
            Self::Solid(c) => f.write_str(c.as_str()),
            Self::Flashing(c) => write!(f, "FLASHING_{}", c),
            Self::StickyFlashingGreen => f.write_str("STICKY_FLASHING_GREEN"),
        }
    }
}

/// Error returned when a label is not part of the LED vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownLabel;

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown indicator label")
    }
}

impl FromStr for IndicatorState {
    type Err = UnknownLabel;

    /// Parse the structural vocabulary: `[LED_]OFF`, `[LED_][FLASHING_]<COLOUR>`
    /// and the `STICKY_FLASHING_GREEN` form produced by [`Display`](fmt::Display).
    fn from_str(label: &str) -> Result<Self, Self::Err> {
        if label == "STICKY_FLASHING_GREEN" {
            return Ok(Self::StickyFlashingGreen);
        }
        let body = label.strip_prefix("LED_").unwrap_or(label);
        if body == "OFF" {
            return Ok(Self::Off);
        }
        let state = match body.strip_prefix("FLASHING_") {
            Some(colour) => Colour::parse(colour).map(Self::Flashing),
            None => Colour::parse(body).map(Self::Solid),
        };
        state.ok_or(UnknownLabel)
    }
}

impl Serialize for IndicatorState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IndicatorState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label
            .parse()
            .map_err(|_| serde::de::Error::custom("unknown indicator label"))
    }
}

// ───────────────────────────────────────────────────────────────
// Peer-device labels
// ───────────────────────────────────────────────────────────────

/// State labels published by the coop door controller.
const PEER_LABELS: &[(&str, IndicatorState)] = &[
    ("SENSING_DOOR_OPEN", IndicatorState::Solid(Colour::Red)),
    ("SENSING_DOOR_CLOSED", IndicatorState::Solid(Colour::Green)),
    ("SENSING_DOOR_CLOSED_ERROR", IndicatorState::Solid(Colour::Red)),
    ("SENSING_DOOR_OPEN_ERROR", IndicatorState::Solid(Colour::Red)),
    ("MONITOR_SENSING_TIMEOUT", IndicatorState::Solid(Colour::Red)),
    ("MONITOR_SENSING_EXCEPTION", IndicatorState::Solid(Colour::Red)),
    ("MONITOR_TWILIGHT_TIMEOUT", IndicatorState::Solid(Colour::Red)),
    ("MONITOR_TWILIGHT_EXCEPTION", IndicatorState::Solid(Colour::Red)),
    ("SENSING_DOOR_SENSOR_ERROR", IndicatorState::Solid(Colour::Blue)),
];

// ───────────────────────────────────────────────────────────────
// Vocabulary
// ───────────────────────────────────────────────────────────────

/// Label → indicator translation table.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    aliases: Vec<IndicatorAlias>,
}

impl Vocabulary {
    pub fn new(aliases: &[IndicatorAlias]) -> Self {
        Self {
            aliases: aliases.to_vec(),
        }
    }

    /// Translate a status label.  `None` for anything unrecognised.
    ///
    /// The sticky state is never produced here: only the update guard may
    /// enter it.
    pub fn resolve(&self, label: &str) -> Option<IndicatorState> {
        let state = self
            .aliases
            .iter()
            .find(|a| a.label.as_str() == label)
            .map(|a| a.state)
            .or_else(|| {
                PEER_LABELS
                    .iter()
                    .find(|(name, _)| *name == label)
                    .map(|(_, state)| *state)
            })
            .or_else(|| label.parse().ok())?;

        (!state.is_sticky()).then_some(state)
    }
}
