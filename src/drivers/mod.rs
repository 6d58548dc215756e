//! Output drivers and peripheral helpers.

pub mod amplifier;
pub mod led_patterns;
pub mod status_led;
pub mod task_pin;
pub mod watchdog;

/// Errors raised by output drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// GPIO set failed.
    GpioWriteFailed,
}

impl core::fmt::Display for OutputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl std::error::Error for OutputError {}
