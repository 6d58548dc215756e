//! GPIO / peripheral pin assignments for the Coop Snooper board.
//!
//! Single source of truth: `main.rs` takes peripherals by these numbers
//! and nothing else hard-codes a pin.

// ---------------------------------------------------------------------------
// Status LED (discrete common-cathode RGB, LEDC PWM)
// ---------------------------------------------------------------------------

pub const LED_R_GPIO: i32 = 11;
pub const LED_G_GPIO: i32 = 12;
pub const LED_B_GPIO: i32 = 13;

/// LEDC frequency for the status LED.
pub const LED_PWM_FREQ_HZ: u32 = 1_000;
/// LEDC timer resolution (bits).  8-bit gives 0 – 255 duty levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Class-D amplifier enable, active HIGH.
pub const AMP_ENABLE_GPIO: i32 = 46;
