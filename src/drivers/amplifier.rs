//! Audio power amplifier driver.
//!
//! The class-D amplifier on the audio board has an active-high enable
//! line.  Sample playback itself happens in the codec pipeline; this
//! driver only owns the enable pin and the playback settings the
//! squawk applies before a clip starts.

use embedded_hal::digital::OutputPin;

use super::OutputError;

/// Playback settings pushed by the audio port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub playback: bool,
    /// Linear volume, clamped to `0.0..=1.0`.
    pub volume: f32,
    pub gain: bool,
    pub amplifier: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            playback: false,
            volume: 0.0,
            gain: false,
            amplifier: false,
        }
    }
}

impl AudioSettings {
    /// Whether these settings produce audible output.
    pub fn audible(&self) -> bool {
        self.playback && self.amplifier && self.volume > 0.0
    }
}

pub struct Amplifier<P> {
    enable: P,
    enabled: bool,
}

impl<P: OutputPin> Amplifier<P> {
    /// Take the enable pin and drive it low.
    pub fn new(mut enable: P) -> Result<Self, OutputError> {
        enable.set_low().map_err(|_| OutputError::GpioWriteFailed)?;
        Ok(Self {
            enable,
            enabled: false,
        })
    }

    pub fn set_enabled(&mut self, on: bool) -> Result<(), OutputError> {
        if on == self.enabled {
            return Ok(());
        }
        let res = if on {
            self.enable.set_high()
        } else {
            self.enable.set_low()
        };
        res.map_err(|_| OutputError::GpioWriteFailed)?;
        self.enabled = on;
        log::info!("Amplifier: {}", if on { "on" } else { "off" });
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    #[derive(Default)]
    struct FakePin {
        high: bool,
        edges: u32,
    }

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.edges += 1;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.edges += 1;
            Ok(())
        }
    }

    #[test]
    fn starts_disabled_and_toggles() {
        let mut amp = Amplifier::new(FakePin::default()).unwrap();
        assert!(!amp.is_enabled());
        amp.set_enabled(true).unwrap();
        assert!(amp.is_enabled());
        assert!(amp.enable.high);
        amp.set_enabled(true).unwrap();
        assert_eq!(amp.enable.edges, 2);
        amp.set_enabled(false).unwrap();
        assert!(!amp.enable.high);
    }

    #[test]
    fn squawk_settings_are_audible() {
        let squawk = AudioSettings {
            playback: true,
            volume: 1.0,
            gain: true,
            amplifier: true,
        };
        assert!(squawk.audible());
        assert!(!AudioSettings::default().audible());
    }
}
