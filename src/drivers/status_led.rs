//! RGB status LED driver.
//!
//! Three PWM channels drive a common-cathode RGB LED.  The driver is
//! generic over [`SetDutyCycle`], so the same code runs on LEDC channels
//! on the device and on recording fakes in tests.

use embedded_hal::pwm::SetDutyCycle;

use super::OutputError;
use super::led_patterns::Rgb;

pub struct StatusLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
    current: Rgb,
}

impl<R, G, B> StatusLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    pub fn new(red: R, green: G, blue: B) -> Self {
        Self {
            red,
            green,
            blue,
            current: (0, 0, 0),
        }
    }

    pub fn set_colour(&mut self, (r, g, b): Rgb) -> Result<(), OutputError> {
        if (r, g, b) == self.current {
            return Ok(());
        }
        self.red
            .set_duty_cycle_fraction(u16::from(r), 255)
            .map_err(|_| OutputError::PwmWriteFailed)?;
        self.green
            .set_duty_cycle_fraction(u16::from(g), 255)
            .map_err(|_| OutputError::PwmWriteFailed)?;
        self.blue
            .set_duty_cycle_fraction(u16::from(b), 255)
            .map_err(|_| OutputError::PwmWriteFailed)?;
        self.current = (r, g, b);
        Ok(())
    }

    pub fn off(&mut self) -> Result<(), OutputError> {
        self.set_colour((0, 0, 0))
    }

    pub fn current_colour(&self) -> Rgb {
        self.current
    }
}
