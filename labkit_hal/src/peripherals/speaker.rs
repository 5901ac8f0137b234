//! Piezo speaker on a PWM output.

use labkit_common::hal::error::HalError;
use labkit_common::hal::platform::DynPwm;
use std::sync::Mutex;

/// Square wave at 50 % duty gives the loudest tone on a piezo.
const TONE_DUTY_PERCENT: u8 = 50;

/// Piezo speaker.
pub struct Speaker {
    pwm: Mutex<DynPwm>,
}

impl Speaker {
    /// Take the PWM channel and make sure it starts silent.
    pub fn new(mut pwm: DynPwm) -> Result<Self, HalError> {
        pwm.set_duty_cycle_fully_off()?;
        Ok(Self {
            pwm: Mutex::new(pwm),
        })
    }

    /// Start a square-wave tone. 0 Hz stops it.
    pub fn play_tone(&self, frequency_hz: u32) -> Result<(), HalError> {
        if frequency_hz == 0 {
            return self.stop();
        }
        let mut pwm = self.pwm.lock().unwrap_or_else(|e| e.into_inner());
        pwm.set_frequency(frequency_hz)?;
        pwm.set_duty_cycle_percent(TONE_DUTY_PERCENT)?;
        Ok(())
    }

    /// Silence the speaker.
    pub fn stop(&self) -> Result<(), HalError> {
        let mut pwm = self.pwm.lock().unwrap_or_else(|e| e.into_inner());
        pwm.set_duty_cycle_fully_off()?;
        Ok(())
    }
}

impl std::fmt::Debug for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Speaker")
    }
}
