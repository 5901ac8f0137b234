//! RGB status indicator on three digital lines.

use embedded_hal::digital::PinState;
use labkit_common::hal::error::HalError;
use labkit_common::hal::platform::DynOutput;
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// Colours reachable with three on/off lines.
pub enum RgbColor {
    /// All lines off.
    Off,
    /// Red only.
    Red,
    /// Green only.
    Green,
    /// Blue only.
    Blue,
    /// Red and green.
    Yellow,
    /// Green and blue.
    Cyan,
    /// Red and blue.
    Magenta,
    /// All three.
    White,
}

impl RgbColor {
    /// (red, green, blue) channel states.
    pub fn channels(&self) -> (bool, bool, bool) {
        match self {
            Self::Off => (false, false, false),
            Self::Red => (true, false, false),
            Self::Green => (false, true, false),
            Self::Blue => (false, false, true),
            Self::Yellow => (true, true, false),
            Self::Cyan => (false, true, true),
            Self::Magenta => (true, false, true),
            Self::White => (true, true, true),
        }
    }
}

struct Channels {
    red: DynOutput,
    green: DynOutput,
    blue: DynOutput,
    color: RgbColor,
}

/// Common-anode indicator: a channel is lit when its line is low.
pub struct RgbLed {
    channels: Mutex<Channels>,
}

impl RgbLed {
    /// Take the three lines and switch them off.
    pub fn new(red: DynOutput, green: DynOutput, blue: DynOutput) -> Result<Self, HalError> {
        let led = Self {
            channels: Mutex::new(Channels {
                red,
                green,
                blue,
                color: RgbColor::Off,
            }),
        };
        led.set(RgbColor::Off)?;
        Ok(led)
    }

    /// Show `color`.
    pub fn set(&self, color: RgbColor) -> Result<(), HalError> {
        let (r, g, b) = color.channels();
        let mut ch = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        ch.red.set_state(lit(r))?;
        ch.green.set_state(lit(g))?;
        ch.blue.set_state(lit(b))?;
        ch.color = color;
        Ok(())
    }

    /// Colour last set.
    pub fn color(&self) -> RgbColor {
        self.channels
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .color
    }
}

fn lit(on: bool) -> PinState {
    if on { PinState::Low } else { PinState::High }
}

impl std::fmt::Debug for RgbLed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbLed").field("color", &self.color()).finish()
    }
}
