//! XPT2046 resistive touch controller on the shared SPI bus.

use labkit_common::hal::error::{BusError, HalError};
use labkit_common::hal::platform::DynOutput;
use std::sync::Mutex;

use crate::bus::SharedSpi;

// Control bytes: start bit, channel, 12-bit, differential, power-down between conversions.
const READ_X: u8 = 0xD0;
const READ_Y: u8 = 0x90;
const READ_Z1: u8 = 0xB0;
const POWER_DOWN: u8 = 0x80;

/// Pressure below which the panel is considered untouched.
const TOUCH_THRESHOLD: u16 = 100;

/// Raw 12-bit sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TouchSample {
    /// Raw X position.
    pub x: u16,
    /// Raw Y position.
    pub y: u16,
    /// Z1 pressure reading.
    pub pressure: u16,
}

impl TouchSample {
    /// Whether the pressure is above the touch threshold.
    pub fn is_touched(&self) -> bool {
        self.pressure >= TOUCH_THRESHOLD
    }
}

/// XPT2046 touch controller.
pub struct Touchscreen {
    spi: SharedSpi,
    cs: Mutex<DynOutput>,
}

impl Touchscreen {
    /// Deselect and put the controller into power-down mode.
    pub fn new(spi: SharedSpi, mut cs: DynOutput) -> Result<Self, HalError> {
        cs.set_high()?;
        let touch = Self {
            spi,
            cs: Mutex::new(cs),
        };
        touch.convert(POWER_DOWN)?;
        Ok(touch)
    }

    fn convert(&self, control: u8) -> Result<u16, BusError> {
        let mut cs = self.cs.lock().unwrap_or_else(|e| e.into_inner());
        self.spi.with_bus(|bus| {
            let mut frame = [control, 0, 0];
            cs.set_low()?;
            bus.transfer_in_place(&mut frame)?;
            bus.flush()?;
            cs.set_high()?;
            Ok(u16::from_be_bytes([frame[1], frame[2]]) >> 3)
        })
    }

    /// Read position and pressure.
    pub fn sample(&self) -> Result<TouchSample, HalError> {
        Ok(TouchSample {
            x: self.convert(READ_X)?,
            y: self.convert(READ_Y)?,
            pressure: self.convert(READ_Z1)?,
        })
    }
}

impl std::fmt::Debug for Touchscreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Touchscreen(XPT2046)")
    }
}
