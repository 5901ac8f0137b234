//! SPI TFT display controllers (ST7789 and ILI9341).
//!
//! Only what bring-up and a smoke test need: hardware reset, the init
//! sequence, address window and solid fill. Rendering lives elsewhere.

use labkit_common::hal::error::{BusError, HalError};
use labkit_common::hal::platform::DynOutput;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::bus::SharedSpi;

mod cmd {
    pub const SWRESET: u8 = 0x01;
    pub const SLPOUT: u8 = 0x11;
    pub const NORON: u8 = 0x13;
    pub const INVON: u8 = 0x21;
    pub const DISPON: u8 = 0x29;
    pub const CASET: u8 = 0x2A;
    pub const RASET: u8 = 0x2B;
    pub const RAMWR: u8 = 0x2C;
    pub const MADCTL: u8 = 0x36;
    pub const COLMOD: u8 = 0x3A;
}

/// 16 bits per pixel, RGB565.
const COLMOD_RGB565: u8 = 0x55;
const RESET_PULSE: Duration = Duration::from_millis(1);
const SWRESET_DELAY: Duration = Duration::from_millis(5);
const SLPOUT_DELAY: Duration = Duration::from_millis(120);
/// Pixels pushed per SPI transfer during a fill.
const FILL_CHUNK_PIXELS: usize = 512;

/// Controller family fitted to the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DisplayController {
    /// 240x240, revisions 1 and 2.
    St7789,
    /// 240x320, revisions 3 and 4.
    Ili9341,
}

impl DisplayController {
    /// (width, height) in pixels.
    pub fn size(&self) -> (u16, u16) {
        match self {
            Self::St7789 => (240, 240),
            Self::Ili9341 => (240, 320),
        }
    }

    fn madctl(&self) -> u8 {
        match self {
            Self::St7789 => 0x00,
            // BGR panel, column address order mirrored.
            Self::Ili9341 => 0x48,
        }
    }

    /// ST7789 panels on these boards need inversion for correct colours.
    fn inverted(&self) -> bool {
        matches!(self, Self::St7789)
    }
}

/// Control lines of the display header.
pub struct DisplayPins {
    /// Chip select, active low.
    pub cs: DynOutput,
    /// Data/command select.
    pub dc: DynOutput,
    /// Hardware reset, active low.
    pub rst: DynOutput,
    /// Backlight enable, if switchable.
    pub backlight: Option<DynOutput>,
}

/// An initialized display.
pub struct Display {
    controller: DisplayController,
    spi: SharedSpi,
    pins: Mutex<DisplayPins>,
}

impl Display {
    /// Reset and initialize the controller.
    ///
    /// `settle` is waited after the reset line is released. Reset lines
    /// routed through an expander need it because the level change is not
    /// instantaneous.
    pub fn new(
        controller: DisplayController,
        spi: SharedSpi,
        mut pins: DisplayPins,
        settle: Duration,
    ) -> Result<Self, HalError> {
        pins.cs.set_high()?;
        pins.rst.set_low()?;
        thread::sleep(RESET_PULSE);
        pins.rst.set_high()?;
        thread::sleep(settle);

        let display = Self {
            controller,
            spi,
            pins: Mutex::new(pins),
        };
        display.init()?;

        let (w, h) = controller.size();
        debug!("{:?} initialized ({}x{})", controller, w, h);
        Ok(display)
    }

    fn pins(&self) -> MutexGuard<'_, DisplayPins> {
        self.pins.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init(&self) -> Result<(), BusError> {
        let mut pins = self.pins();
        self.command(&mut pins, cmd::SWRESET, &[])?;
        thread::sleep(SWRESET_DELAY);
        self.command(&mut pins, cmd::SLPOUT, &[])?;
        thread::sleep(SLPOUT_DELAY);
        self.command(&mut pins, cmd::COLMOD, &[COLMOD_RGB565])?;
        self.command(&mut pins, cmd::MADCTL, &[self.controller.madctl()])?;
        if self.controller.inverted() {
            self.command(&mut pins, cmd::INVON, &[])?;
        }
        self.command(&mut pins, cmd::NORON, &[])?;
        self.command(&mut pins, cmd::DISPON, &[])?;
        if let Some(backlight) = pins.backlight.as_mut() {
            backlight.set_high()?;
        }
        Ok(())
    }

    /// Send one command byte followed by its parameters.
    fn command(&self, pins: &mut DisplayPins, command: u8, params: &[u8]) -> Result<(), BusError> {
        self.spi.with_bus(|bus| {
            pins.cs.set_low()?;
            pins.dc.set_low()?;
            bus.write(&[command])?;
            if !params.is_empty() {
                pins.dc.set_high()?;
                bus.write(params)?;
            }
            bus.flush()?;
            pins.cs.set_high()
        })
    }

    /// Controller chip this display drives.
    pub fn controller(&self) -> DisplayController {
        self.controller
    }

    /// Width in pixels.
    pub fn width(&self) -> u16 {
        self.controller.size().0
    }

    /// Height in pixels.
    pub fn height(&self) -> u16 {
        self.controller.size().1
    }

    /// Set the inclusive drawing window.
    pub fn set_window(&self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), HalError> {
        let (w, h) = self.controller.size();
        if x0 > x1 || y0 > y1 || x1 >= w || y1 >= h {
            return Err(HalError::Device(format!(
                "window ({x0},{y0})-({x1},{y1}) outside {w}x{h}"
            )));
        }
        let mut pins = self.pins();
        self.command(&mut pins, cmd::CASET, &window_bytes(x0, x1))?;
        self.command(&mut pins, cmd::RASET, &window_bytes(y0, y1))?;
        Ok(())
    }

    /// Fill the whole panel with one RGB565 colour.
    pub fn fill(&self, color: u16) -> Result<(), HalError> {
        let (w, h) = self.controller.size();
        self.set_window(0, 0, w - 1, h - 1)?;

        let chunk: Vec<u8> = color
            .to_be_bytes()
            .iter()
            .copied()
            .cycle()
            .take(FILL_CHUNK_PIXELS * 2)
            .collect();
        let mut remaining = w as usize * h as usize;

        let mut pins = self.pins();
        self.command(&mut pins, cmd::RAMWR, &[])?;
        self.spi.with_bus(|bus| {
            pins.cs.set_low()?;
            pins.dc.set_high()?;
            while remaining > 0 {
                let n = remaining.min(FILL_CHUNK_PIXELS);
                bus.write(&chunk[..n * 2])?;
                remaining -= n;
            }
            bus.flush()?;
            pins.cs.set_high()
        })?;
        Ok(())
    }

    /// Switch the backlight.
    pub fn set_backlight(&self, on: bool) -> Result<(), HalError> {
        match self.pins().backlight.as_mut() {
            Some(backlight) => Ok(backlight.set_state(on.into())?),
            None => Err(HalError::Device("display has no backlight control".into())),
        }
    }
}

impl std::fmt::Debug for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Display")
            .field("controller", &self.controller)
            .finish()
    }
}

fn window_bytes(start: u16, end: u16) -> [u8; 4] {
    let [s0, s1] = start.to_be_bytes();
    let [e0, e1] = end.to_be_bytes();
    [s0, s1, e0, e1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_sizes() {
        assert_eq!(DisplayController::St7789.size(), (240, 240));
        assert_eq!(DisplayController::Ili9341.size(), (240, 320));
    }

    #[test]
    fn test_window_bytes_big_endian() {
        assert_eq!(window_bytes(0, 239), [0x00, 0x00, 0x00, 0xEF]);
        assert_eq!(window_bytes(256, 319), [0x01, 0x00, 0x01, 0x3F]);
    }
}
