//! Core-compute carrier boards (third and fourth revisions).
//!
//! Both share the same layout: buttons and display control on the internal
//! expander, an ILI9341 with a resistive touch controller, the RGB LED on
//! the header expander, and Modbus through channel A of the I2C UART
//! bridge with automatic RS-485 direction control. What differs between
//! the two is captured in [`CoreComputePins`].

use labkit_common::consts::{UART_BRIDGE_ADDRESS, UART_BRIDGE_CLOCK_HZ};
use labkit_common::hal::error::HalError;
use labkit_common::hal::types::{HardwareRevision, SerialConfig};
use labkit_common::io::role::{ConnectorName, PinRole};

use super::{
    BoardContext, ButtonPins, ButtonSet, ConnectorTable, DisplayWiring, Expanders, PinSource,
    RevisionWiring, SensorSet, shared_table,
};
use crate::peripherals::{
    BridgeUart, Display, DisplayController, RgbLed, Touchscreen, UartChannel,
};
use crate::transport::ModbusTransport;
use embedded_hal::digital::PinState;

/// Lines shared by both core-compute revisions.
pub const BUTTONS: ButtonPins = ButtonPins {
    up: PinSource::Internal(0),
    down: PinSource::Internal(1),
    left: PinSource::Internal(2),
    right: PinSource::Internal(3),
};

/// ILI9341 wiring. CS and RST on the internal expander.
pub const DISPLAY: DisplayWiring = DisplayWiring {
    controller: DisplayController::Ili9341,
    cs: PinSource::Internal(4),
    dc: PinSource::Mcu("A04"),
    rst: PinSource::Internal(5),
    backlight: Some(PinSource::Mcu("D26")),
};

/// Touch controller chip select.
pub const TOUCH_CS: PinSource = PinSource::Internal(6);

/// RGB indicator on the header expander.
pub const RGB: [PinSource; 3] = [
    PinSource::Header(3),
    PinSource::Header(4),
    PinSource::Header(5),
];

/// Display header; identical on both revisions.
pub const DISPLAY_HEADER: ConnectorTable = &[
    (PinRole::Cs, PinSource::Internal(4)),
    (PinRole::Rst, PinSource::Internal(5)),
    (PinRole::Dc, PinSource::Mcu("A04")),
    (PinRole::Clk, super::SCK),
    (PinRole::Copi, super::COPI),
    (PinRole::Led, PinSource::Mcu("D26")),
];

/// Per-revision differences.
#[derive(Debug)]
pub struct CoreComputePins {
    /// MCU pin receiving the internal expander's INT output.
    pub expander_int: &'static str,
    /// PWM pin of the speaker.
    pub speaker: &'static str,
    /// Bridge UART wired to the RS-485 transceiver.
    pub bridge_channel: UartChannel,
    /// MikroBus 1 role table.
    pub mikrobus1: ConnectorTable,
    /// MikroBus 2 role table.
    pub mikrobus2: ConnectorTable,
    /// IO terminal role table.
    pub io_terminal: ConnectorTable,
}

/// V3 and V4 wiring.
pub struct CoreComputeBoard {
    revision: HardwareRevision,
    ctx: BoardContext,
    expanders: Expanders,
    pins: &'static CoreComputePins,
}

impl CoreComputeBoard {
    /// Attach the expander interrupt and keep the pin set.
    pub fn new(
        revision: HardwareRevision,
        ctx: BoardContext,
        expanders: Expanders,
        pins: &'static CoreComputePins,
    ) -> Self {
        expanders.attach_interrupt(ctx.platform(), pins.expander_int);
        Self {
            revision,
            ctx,
            expanders,
            pins,
        }
    }
}

impl RevisionWiring for CoreComputeBoard {
    fn revision(&self) -> HardwareRevision {
        self.revision
    }

    fn context(&self) -> &BoardContext {
        &self.ctx
    }

    fn expanders(&self) -> &Expanders {
        &self.expanders
    }

    fn wire_buttons(&self) -> ButtonSet {
        super::wire_buttons(&self.ctx, &self.expanders, &BUTTONS)
    }

    fn wire_sensors(&self) -> SensorSet {
        super::wire_sensors(&self.ctx, self.pins.speaker)
    }

    fn build_display(&self) -> Result<Display, HalError> {
        super::build_display(&self.ctx, &self.expanders, &DISPLAY)
    }

    fn build_rgb_led(&self) -> Result<RgbLed, HalError> {
        super::build_rgb_led(&self.ctx, &self.expanders, RGB)
    }

    fn build_touchscreen(&self) -> Result<Touchscreen, HalError> {
        let cs = super::open_output(&self.ctx, &self.expanders, TOUCH_CS, PinState::High)?;
        Touchscreen::new(self.ctx.buses.spi.clone(), cs)
    }

    fn connector_table(&self, name: ConnectorName) -> ConnectorTable {
        match name {
            ConnectorName::MikroBus1 => self.pins.mikrobus1,
            ConnectorName::MikroBus2 => self.pins.mikrobus2,
            ConnectorName::IOTerminal => self.pins.io_terminal,
            ConnectorName::Display => DISPLAY_HEADER,
            other => shared_table(other).unwrap_or(&[]),
        }
    }

    fn open_modbus(&self, config: &SerialConfig) -> Result<ModbusTransport, HalError> {
        let uart = BridgeUart::open(
            self.ctx.buses.i2c.clone(),
            UART_BRIDGE_ADDRESS,
            self.pins.bridge_channel,
            UART_BRIDGE_CLOCK_HZ,
            config,
            true,
        )?;
        ModbusTransport::bridged(Box::new(uart), config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_lines_do_not_collide() {
        let internal = [
            BUTTONS.up,
            BUTTONS.down,
            BUTTONS.left,
            BUTTONS.right,
            DISPLAY.cs,
            DISPLAY.rst,
            TOUCH_CS,
        ];
        for (i, line) in internal.iter().enumerate() {
            assert!(!internal[i + 1..].contains(line), "{line:?} used twice");
        }
        assert!(RGB.iter().all(|s| matches!(s, PinSource::Header(_))));
    }
}
