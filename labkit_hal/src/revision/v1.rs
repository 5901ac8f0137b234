//! First revision: every line straight from the Feather, no expanders.

use embedded_hal::digital::PinState;
use labkit_common::consts::MODBUS_SERIAL_PORT;
use labkit_common::hal::error::HalError;
use labkit_common::hal::types::{HardwareRevision, McuPin, SerialConfig};
use labkit_common::io::role::{ConnectorName, PinRole::*};

use super::{
    BoardContext, ButtonPins, ButtonSet, CIPO, COPI, ConnectorTable, DisplayWiring, Expanders,
    PinSource::Mcu, RevisionWiring, SCK, SCL, SDA, SensorSet, shared_table,
};
use crate::peripherals::{Display, DisplayController, RgbLed};
use crate::transport::ModbusTransport;

const BUTTONS: ButtonPins = ButtonPins {
    up: Mcu("D15"),
    down: Mcu("D02"),
    left: Mcu("D10"),
    right: Mcu("D05"),
};

const DISPLAY: DisplayWiring = DisplayWiring {
    controller: DisplayController::St7789,
    cs: Mcu("A03"),
    dc: Mcu("A04"),
    rst: Mcu("A05"),
    backlight: Some(Mcu("D26")),
};

const SPEAKER: &str = "D14";
const RGB: [super::PinSource; 3] = [Mcu("D06"), Mcu("D07"), Mcu("D08")];
const MODBUS_ENABLE: &str = "D27";

// No reset line on either MikroBus header.
const MIKROBUS1: ConnectorTable = &[
    (An, Mcu("A00")),
    (Cs, Mcu("D18")),
    (Sck, SCK),
    (Cipo, CIPO),
    (Copi, COPI),
    (Pwm, Mcu("D03")),
    (Int, Mcu("D04")),
    (Rx, Mcu("D28")),
    (Tx, Mcu("D29")),
    (Scl, SCL),
    (Sda, SDA),
];

const MIKROBUS2: ConnectorTable = &[
    (An, Mcu("A01")),
    (Cs, Mcu("D19")),
    (Sck, SCK),
    (Cipo, CIPO),
    (Copi, COPI),
    (Pwm, Mcu("D22")),
    (Int, Mcu("D09")),
    (Rx, Mcu("D30")),
    (Tx, Mcu("D31")),
    (Scl, SCL),
    (Sda, SDA),
];

const IO_TERMINAL: ConnectorTable = &[(A1, Mcu("A02")), (D2, Mcu("D24")), (D3, Mcu("D25"))];

const DISPLAY_HEADER: ConnectorTable = &[
    (Cs, Mcu("A03")),
    (Rst, Mcu("A05")),
    (Dc, Mcu("A04")),
    (Clk, SCK),
    (Copi, COPI),
    (Led, Mcu("D26")),
];

/// V1 wiring: no expanders.
pub struct V1Board {
    ctx: BoardContext,
    expanders: Expanders,
}

impl V1Board {
    /// Wrap the probed context.
    pub fn new(ctx: BoardContext, expanders: Expanders) -> Self {
        Self { ctx, expanders }
    }
}

impl RevisionWiring for V1Board {
    fn revision(&self) -> HardwareRevision {
        HardwareRevision::V1
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
        super::wire_sensors(&self.ctx, SPEAKER)
    }

    fn build_display(&self) -> Result<Display, HalError> {
        super::build_display(&self.ctx, &self.expanders, &DISPLAY)
    }

    fn build_rgb_led(&self) -> Result<RgbLed, HalError> {
        super::build_rgb_led(&self.ctx, &self.expanders, RGB)
    }

    fn connector_table(&self, name: ConnectorName) -> ConnectorTable {
        match name {
            ConnectorName::MikroBus1 => MIKROBUS1,
            ConnectorName::MikroBus2 => MIKROBUS2,
            ConnectorName::IOTerminal => IO_TERMINAL,
            ConnectorName::Display => DISPLAY_HEADER,
            other => shared_table(other).unwrap_or(&[]),
        }
    }

    fn open_modbus(&self, config: &SerialConfig) -> Result<ModbusTransport, HalError> {
        let platform = self.ctx.platform();
        let port = platform.serial(MODBUS_SERIAL_PORT, config)?;
        let enable = platform.output(McuPin(MODBUS_ENABLE), PinState::Low)?;
        ModbusTransport::direct(port, enable, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mikrobus_tables_have_no_reset() {
        assert!(MIKROBUS1.iter().all(|(role, _)| *role != Rst));
        assert!(MIKROBUS2.iter().all(|(role, _)| *role != Rst));
    }

    #[test]
    fn test_no_pin_is_on_an_expander() {
        for table in [MIKROBUS1, MIKROBUS2, IO_TERMINAL, DISPLAY_HEADER] {
            assert!(table.iter().all(|(_, source)| !source.is_expander()));
        }
    }
}
