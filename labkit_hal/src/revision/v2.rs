//! Second revision: Feather with internal and header expanders.
//!
//! Buttons and most display control lines moved onto the internal
//! expander, whose INT output is routed to D09. The reset lines the first
//! revision lacked are now wired through the expanders.

use embedded_hal::digital::PinState;
use labkit_common::consts::MODBUS_SERIAL_PORT;
use labkit_common::hal::error::HalError;
use labkit_common::hal::types::{HardwareRevision, McuPin, SerialConfig};
use labkit_common::io::role::{ConnectorName, PinRole::*};

use super::{
    BoardContext, ButtonPins, ButtonSet, CIPO, COPI, ConnectorTable, DisplayWiring, Expanders,
    PinSource, PinSource::Header, PinSource::Internal, PinSource::Mcu, RevisionWiring, SCK, SCL,
    SDA, SensorSet, shared_table,
};
use crate::peripherals::{Display, DisplayController, RgbLed};
use crate::transport::ModbusTransport;

const EXPANDER_INT: &str = "D09";

const BUTTONS: ButtonPins = ButtonPins {
    up: Internal(0),
    down: Internal(1),
    left: Internal(2),
    right: Internal(3),
};

const DISPLAY: DisplayWiring = DisplayWiring {
    controller: DisplayController::St7789,
    cs: Internal(4),
    dc: Mcu("A04"),
    rst: Internal(5),
    backlight: Some(Internal(6)),
};

const SPEAKER: &str = "D14";
const RGB: [PinSource; 3] = [Mcu("D06"), Mcu("D07"), Mcu("D08")];
const MODBUS_ENABLE: &str = "D02";

const MIKROBUS1: ConnectorTable = &[
    (An, Mcu("A00")),
    (Rst, Internal(7)),
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

// INT moved off D09, which now carries the expander interrupt.
const MIKROBUS2: ConnectorTable = &[
    (An, Mcu("A01")),
    (Rst, Header(0)),
    (Cs, Mcu("D19")),
    (Sck, SCK),
    (Cipo, CIPO),
    (Copi, COPI),
    (Pwm, Mcu("D22")),
    (Int, Mcu("D10")),
    (Rx, Mcu("D30")),
    (Tx, Mcu("D31")),
    (Scl, SCL),
    (Sda, SDA),
];

const IO_TERMINAL: ConnectorTable = &[(A1, Mcu("A02")), (D2, Header(1)), (D3, Header(2))];

const DISPLAY_HEADER: ConnectorTable = &[
    (Cs, Internal(4)),
    (Rst, Internal(5)),
    (Dc, Mcu("A04")),
    (Clk, SCK),
    (Copi, COPI),
    (Led, Internal(6)),
];

/// V2 wiring: internal and header expanders.
pub struct V2Board {
    revision: HardwareRevision,
    ctx: BoardContext,
    expanders: Expanders,
}

impl V2Board {
    /// Attach the expander interrupt.
    pub fn new(revision: HardwareRevision, ctx: BoardContext, expanders: Expanders) -> Self {
        expanders.attach_interrupt(ctx.platform(), EXPANDER_INT);
        Self {
            revision,
            ctx,
            expanders,
        }
    }
}

impl RevisionWiring for V2Board {
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
    fn test_expander_int_not_reused_by_connectors() {
        for table in [MIKROBUS1, MIKROBUS2, IO_TERMINAL, DISPLAY_HEADER] {
            assert!(table.iter().all(|(_, source)| *source != Mcu(EXPANDER_INT)));
        }
    }

    #[test]
    fn test_internal_expander_lines_are_unique() {
        let mut used: Vec<u8> = [BUTTONS.up, BUTTONS.down, BUTTONS.left, BUTTONS.right]
            .into_iter()
            .chain([DISPLAY.cs, DISPLAY.rst])
            .chain(DISPLAY.backlight)
            .chain(MIKROBUS1.iter().map(|(_, s)| *s))
            .filter_map(|s| match s {
                Internal(i) => Some(i),
                _ => None,
            })
            .collect();
        let total = used.len();
        used.sort_unstable();
        used.dedup();
        assert_eq!(used.len(), total);
    }
}
