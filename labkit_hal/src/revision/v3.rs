//! Third revision: F7 core-compute module on the carrier.

use labkit_common::io::role::PinRole::*;

use super::PinSource::{Header, Internal, Mcu};
use super::core_compute::CoreComputePins;
use super::{CIPO, COPI, SCK, SCL, SDA};
use crate::peripherals::UartChannel;

/// V3 pin set.
pub static PINS: CoreComputePins = CoreComputePins {
    expander_int: "D09",
    speaker: "D14",
    bridge_channel: UartChannel::A,
    mikrobus1: &[
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
    ],
    mikrobus2: &[
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
    ],
    io_terminal: &[(A1, Mcu("A02")), (D2, Header(1)), (D3, Header(2))],
};
