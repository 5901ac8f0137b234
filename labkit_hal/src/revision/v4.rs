//! Fourth revision: H7 core-compute module.
//!
//! The expander interrupt moved to D05 and the speaker to D03, which pushed
//! MikroBus1 PWM out to D35. MikroBus2 RST has a second, MCU-side route on
//! D34; the expander line is listed first and wins.

use labkit_common::io::role::PinRole::*;

use super::PinSource::{Header, Internal, Mcu};
use super::core_compute::CoreComputePins;
use super::{CIPO, COPI, SCK, SCL, SDA};
use crate::peripherals::UartChannel;

/// V4 pin set.
pub static PINS: CoreComputePins = CoreComputePins {
    expander_int: "D05",
    speaker: "D03",
    bridge_channel: UartChannel::A,
    mikrobus1: &[
        (An, Mcu("A00")),
        (Rst, Internal(7)),
        (Cs, Mcu("D18")),
        (Sck, SCK),
        (Cipo, CIPO),
        (Copi, COPI),
        (Pwm, Mcu("D35")),
        (Int, Mcu("D04")),
        (Rx, Mcu("D28")),
        (Tx, Mcu("D29")),
        (Scl, SCL),
        (Sda, SDA),
    ],
    mikrobus2: &[
        (An, Mcu("A01")),
        (Rst, Header(0)),
        (Rst, Mcu("D34")),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_does_not_share_mikrobus_pwm() {
        let pwm = PINS
            .mikrobus1
            .iter()
            .find(|(role, _)| *role == Pwm)
            .map(|(_, source)| *source);
        assert_eq!(pwm, Some(Mcu("D35")));
        assert_ne!(pwm, Some(Mcu(PINS.speaker)));
    }
}
