//! Connector and pin-role names.
//!
//! `ConnectorName` identifies an expansion header; `PinRole` identifies a
//! logical line on it (`"RST"`, `"SDA"`, ...). Each connector documents the
//! full role set it can expose. A revision may leave some of them unwired.

use core::fmt;
use core::str::FromStr;

// ─── ConnectorName ──────────────────────────────────────────────────

/// Expansion header exposed to applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectorName {
    MikroBus1,
    MikroBus2,
    GroveDigital,
    GroveAnalog,
    GroveUart,
    Qwiic,
    IOTerminal,
    Display,
}

impl ConnectorName {
    /// Every connector, in report order.
    pub const ALL: [ConnectorName; 8] = [
        Self::MikroBus1,
        Self::MikroBus2,
        Self::GroveDigital,
        Self::GroveAnalog,
        Self::GroveUart,
        Self::Qwiic,
        Self::IOTerminal,
        Self::Display,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MikroBus1 => "MikroBus1",
            Self::MikroBus2 => "MikroBus2",
            Self::GroveDigital => "GroveDigital",
            Self::GroveAnalog => "GroveAnalog",
            Self::GroveUart => "GroveUart",
            Self::Qwiic => "Qwiic",
            Self::IOTerminal => "IOTerminal",
            Self::Display => "Display",
        }
    }

    /// Documented role set of this header.
    pub fn roles(&self) -> &'static [PinRole] {
        use PinRole::*;
        match self {
            Self::MikroBus1 | Self::MikroBus2 => {
                &[An, Rst, Cs, Sck, Cipo, Copi, Pwm, Int, Rx, Tx, Scl, Sda]
            }
            Self::GroveDigital | Self::GroveAnalog => &[D0, D1],
            Self::GroveUart => &[Rx, Tx],
            Self::Qwiic => &[Scl, Sda],
            Self::IOTerminal => &[A1, D2, D3],
            Self::Display => &[Cs, Rst, Dc, Clk, Copi, Led],
        }
    }

    /// Position in [`ConnectorName::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ConnectorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectorName {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown connector: {s:?}"))
    }
}

// ─── PinRole ────────────────────────────────────────────────────────

/// Logical line on a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PinRole {
    /// Analog input.
    An,
    /// Reset.
    Rst,
    /// Chip select.
    Cs,
    /// SPI clock.
    Sck,
    /// SPI controller-in / peripheral-out.
    Cipo,
    /// SPI controller-out / peripheral-in.
    Copi,
    Pwm,
    /// Interrupt.
    Int,
    Rx,
    Tx,
    Scl,
    Sda,
    /// Display data/command select.
    Dc,
    /// Display clock.
    Clk,
    /// Display backlight.
    Led,
    D0,
    D1,
    D2,
    D3,
    A1,
}

impl PinRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::An => "AN",
            Self::Rst => "RST",
            Self::Cs => "CS",
            Self::Sck => "SCK",
            Self::Cipo => "CIPO",
            Self::Copi => "COPI",
            Self::Pwm => "PWM",
            Self::Int => "INT",
            Self::Rx => "RX",
            Self::Tx => "TX",
            Self::Scl => "SCL",
            Self::Sda => "SDA",
            Self::Dc => "DC",
            Self::Clk => "CLK",
            Self::Led => "LED",
            Self::D0 => "D0",
            Self::D1 => "D1",
            Self::D2 => "D2",
            Self::D3 => "D3",
            Self::A1 => "A1",
        }
    }
}

impl fmt::Display for PinRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PinRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use PinRole::*;
        const ALL: [PinRole; 20] = [
            An, Rst, Cs, Sck, Cipo, Copi, Pwm, Int, Rx, Tx, Scl, Sda, Dc, Clk, Led, D0, D1, D2,
            D3, A1,
        ];
        // MISO/MOSI are still printed on older silkscreens.
        match s.to_ascii_uppercase().as_str() {
            "MISO" => return Ok(Cipo),
            "MOSI" => return Ok(Copi),
            _ => {}
        }
        ALL.iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown pin role: {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_round_trip_names() {
        for c in ConnectorName::ALL {
            assert_eq!(c.as_str().parse::<ConnectorName>(), Ok(c));
        }
        assert_eq!("qwiic".parse::<ConnectorName>(), Ok(ConnectorName::Qwiic));
        assert!("MikroBus3".parse::<ConnectorName>().is_err());
    }

    #[test]
    fn test_connector_index_matches_all() {
        for (i, c) in ConnectorName::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
        }
    }

    #[test]
    fn test_mikrobus_role_set() {
        let names: Vec<&str> = ConnectorName::MikroBus1
            .roles()
            .iter()
            .map(PinRole::as_str)
            .collect();
        assert_eq!(
            names,
            ["AN", "RST", "CS", "SCK", "CIPO", "COPI", "PWM", "INT", "RX", "TX", "SCL", "SDA"]
        );
    }

    #[test]
    fn test_pin_role_parse() {
        assert_eq!("rst".parse::<PinRole>(), Ok(PinRole::Rst));
        assert_eq!("MISO".parse::<PinRole>(), Ok(PinRole::Cipo));
        assert_eq!("mosi".parse::<PinRole>(), Ok(PinRole::Copi));
        assert!("VCC".parse::<PinRole>().is_err());
    }
}
