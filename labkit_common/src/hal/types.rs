//! Board-level value types.
//!
//! Revision tag, microcontroller family, pin identifiers and bus settings.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::consts::{DEFAULT_MODBUS_BAUD, DEFAULT_MODBUS_DATA_BITS, TRANSPORT_TIMEOUT};

// ─── HardwareRevision ───────────────────────────────────────────────

/// Physically distinct board revision.
///
/// `minor` is the raw version-chip byte. It is an opaque ordinal (higher
/// means newer) and carries no other meaning. `None` means no version
/// chip answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareRevision {
    /// No expander hardware; everything wired to the microcontroller.
    V1,
    V2 { minor: Option<u8> },
    V3 { minor: Option<u8> },
    V4 { minor: Option<u8> },
}

impl HardwareRevision {
    /// Major revision number (1-4).
    pub fn major(&self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 { .. } => 2,
            Self::V3 { .. } => 3,
            Self::V4 { .. } => 4,
        }
    }

    /// Version-chip byte, if one was read.
    pub fn minor(&self) -> Option<u8> {
        match self {
            Self::V1 => None,
            Self::V2 { minor } | Self::V3 { minor } | Self::V4 { minor } => *minor,
        }
    }

    /// Whether this revision routes core peripherals through expanders.
    pub fn has_expanders(&self) -> bool {
        !matches!(self, Self::V1)
    }
}

impl fmt::Display for HardwareRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor() {
            Some(minor) => write!(f, "v{}.{}", self.major(), minor),
            None => write!(f, "v{}.x", self.major()),
        }
    }
}

impl FromStr for HardwareRevision {
    type Err = String;

    /// Parse `"v{major}.{minor|x}"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix('v')
            .or_else(|| s.strip_prefix('V'))
            .ok_or_else(|| format!("revision must start with 'v': {s:?}"))?;
        let (major, minor) = body.split_once('.').unwrap_or((body, "x"));
        let minor = match minor {
            "x" | "X" => None,
            n => Some(
                n.parse::<u8>()
                    .map_err(|e| format!("invalid minor revision {n:?}: {e}"))?,
            ),
        };
        match (major, minor) {
            ("1", None) => Ok(Self::V1),
            ("1", Some(_)) => Err("v1 boards carry no version chip".to_string()),
            ("2", minor) => Ok(Self::V2 { minor }),
            ("3", minor) => Ok(Self::V3 { minor }),
            ("4", minor) => Ok(Self::V4 { minor }),
            (other, _) => Err(format!("unknown major revision {other:?}")),
        }
    }
}

// ─── McuFamily ──────────────────────────────────────────────────────

/// Microcontroller family the process was built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McuFamily {
    /// Feather module: V1 or V2, decided by the bus probe.
    F7Feather,
    /// Core-compute module of the V3 boards.
    F7CoreCompute,
    /// Core-compute module of the V4 boards.
    H7CoreCompute,
    /// Anything the capability layer has no wiring for.
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for McuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::F7Feather => "f7_feather",
            Self::F7CoreCompute => "f7_core_compute",
            Self::H7CoreCompute => "h7_core_compute",
            Self::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

// ─── Pins ───────────────────────────────────────────────────────────

/// Microcontroller pin, identified by its board silkscreen name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct McuPin(pub &'static str);

impl McuPin {
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for McuPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Built-in pull resistor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

/// Edge selection for asynchronous interrupts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Disabled,
    RisingEdge,
    FallingEdge,
    Both,
}

impl Trigger {
    /// Whether a transition to `level` fires this trigger.
    pub fn fires_on(&self, level: embedded_hal::digital::PinState) -> bool {
        use embedded_hal::digital::PinState;
        match self {
            Self::Disabled => false,
            Self::RisingEdge => level == PinState::High,
            Self::FallingEdge => level == PinState::Low,
            Self::Both => true,
        }
    }
}

// ─── Serial ─────────────────────────────────────────────────────────

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// Serial port settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Applied to both reads and writes.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_MODBUS_BAUD,
            data_bits: DEFAULT_MODBUS_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: TRANSPORT_TIMEOUT,
        }
    }
}

impl SerialConfig {
    /// 8N1 at the given baud rate.
    pub fn with_baud(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }
}

// ─── SPI / I2C ──────────────────────────────────────────────────────

/// SPI clock polarity/phase combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    #[default]
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

impl SpiMode {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Mode0),
            1 => Some(Self::Mode1),
            2 => Some(Self::Mode2),
            3 => Some(Self::Mode3),
            _ => None,
        }
    }
}

/// Shared SPI bus settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    pub frequency_hz: u32,
    pub mode: SpiMode,
}

/// Shared I2C bus settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cConfig {
    pub frequency_hz: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::digital::PinState;

    #[test]
    fn test_revision_string_formatting() {
        assert_eq!(HardwareRevision::V1.to_string(), "v1.x");
        assert_eq!(HardwareRevision::V2 { minor: None }.to_string(), "v2.x");
        assert_eq!(HardwareRevision::V2 { minor: Some(3) }.to_string(), "v2.3");
        assert_eq!(HardwareRevision::V4 { minor: Some(1) }.to_string(), "v4.1");
        assert_eq!(
            HardwareRevision::V3 { minor: Some(200) }.to_string(),
            "v3.200"
        );
    }

    #[test]
    fn test_revision_parse() {
        assert_eq!("v1.x".parse::<HardwareRevision>(), Ok(HardwareRevision::V1));
        assert_eq!("v1".parse::<HardwareRevision>(), Ok(HardwareRevision::V1));
        assert_eq!(
            "v3.2".parse::<HardwareRevision>(),
            Ok(HardwareRevision::V3 { minor: Some(2) })
        );
        assert!("v1.4".parse::<HardwareRevision>().is_err());
        assert!("2.1".parse::<HardwareRevision>().is_err());
        assert!("v5.x".parse::<HardwareRevision>().is_err());
        assert!("v2.300".parse::<HardwareRevision>().is_err());
    }

    #[test]
    fn test_family_unknown_string_is_unsupported() {
        #[derive(Deserialize)]
        struct Wrapper {
            family: McuFamily,
        }
        let w: Wrapper = toml::from_str("family = \"esp32\"").unwrap();
        assert_eq!(w.family, McuFamily::Unsupported);
        let w: Wrapper = toml::from_str("family = \"h7_core_compute\"").unwrap();
        assert_eq!(w.family, McuFamily::H7CoreCompute);
    }

    #[test]
    fn test_trigger_edges() {
        assert!(Trigger::Both.fires_on(PinState::Low));
        assert!(Trigger::Both.fires_on(PinState::High));
        assert!(Trigger::FallingEdge.fires_on(PinState::Low));
        assert!(!Trigger::FallingEdge.fires_on(PinState::High));
        assert!(!Trigger::Disabled.fires_on(PinState::Low));
    }

    #[test]
    fn test_serial_defaults_are_8n1_19200() {
        let c = SerialConfig::default();
        assert_eq!(c.baud_rate, 19_200);
        assert_eq!(c.data_bits, 8);
        assert_eq!(c.parity, Parity::None);
        assert_eq!(c.stop_bits, StopBits::One);
        assert_eq!(SerialConfig::with_baud(9600).data_bits, 8);
    }
}
