//! Error types for the capability layer.
//!
//! - `BusError` - what a platform primitive reports
//! - `BringupFailure` - why an optional peripheral slot stayed empty
//! - `HalError` - everything a capability accessor can return
//!
//! Only `HalError::BusAcquisition` and `HalError::UnsupportedPlatform` are
//! fatal. Every other variant is contained at the peripheral that raised it.

use core::fmt;
use thiserror::Error;

use crate::config::ConfigError;
use crate::io::role::{ConnectorName, PinRole};

/// Error reported by platform bus and pin primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Device did not acknowledge its address or data.
    #[error("no acknowledge from device")]
    Nack,

    /// Operation exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// The platform cannot provide the requested resource.
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    /// Any other driver-level failure.
    #[error("I/O error: {0}")]
    Io(String),
}

impl embedded_hal::i2c::Error for BusError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            Self::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            _ => ErrorKind::Other,
        }
    }
}

impl embedded_hal::spi::Error for BusError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

impl embedded_hal::digital::Error for BusError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl embedded_hal::pwm::Error for BusError {
    fn kind(&self) -> embedded_hal::pwm::ErrorKind {
        embedded_hal::pwm::ErrorKind::Other
    }
}

impl embedded_io::Error for BusError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            Self::Timeout => embedded_io::ErrorKind::TimedOut,
            Self::Nack | Self::Unavailable(_) => embedded_io::ErrorKind::NotConnected,
            Self::Io(_) => embedded_io::ErrorKind::Other,
        }
    }
}

/// Reason an optional peripheral could not be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{peripheral}: {reason}")]
pub struct BringupFailure {
    /// Peripheral slot name (e.g. `"light_sensor"`).
    pub peripheral: String,
    /// Human-readable reason.
    pub reason: String,
}

impl BringupFailure {
    pub fn new(peripheral: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            peripheral: peripheral.into(),
            reason: reason.to_string(),
        }
    }
}

/// Error type for capability-layer operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// A chip or peripheral could not be constructed. The slot stays empty.
    #[error("bring-up failed for {0}")]
    Bringup(#[from] BringupFailure),

    /// The connector does not wire this role on this revision.
    #[error("{connector} has no {role} pin on this board")]
    PinNotConnected {
        connector: ConnectorName,
        role: PinRole,
    },

    /// The process runs on a microcontroller family without board wiring.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Modbus read or write exceeded its configured timeout.
    #[error("transport timed out")]
    TransportTimeout,

    /// The platform could not create a shared bus.
    #[error("bus acquisition failed: {0}")]
    BusAcquisition(String),

    /// A bus or pin operation failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// No connector with that name exists.
    #[error("unknown connector: {0}")]
    UnknownConnector(String),

    /// No pin role with that name exists.
    #[error("{0}")]
    UnknownPinRole(String),

    /// An expander-borrowed pin outlived its expander.
    #[error("expander at {0:#04x} is no longer available")]
    ExpanderGone(u8),

    /// A chip answered but did not identify as expected.
    #[error("device check failed: {0}")]
    Device(String),

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HalError {
    /// Whether the process cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::BusAcquisition(_) | Self::UnsupportedPlatform(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bringup_failure_display() {
        let failure = BringupFailure::new("light_sensor", BusError::Nack);
        assert_eq!(failure.to_string(), "light_sensor: no acknowledge from device");

        let err = HalError::from(failure);
        assert!(err.to_string().contains("light_sensor"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(HalError::BusAcquisition("spi".into()).is_fatal());
        assert!(HalError::UnsupportedPlatform("esp32".into()).is_fatal());
        assert!(!HalError::TransportTimeout.is_fatal());
        assert!(!HalError::Bus(BusError::Timeout).is_fatal());
    }

    #[test]
    fn test_pin_not_connected_display() {
        let err = HalError::PinNotConnected {
            connector: ConnectorName::MikroBus1,
            role: PinRole::Rst,
        };
        assert_eq!(err.to_string(), "MikroBus1 has no RST pin on this board");
    }

    #[test]
    fn test_bus_error_io_kind() {
        use embedded_io::Error as _;
        assert_eq!(BusError::Timeout.kind(), embedded_io::ErrorKind::TimedOut);
        assert_eq!(BusError::Nack.kind(), embedded_io::ErrorKind::NotConnected);
    }
}
