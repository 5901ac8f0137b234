//! Named pins and expansion headers.
//!
//! A [`PinMapping`] binds logical roles to physical pins. A physical pin is
//! either a microcontroller pin or a line borrowed from an I/O expander.
//! A [`Connector`] is one expansion header: a name, its mapping, and the
//! shared buses routed to it.

use embedded_hal::digital::PinState;
use labkit_common::hal::error::{BusError, HalError};
use labkit_common::hal::platform::{DynInput, DynInterruptInput, DynOutput, Platform};
use labkit_common::hal::types::{McuPin, Pull};
use labkit_common::io::role::{ConnectorName, PinRole};
use std::fmt;
use tracing::trace;

use crate::bus::{SharedI2c, SharedSpi};
use crate::expander::ExpanderPin;

// ─── PhysicalPin ────────────────────────────────────────────────────

/// Where a logical pin physically lives.
#[derive(Debug, Clone)]
pub enum PhysicalPin {
    /// Wired straight to the microcontroller.
    Mcu(McuPin),
    /// Routed through an I/O expander.
    Expander(ExpanderPin),
}

impl PhysicalPin {
    /// Whether the line is routed through an expander.
    pub fn is_expander(&self) -> bool {
        matches!(self, Self::Expander(_))
    }

    /// Whether edge interrupts can be delivered for this pin.
    pub fn supports_interrupt(&self, platform: &dyn Platform) -> bool {
        match self {
            Self::Mcu(pin) => platform.supports_interrupt(*pin),
            Self::Expander(pin) => pin.supports_interrupt(),
        }
    }

    /// Open the pin as a push-pull output.
    pub fn open_output(
        &self,
        platform: &dyn Platform,
        initial: PinState,
    ) -> Result<DynOutput, HalError> {
        match self {
            Self::Mcu(pin) => Ok(platform.output(*pin, initial)?),
            Self::Expander(pin) => Ok(Box::new(pin.clone().into_output(initial)?)),
        }
    }

    /// Open the pin as a plain input.
    pub fn open_input(&self, platform: &dyn Platform, pull: Pull) -> Result<DynInput, HalError> {
        match self {
            Self::Mcu(pin) => Ok(platform.input(*pin, pull)?),
            Self::Expander(pin) => Ok(Box::new(pin.clone().into_input(pull)?)),
        }
    }

    /// Open the pin as an interrupt-capable input.
    pub fn open_interrupt_input(
        &self,
        platform: &dyn Platform,
        pull: Pull,
    ) -> Result<DynInterruptInput, HalError> {
        match self {
            Self::Mcu(pin) => Ok(platform.interrupt_input(*pin, pull)?),
            Self::Expander(pin) => {
                if !pin.supports_interrupt() {
                    return Err(BusError::Unavailable(format!(
                        "expander {:#04x} has no interrupt line",
                        pin.address()
                    ))
                    .into());
                }
                Ok(Box::new(pin.clone().into_input(pull)?))
            }
        }
    }
}

impl fmt::Display for PhysicalPin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mcu(pin) => write!(f, "{pin}"),
            Self::Expander(pin) => write!(f, "{:#04x}:GP{}", pin.address(), pin.index()),
        }
    }
}

impl From<McuPin> for PhysicalPin {
    fn from(pin: McuPin) -> Self {
        Self::Mcu(pin)
    }
}

impl From<ExpanderPin> for PhysicalPin {
    fn from(pin: ExpanderPin) -> Self {
        Self::Expander(pin)
    }
}

// ─── PinMapping ─────────────────────────────────────────────────────

/// One `(role, physical pin)` binding.
#[derive(Debug, Clone)]
pub struct PinAlias {
    /// Logical role on the header.
    pub role: PinRole,
    /// Where the role is wired.
    pub pin: PhysicalPin,
}

/// Ordered role-to-pin bindings.
///
/// A role may appear more than once when it was wired in alternate ways
/// across board variants; lookups return the first binding in insertion
/// order.
#[derive(Debug, Clone, Default)]
pub struct PinMapping {
    aliases: Vec<PinAlias>,
}

impl PinMapping {
    /// Empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a binding. An earlier binding for the same role wins.
    pub fn push(&mut self, role: PinRole, pin: impl Into<PhysicalPin>) {
        self.aliases.push(PinAlias {
            role,
            pin: pin.into(),
        });
    }

    /// Builder form of [`PinMapping::push`].
    pub fn with(mut self, role: PinRole, pin: impl Into<PhysicalPin>) -> Self {
        self.push(role, pin);
        self
    }

    /// First binding for `role`.
    pub fn get(&self, role: PinRole) -> Option<&PhysicalPin> {
        self.aliases
            .iter()
            .find(|alias| alias.role == role)
            .map(|alias| &alias.pin)
    }

    /// Distinct bound roles, in first-binding order.
    pub fn roles(&self) -> Vec<PinRole> {
        let mut roles = Vec::with_capacity(self.aliases.len());
        for alias in &self.aliases {
            if !roles.contains(&alias.role) {
                roles.push(alias.role);
            }
        }
        roles
    }

    /// Bindings in insertion order, duplicates included.
    pub fn iter(&self) -> impl Iterator<Item = &PinAlias> {
        self.aliases.iter()
    }

    /// Number of bindings, duplicates included.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

// ─── Bus mapping ────────────────────────────────────────────────────

/// Shared bus routed to a header.
#[derive(Clone)]
pub enum BusHandle {
    /// Shared SPI bus.
    Spi(SharedSpi),
    /// Shared I2C bus.
    I2c(SharedI2c),
    /// Platform serial port name.
    Uart(&'static str),
}

impl fmt::Debug for BusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spi(_) => f.write_str("Spi"),
            Self::I2c(_) => f.write_str("I2c"),
            Self::Uart(port) => write!(f, "Uart({port})"),
        }
    }
}

/// A bus plus the header roles that carry it.
#[derive(Debug, Clone)]
pub struct BusMapping {
    /// The bus instance.
    pub handle: BusHandle,
    /// Header roles that carry this bus.
    pub roles: Vec<PinRole>,
}

// ─── Connector ──────────────────────────────────────────────────────

/// One expansion header. Read-only once built.
#[derive(Debug, Clone)]
pub struct Connector {
    name: ConnectorName,
    mapping: PinMapping,
    buses: Vec<BusMapping>,
}

impl Connector {
    /// Connector without bus metadata.
    pub fn new(name: ConnectorName, mapping: PinMapping) -> Self {
        Self {
            name,
            mapping,
            buses: Vec::new(),
        }
    }

    /// Attach a bus, keeping only the roles actually bound on this header.
    pub fn with_bus(mut self, handle: BusHandle, roles: &[PinRole]) -> Self {
        let bound: Vec<PinRole> = roles
            .iter()
            .copied()
            .filter(|role| self.mapping.get(*role).is_some())
            .collect();
        if bound.len() == roles.len() {
            self.buses.push(BusMapping {
                handle,
                roles: bound,
            });
        } else {
            trace!("{}: {:?} bus incomplete, not attached", self.name, handle);
        }
        self
    }

    /// Which header this is.
    pub fn name(&self) -> ConnectorName {
        self.name
    }

    /// Physical pin bound to `role`.
    ///
    /// # Errors
    /// `HalError::PinNotConnected` when this board leaves the role unwired.
    pub fn pin(&self, role: PinRole) -> Result<&PhysicalPin, HalError> {
        self.mapping.get(role).ok_or_else(|| {
            trace!("{}: role {} not wired", self.name, role);
            HalError::PinNotConnected {
                connector: self.name,
                role,
            }
        })
    }

    /// Like [`Connector::pin`], with the role given by its silkscreen name.
    pub fn pin_named(&self, role: &str) -> Result<&PhysicalPin, HalError> {
        let role: PinRole = role.parse().map_err(HalError::UnknownPinRole)?;
        self.pin(role)
    }

    /// Whether `role` is wired.
    pub fn has(&self, role: PinRole) -> bool {
        self.mapping.get(role).is_some()
    }

    /// Wired roles, in mapping order.
    pub fn roles(&self) -> Vec<PinRole> {
        self.mapping.roles()
    }

    /// Underlying role bindings.
    pub fn mapping(&self) -> &PinMapping {
        &self.mapping
    }

    /// Buses reachable through this header.
    pub fn buses(&self) -> &[BusMapping] {
        &self.buses
    }

    /// The SPI bus, if the header carries one.
    pub fn spi_bus(&self) -> Option<&SharedSpi> {
        self.buses.iter().find_map(|b| match &b.handle {
            BusHandle::Spi(spi) => Some(spi),
            _ => None,
        })
    }

    /// The I2C bus, if the header carries one.
    pub fn i2c_bus(&self) -> Option<&SharedI2c> {
        self.buses.iter().find_map(|b| match &b.handle {
            BusHandle::I2c(i2c) => Some(i2c),
            _ => None,
        })
    }

    /// Platform serial port name, if the header carries a UART.
    pub fn serial_port(&self) -> Option<&'static str> {
        self.buses.iter().find_map(|b| match b.handle {
            BusHandle::Uart(port) => Some(port),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mikrobus_without_reset() -> Connector {
        let mapping = PinMapping::new()
            .with(PinRole::An, McuPin("A00"))
            .with(PinRole::Cs, McuPin("D18"))
            .with(PinRole::Rx, McuPin("D28"))
            .with(PinRole::Tx, McuPin("D29"));
        Connector::new(ConnectorName::MikroBus1, mapping)
    }

    #[test]
    fn test_missing_role_is_pin_not_connected() {
        let connector = mikrobus_without_reset();
        match connector.pin(PinRole::Rst) {
            Err(HalError::PinNotConnected { connector, role }) => {
                assert_eq!(connector, ConnectorName::MikroBus1);
                assert_eq!(role, PinRole::Rst);
            }
            other => panic!("expected PinNotConnected, got {other:?}"),
        }
        assert!(connector.pin_named("CS").is_ok());
        assert!(matches!(
            connector.pin_named("RST"),
            Err(HalError::PinNotConnected { .. })
        ));
    }

    #[test]
    fn test_unknown_role_name() {
        let connector = mikrobus_without_reset();
        assert!(matches!(
            connector.pin_named("NSS"),
            Err(HalError::UnknownPinRole(name)) if name.contains("NSS")
        ));
    }

    #[test]
    fn test_duplicate_role_first_binding_wins() {
        let mapping = PinMapping::new()
            .with(PinRole::Rst, McuPin("D34"))
            .with(PinRole::Rst, McuPin("D35"))
            .with(PinRole::Int, McuPin("D10"));
        assert_eq!(mapping.len(), 3);
        assert_eq!(mapping.roles(), vec![PinRole::Rst, PinRole::Int]);
        match mapping.get(PinRole::Rst) {
            Some(PhysicalPin::Mcu(pin)) => assert_eq!(pin.name(), "D34"),
            other => panic!("unexpected binding {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_bus_is_not_attached() {
        let connector = mikrobus_without_reset()
            .with_bus(BusHandle::Uart("COM2"), &[PinRole::Rx, PinRole::Tx])
            .with_bus(BusHandle::Uart("COM9"), &[PinRole::Scl, PinRole::Sda]);
        assert_eq!(connector.buses().len(), 1);
        assert_eq!(connector.serial_port(), Some("COM2"));
        assert!(connector.i2c_bus().is_none());
    }

    #[test]
    fn test_display_formats_pin_location() {
        assert_eq!(PhysicalPin::Mcu(McuPin("D09")).to_string(), "D09");
    }
}
