//! # labkit HAL Library
//!
//! Board capability layer: detects which board revision is present and
//! exposes a uniform set of peripherals and expansion connectors.
//!
//! # Module Structure
//!
//! - [`bus`] - Shared SPI/I2C handles and provisioning
//! - [`probe`] - Expander probe and revision detection
//! - [`revision`] - Per-revision wiring (V1..V4)
//! - [`core`] - `Board`, the capability surface
//! - [`slot`] - Fault containment and lazy construction
//! - [`expander`] - MCP23008 driver and borrowed pins
//! - [`connector`] - Named pin mappings for expansion headers
//! - [`peripherals`] - Chip drivers used by the wiring
//! - [`transport`] - RS-485/Modbus transport selection
//! - [`report`] - Board status report
//! - [`sim`] - Software platform for development and tests
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         labkit_hal                             │
//! │  ┌──────────┐   ┌──────────┐   ┌───────────────────────────┐   │
//! │  │  Buses   │──►│  Probe   │──►│  RevisionWiring (V1..V4)  │   │
//! │  └──────────┘   └──────────┘   └─────────────┬─────────────┘   │
//! │        ▲                                     │                 │
//! │        │                                     ▼                 │
//! │  ┌─────┴──────┐                    ┌──────────────────┐        │
//! │  │  Platform  │ (trait object)     │  Board (slots)   │        │
//! │  └────────────┘                    └──────────────────┘        │
//! └────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod bus;
pub mod connector;
pub mod core;
pub mod expander;
pub mod peripherals;
pub mod probe;
pub mod report;
pub mod revision;
pub mod sim;
pub mod slot;
pub mod transport;

// Re-export key types for convenience
pub use crate::core::{Board, BringupState};
pub use crate::connector::{Connector, PhysicalPin};
pub use crate::report::BoardReport;
pub use crate::slot::SlotStatus;
pub use crate::transport::ModbusTransport;
