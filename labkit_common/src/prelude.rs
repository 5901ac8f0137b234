//! Prelude module for common re-exports.
//!
//! ```rust
//! use labkit_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LabConfig, SharedConfig};

// ─── Platform ───────────────────────────────────────────────────────
pub use crate::hal::error::{BringupFailure, BusError, HalError};
pub use crate::hal::platform::{
    DynI2c, DynInput, DynInterruptInput, DynOutput, DynPwm, DynSerial, DynSpi, InterruptInput,
    Platform, PwmOutput, SerialPort,
};
pub use crate::hal::types::{
    HardwareRevision, McuFamily, McuPin, Parity, Pull, SerialConfig, StopBits, Trigger,
};

// ─── Connectors ─────────────────────────────────────────────────────
pub use crate::io::role::{ConnectorName, PinRole};
