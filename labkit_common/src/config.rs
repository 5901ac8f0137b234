//! Configuration loading traits and types.
//!
//! This module provides a standardized way to load the board TOML
//! configuration used by labkit applications and tools.
//!
//! # Usage
//!
//! ```rust,no_run
//! use labkit_common::config::{ConfigLoader, ConfigError, LabConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = LabConfig::load(Path::new("lab.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::consts::{
    DEFAULT_I2C_FREQUENCY_HZ, DEFAULT_MODBUS_BAUD, DEFAULT_MODBUS_DATA_BITS, DEFAULT_SPI_CLOCK_HZ,
    TRANSPORT_TIMEOUT,
};
use crate::hal::types::{
    HardwareRevision, I2cConfig, McuFamily, Parity, SerialConfig, SpiConfig, SpiMode, StopBits,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Filter directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared across all labkit applications.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "labkit-probe"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "labkit".to_string(),
        }
    }
}

// ─── Board ──────────────────────────────────────────────────────────

/// Board-level bring-up settings.
///
/// `family` is the construction-time choice that separates V3 from V4;
/// the bus probe cannot tell them apart. When unset, the family reported
/// by the platform is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Microcontroller family override.
    pub family: Option<McuFamily>,
    /// Shared SPI bus clock.
    pub spi_clock_hz: u32,
    /// Shared SPI bus mode (0-3).
    pub spi_mode: u8,
    /// Shared I2C bus clock.
    pub i2c_frequency_hz: u32,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            family: None,
            spi_clock_hz: DEFAULT_SPI_CLOCK_HZ,
            spi_mode: 0,
            i2c_frequency_hz: DEFAULT_I2C_FREQUENCY_HZ,
        }
    }
}

impl BoardConfig {
    /// Validate bus settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spi_clock_hz == 0 {
            return Err(ConfigError::ValidationError(
                "board.spi_clock_hz must be > 0".to_string(),
            ));
        }
        if self.i2c_frequency_hz == 0 {
            return Err(ConfigError::ValidationError(
                "board.i2c_frequency_hz must be > 0".to_string(),
            ));
        }
        SpiMode::from_index(self.spi_mode).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "board.spi_mode must be 0-3, got {}",
                self.spi_mode
            ))
        })?;
        Ok(())
    }

    /// SPI settings for bus provisioning.
    pub fn spi(&self) -> SpiConfig {
        SpiConfig {
            frequency_hz: self.spi_clock_hz,
            mode: SpiMode::from_index(self.spi_mode).unwrap_or_default(),
        }
    }

    /// I2C settings for bus provisioning.
    pub fn i2c(&self) -> I2cConfig {
        I2cConfig {
            frequency_hz: self.i2c_frequency_hz,
        }
    }
}

// ─── Modbus ─────────────────────────────────────────────────────────

/// Default serial settings for the RS-485/Modbus port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    /// Read and write timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_MODBUS_BAUD,
            data_bits: DEFAULT_MODBUS_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout_ms: TRANSPORT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ModbusConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "modbus.baud_rate must be > 0".to_string(),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(ConfigError::ValidationError(format!(
                "modbus.data_bits must be 5-8, got {}",
                self.data_bits
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "modbus.timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Serial settings handed to the transport factory.
    pub fn serial(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

// ─── Simulation ─────────────────────────────────────────────────────

/// Simulated board description, used by tools running without hardware.
///
/// ```toml
/// [simulation]
/// revision = "v2.3"
/// missing = [0x23]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Revision string of the simulated board (`"v1.x"`, `"v2.3"`, ...).
    pub revision: String,
    /// I2C addresses of chips left unpopulated.
    pub missing: Vec<u8>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            revision: "v2.x".to_string(),
            missing: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Parsed revision tag.
    pub fn revision(&self) -> Result<HardwareRevision, ConfigError> {
        self.revision
            .parse()
            .map_err(|e: String| ConfigError::ValidationError(format!("simulation.revision: {e}")))
    }
}

// ─── Top level ──────────────────────────────────────────────────────

/// Complete labkit configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub modbus: ModbusConfig,
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

impl LabConfig {
    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.board.validate()?;
        self.modbus.validate()?;
        if let Some(sim) = &self.simulation {
            sim.revision()?;
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"")
                .unwrap()
                .level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"warn\"")
                .unwrap()
                .level,
            LogLevel::Warn
        );
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = LabConfig::load(Path::new("/nonexistent/path/lab.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = LabConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = LabConfig::load(file.path()).unwrap();
        assert_eq!(config.board.family, None);
        assert_eq!(config.modbus.baud_rate, 19_200);
        assert_eq!(config.modbus.data_bits, 8);
        assert_eq!(config.modbus.parity, Parity::None);
        assert_eq!(config.modbus.stop_bits, StopBits::One);
        assert_eq!(config.modbus.serial().timeout, Duration::from_secs(5));
        assert!(config.simulation.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_modbus_data_bits_rejected() {
        let config = ModbusConfig {
            data_bits: 9,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("data_bits")
        ));
    }

    #[test]
    fn test_board_family_override() {
        #[derive(Deserialize)]
        struct Wrapper {
            board: BoardConfig,
        }
        let w: Wrapper = toml::from_str("[board]\nfamily = \"h7_core_compute\"").unwrap();
        assert_eq!(w.board.family, Some(McuFamily::H7CoreCompute));
        let w: Wrapper = toml::from_str("[board]\nfamily = \"rp2040\"").unwrap();
        assert_eq!(w.board.family, Some(McuFamily::Unsupported));
    }

    #[test]
    fn test_board_spi_mode_rejected() {
        let config = BoardConfig {
            spi_mode: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulation_revision_parsed() {
        let sim = SimulationConfig {
            revision: "v2.3".to_string(),
            missing: vec![],
        };
        assert_eq!(
            sim.revision().unwrap(),
            HardwareRevision::V2 { minor: Some(3) }
        );

        let bad = SimulationConfig {
            revision: "v9.1".to_string(),
            missing: vec![],
        };
        assert!(bad.revision().is_err());
    }
}
