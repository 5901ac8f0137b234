//! Configuration file tests.
//!
//! Full `lab.toml` round through `ConfigLoader`: every section populated,
//! partial files falling back to defaults, and validation failures.

use labkit_common::config::{ConfigError, ConfigLoader, LabConfig, LogLevel};
use labkit_common::hal::types::{HardwareRevision, McuFamily, Parity, SpiMode, StopBits};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Write `content` as lab.toml and load it.
fn load(dir: &Path, content: &str) -> Result<LabConfig, ConfigError> {
    let path = dir.join("lab.toml");
    fs::write(&path, content).unwrap();
    LabConfig::load(&path)
}

#[test]
fn test_full_config() {
    let dir = TempDir::new().unwrap();
    let config = load(
        dir.path(),
        r#"
[shared]
log_level = "debug"
service_name = "bench-probe"

[board]
family = "f7_core_compute"
spi_clock_hz = 12000000
spi_mode = 3
i2c_frequency_hz = 100000

[modbus]
baud_rate = 9600
data_bits = 7
parity = "even"
stop_bits = "two"
timeout_ms = 250

[simulation]
revision = "v3.1"
missing = [0x23, 0x76]
"#,
    )
    .unwrap();
    config.validate().unwrap();

    assert_eq!(config.shared.log_level, LogLevel::Debug);
    assert_eq!(config.shared.service_name, "bench-probe");

    assert_eq!(config.board.family, Some(McuFamily::F7CoreCompute));
    let spi = config.board.spi();
    assert_eq!(spi.frequency_hz, 12_000_000);
    assert_eq!(spi.mode, SpiMode::from_index(3).unwrap());
    assert_eq!(config.board.i2c().frequency_hz, 100_000);

    let serial = config.modbus.serial();
    assert_eq!(serial.baud_rate, 9_600);
    assert_eq!(serial.data_bits, 7);
    assert_eq!(serial.parity, Parity::Even);
    assert_eq!(serial.stop_bits, StopBits::Two);
    assert_eq!(serial.timeout, Duration::from_millis(250));

    let sim = config.simulation.unwrap();
    assert_eq!(sim.revision().unwrap(), HardwareRevision::V3 { minor: Some(1) });
    assert_eq!(sim.missing, vec![0x23, 0x76]);
}

#[test]
fn test_partial_sections_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load(
        dir.path(),
        r#"
[modbus]
baud_rate = 38400
"#,
    )
    .unwrap();

    assert_eq!(config.modbus.baud_rate, 38_400);
    assert_eq!(config.modbus.data_bits, 8);
    assert_eq!(config.modbus.parity, Parity::None);
    assert_eq!(config.board.family, None);
    assert_eq!(config.shared.service_name, "labkit");
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_baud_rejected() {
    let dir = TempDir::new().unwrap();
    let config = load(dir.path(), "[modbus]\nbaud_rate = 0\n").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("baud_rate")
    ));
}

#[test]
fn test_bad_simulation_revision_rejected() {
    let dir = TempDir::new().unwrap();
    let config = load(dir.path(), "[simulation]\nrevision = \"v1.4\"\n").unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ValidationError(msg)) if msg.contains("simulation.revision")
    ));
}

#[test]
fn test_unknown_parity_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let result = load(dir.path(), "[modbus]\nparity = \"mark\"\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}
