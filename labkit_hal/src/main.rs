//! # labkit HAL Probe Binary
//!
//! Brings up a board and prints what came up and what did not.
//!
//! # Usage
//!
//! ```bash
//! # Simulated v2.3 board
//! labkit_hal --simulate --revision v2.3
//!
//! # Simulated v4 board with the light sensor missing, JSON output
//! labkit_hal -s --revision v4.1 --missing 0x23 --json
//!
//! # Build the deferred peripherals before reporting
//! labkit_hal -s --touch-lazy -v
//! ```

use clap::Parser;
use labkit_common::config::{ConfigError, ConfigLoader, LabConfig};
use labkit_common::hal::types::HardwareRevision;
use labkit_common::io::role::ConnectorName;
use labkit_hal::core::Board;
use labkit_hal::report::BoardReport;
use labkit_hal::sim::SimPlatform;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// labkit HAL - board revision probe and capability report
#[derive(Parser, Debug)]
#[command(name = "labkit_hal")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Detect the board revision and report its capability surface")]
#[command(long_about = None)]
struct Args {
    /// Path to the labkit configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run against the simulated platform
    #[arg(short = 's', long)]
    simulate: bool,

    /// Simulated revision (overrides [simulation].revision)
    #[arg(long, value_name = "vX.Y")]
    revision: Option<HardwareRevision>,

    /// I2C address of a chip to leave out (can be specified multiple times)
    #[arg(long, value_parser = parse_address, action = clap::ArgAction::Append)]
    missing: Vec<u8>,

    /// Build deferred peripherals and every connector before reporting
    #[arg(long)]
    touch_lazy: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs and the report in JSON format
    #[arg(long)]
    json: bool,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid I2C address {s:?}: {e}"))
}

fn main() {
    if let Err(e) = run() {
        error!("labkit_hal failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Tracing has to be up before a config error is reported.
    let (config, load_error) = load_config(args.config.as_deref());
    setup_tracing(&args, &config);
    if let Some(e) = load_error {
        return Err(e.into());
    }

    info!("labkit HAL v{} starting...", env!("CARGO_PKG_VERSION"));

    if !args.simulate {
        error!("No hardware backend is compiled into this build; use --simulate");
        std::process::exit(1);
    }

    let simulation = config.simulation.clone().unwrap_or_default();
    let revision = match args.revision {
        Some(revision) => revision,
        None => simulation.revision()?,
    };

    let sim = SimPlatform::board(revision);
    for address in simulation.missing.iter().chain(&args.missing) {
        info!("Leaving out chip at {:#04x}", address);
        sim.remove_chip(*address);
    }

    let board = Board::bring_up(Arc::new(sim), &config)?;

    if args.touch_lazy {
        // Failures land in the slots and show up in the report.
        let _ = board.display();
        let _ = board.rgb_led();
        let _ = board.touchscreen();
        for name in ConnectorName::ALL {
            if let Err(e) = board.connector(name) {
                warn!("{}: {}", name, e);
            }
        }
    }

    let report = BoardReport::from_board(&board);
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.to_text());
    }

    info!("labkit HAL done");
    Ok(())
}

/// Load the config file, falling back to defaults so logging can start.
///
/// The load error, if any, is handed back to be reported once the
/// subscriber is installed.
fn load_config(path: Option<&Path>) -> (LabConfig, Option<ConfigError>) {
    match path {
        None => (LabConfig::default(), None),
        Some(path) => match LabConfig::load(path) {
            Ok(config) => (config, None),
            Err(e) => (LabConfig::default(), Some(e)),
        },
    }
}

/// Setup tracing subscriber from CLI arguments and `[shared].log_level`.
fn setup_tracing(args: &Args, config: &LabConfig) {
    let directive = if args.verbose {
        "debug"
    } else {
        config.shared.log_level.as_directive()
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    // Logs go to stderr so the report on stdout stays parseable.
    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x23"), Ok(0x23));
        assert_eq!(parse_address("35"), Ok(35));
        assert!(parse_address("0x123").is_err());
    }

    #[test]
    fn test_missing_config_falls_back_and_keeps_error() {
        let (config, error) = load_config(Some(Path::new("/nonexistent/labkit.toml")));
        assert!(matches!(error, Some(ConfigError::FileNotFound)));
        assert_eq!(config.shared.service_name, "labkit");
    }

    #[test]
    fn test_no_config_path_uses_defaults() {
        let (config, error) = load_config(None);
        assert!(error.is_none());
        assert_eq!(config.modbus.baud_rate, 19_200);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from([
            "labkit_hal",
            "-s",
            "--revision",
            "v2.3",
            "--missing",
            "0x23",
            "--missing",
            "0x76",
        ]);
        assert!(args.simulate);
        assert_eq!(args.revision, Some(HardwareRevision::V2 { minor: Some(3) }));
        assert_eq!(args.missing, vec![0x23, 0x76]);
    }
}
