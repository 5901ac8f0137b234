//! Software platform for development and tests.
//!
//! `SimPlatform` implements [`Platform`] without hardware: an I2C bus with
//! register-file chips, SPI that records what was sent, pins whose inputs
//! tests can drive, PWM channels and serial ports with a receive queue.
//! [`SimPlatform::board`] populates the chips a given revision carries;
//! any of them can then be removed or made to fail.

pub mod i2c;
pub mod pins;
pub mod serial;

use embedded_hal::digital::PinState;
use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};
use labkit_common::consts::{
    ENVIRONMENTAL_SENSOR_ADDRESS, HEADER_EXPANDER_ADDRESS, INTERNAL_EXPANDER_ADDRESS,
    LIGHT_SENSOR_ADDRESS, MOTION_SENSOR_ADDRESS, UART_BRIDGE_ADDRESS, VERSION_EXPANDER_ADDRESS,
};
use labkit_common::hal::error::BusError;
use labkit_common::hal::platform::{
    DynI2c, DynInput, DynInterruptInput, DynOutput, DynPwm, DynSerial, DynSpi, Platform,
};
use labkit_common::hal::types::{
    HardwareRevision, I2cConfig, McuFamily, McuPin, Pull, SerialConfig, SpiConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

pub use i2c::{BridgeModel, Fault, RegisterFile, SimDevice, SimI2cBus};
pub use pins::{PinBank, PwmRecord, SimInput, SimOutput, SimPwm};
pub use serial::{SerialBank, SimSerial};

/// Expander GPIO register; idle lines read high through the pull-ups.
const EXPANDER_GPIO: u8 = 0x09;

// ─── SPI ────────────────────────────────────────────────────────────

/// SPI bus that records written bytes and reads back zeros.
pub struct SimSpi {
    written: Arc<Mutex<Vec<u8>>>,
}

impl SpiErrorType for SimSpi {
    type Error = BusError;
}

impl SpiBus for SimSpi {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        words.fill(0);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(words);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        self.write(write)?;
        read.fill(0);
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        self.write(words)?;
        words.fill(0);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ─── Platform ───────────────────────────────────────────────────────

/// Simulated microcontroller.
pub struct SimPlatform {
    family: McuFamily,
    i2c: SimI2cBus,
    pins: Arc<PinBank>,
    serial: Arc<SerialBank>,
    spi_written: Arc<Mutex<Vec<u8>>>,
    fail_buses: AtomicBool,
    spi_acquired: AtomicUsize,
    i2c_acquired: AtomicUsize,
}

impl SimPlatform {
    /// Empty platform: no chips on the bus.
    pub fn new(family: McuFamily) -> Self {
        Self {
            family,
            i2c: SimI2cBus::default(),
            pins: Arc::new(PinBank::default()),
            serial: Arc::new(SerialBank::default()),
            spi_written: Arc::new(Mutex::new(Vec::new())),
            fail_buses: AtomicBool::new(false),
            spi_acquired: AtomicUsize::new(0),
            i2c_acquired: AtomicUsize::new(0),
        }
    }

    /// Platform populated with the chips of `revision`.
    pub fn board(revision: HardwareRevision) -> Self {
        let family = match revision {
            HardwareRevision::V1 | HardwareRevision::V2 { .. } => McuFamily::F7Feather,
            HardwareRevision::V3 { .. } => McuFamily::F7CoreCompute,
            HardwareRevision::V4 { .. } => McuFamily::H7CoreCompute,
        };
        let sim = Self::new(family);
        let bus = &sim.i2c;

        bus.attach(
            LIGHT_SENSOR_ADDRESS,
            // 300 counts = 250 lux
            SimDevice::Registers(RegisterFile::default().with(0x10, 0x01).with(0x11, 0x2C)),
        );
        bus.attach(
            ENVIRONMENTAL_SENSOR_ADDRESS,
            SimDevice::Registers(RegisterFile::default().with(0xD0, 0x61)),
        );
        bus.attach(
            MOTION_SENSOR_ADDRESS,
            SimDevice::Registers(RegisterFile::default().with(0x00, 0x24)),
        );

        if revision.has_expanders() {
            let expander = || SimDevice::Registers(RegisterFile::default().with(EXPANDER_GPIO, 0xFF));
            bus.attach(INTERNAL_EXPANDER_ADDRESS, expander());
            bus.attach(HEADER_EXPANDER_ADDRESS, expander());
            if let Some(minor) = revision.minor() {
                bus.attach(
                    VERSION_EXPANDER_ADDRESS,
                    SimDevice::Registers(RegisterFile::default().with(EXPANDER_GPIO, minor)),
                );
            }
        }

        if matches!(
            revision,
            HardwareRevision::V3 { .. } | HardwareRevision::V4 { .. }
        ) {
            bus.attach(UART_BRIDGE_ADDRESS, SimDevice::Bridge(BridgeModel::default()));
        }

        debug!("Simulated {} board ({:?})", revision, family);
        sim
    }

    /// Builder form of [`SimPlatform::remove_chip`].
    pub fn without(self, address: u8) -> Self {
        self.remove_chip(address);
        self
    }

    /// Take the chip at `address` off the bus.
    pub fn remove_chip(&self, address: u8) {
        self.i2c.remove(address);
    }

    /// See [`SimI2cBus::set_fault`].
    pub fn set_fault(&self, address: u8, fault: Fault) {
        self.i2c.set_fault(address, fault);
    }

    /// Make every later bus acquisition fail.
    pub fn fail_bus_acquisition(&self) {
        self.fail_buses.store(true, Ordering::Release);
    }

    /// Simulated I2C bus.
    pub fn i2c(&self) -> &SimI2cBus {
        &self.i2c
    }

    /// Simulated pins.
    pub fn pins(&self) -> &PinBank {
        &self.pins
    }

    /// Simulated UARTs.
    pub fn serial_ports(&self) -> &SerialBank {
        &self.serial
    }

    /// Drive an input pin level.
    pub fn drive_input(&self, pin: &'static str, high: bool) {
        self.pins.drive(pin, high);
    }

    /// Falling then rising edge, as an expander INT line does.
    pub fn pulse_low(&self, pin: &'static str) {
        self.pins.drive(pin, false);
        self.pins.drive(pin, true);
    }

    /// Bytes written on the SPI bus so far.
    pub fn spi_bytes_written(&self) -> usize {
        self.spi_written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// (SPI, I2C) acquisition counts.
    pub fn bus_acquisitions(&self) -> (usize, usize) {
        (
            self.spi_acquired.load(Ordering::Acquire),
            self.i2c_acquired.load(Ordering::Acquire),
        )
    }

    fn check_buses(&self, bus: &str) -> Result<(), BusError> {
        if self.fail_buses.load(Ordering::Acquire) {
            return Err(BusError::Unavailable(format!("{bus} controller disabled")));
        }
        Ok(())
    }
}

impl Platform for SimPlatform {
    fn family(&self) -> McuFamily {
        self.family
    }

    fn spi_bus(&self, config: &SpiConfig) -> Result<DynSpi, BusError> {
        self.check_buses("spi")?;
        self.spi_acquired.fetch_add(1, Ordering::AcqRel);
        debug!("sim: SPI at {} Hz", config.frequency_hz);
        Ok(Box::new(SimSpi {
            written: Arc::clone(&self.spi_written),
        }))
    }

    fn i2c_bus(&self, config: &I2cConfig) -> Result<DynI2c, BusError> {
        self.check_buses("i2c")?;
        self.i2c_acquired.fetch_add(1, Ordering::AcqRel);
        debug!("sim: I2C at {} Hz", config.frequency_hz);
        Ok(Box::new(self.i2c.clone()))
    }

    fn output(&self, pin: McuPin, initial: PinState) -> Result<DynOutput, BusError> {
        self.pins.open_output(pin.name(), initial);
        Ok(Box::new(SimOutput {
            bank: Arc::clone(&self.pins),
            name: pin.name(),
        }))
    }

    fn input(&self, pin: McuPin, pull: Pull) -> Result<DynInput, BusError> {
        self.pins.open_input(pin.name(), pull);
        Ok(Box::new(SimInput {
            bank: Arc::clone(&self.pins),
            name: pin.name(),
        }))
    }

    fn interrupt_input(&self, pin: McuPin, pull: Pull) -> Result<DynInterruptInput, BusError> {
        if !self.supports_interrupt(pin) {
            return Err(BusError::Unavailable(format!("{pin} has no edge interrupt")));
        }
        self.pins.open_input(pin.name(), pull);
        Ok(Box::new(SimInput {
            bank: Arc::clone(&self.pins),
            name: pin.name(),
        }))
    }

    fn supports_interrupt(&self, pin: McuPin) -> bool {
        self.pins.supports_interrupt(pin.name())
    }

    fn pwm(&self, pin: McuPin, frequency_hz: u32) -> Result<DynPwm, BusError> {
        self.pins.open_pwm(pin.name(), frequency_hz);
        Ok(Box::new(SimPwm {
            bank: Arc::clone(&self.pins),
            name: pin.name(),
        }))
    }

    fn serial(&self, port: &str, config: &SerialConfig) -> Result<DynSerial, BusError> {
        self.serial.open(port, config);
        Ok(Box::new(SimSerial {
            bank: Arc::clone(&self.serial),
            port: port.to_string(),
            config: *config,
            read_timeout: config.timeout,
            write_timeout: config.timeout,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_presets_populate_chips() {
        let v1 = SimPlatform::board(HardwareRevision::V1);
        assert_eq!(v1.family(), McuFamily::F7Feather);
        assert!(!v1.i2c().is_attached(INTERNAL_EXPANDER_ADDRESS));
        assert!(v1.i2c().is_attached(LIGHT_SENSOR_ADDRESS));

        let v2 = SimPlatform::board(HardwareRevision::V2 { minor: Some(3) });
        assert!(v2.i2c().is_attached(INTERNAL_EXPANDER_ADDRESS));
        assert_eq!(v2.i2c().register(VERSION_EXPANDER_ADDRESS, EXPANDER_GPIO), Some(3));

        let v2x = SimPlatform::board(HardwareRevision::V2 { minor: None });
        assert!(!v2x.i2c().is_attached(VERSION_EXPANDER_ADDRESS));

        let v4 = SimPlatform::board(HardwareRevision::V4 { minor: Some(1) });
        assert_eq!(v4.family(), McuFamily::H7CoreCompute);
        assert!(v4.i2c().is_attached(UART_BRIDGE_ADDRESS));
    }

    #[test]
    fn test_bus_acquisition_failure() {
        let sim = SimPlatform::new(McuFamily::F7Feather);
        sim.fail_bus_acquisition();
        let config = SpiConfig {
            frequency_hz: 1_000_000,
            mode: Default::default(),
        };
        assert!(sim.spi_bus(&config).is_err());
    }
}
