//! Bus provisioning and sharing.
//!
//! The platform hands out exactly one SPI and one I2C bus per process.
//! `SharedI2c` and `SharedSpi` wrap them so every builder and peripheral
//! on the same physical bus multiplexes through one handle. Each
//! transaction holds the bus lock for its duration only.

use embedded_hal::i2c::{ErrorType as I2cErrorType, I2c, Operation, SevenBitAddress};
use labkit_common::config::BoardConfig;
use labkit_common::hal::error::{BusError, HalError};
use labkit_common::hal::platform::{DynI2c, DynSpi, Platform};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

// ─── I2C ────────────────────────────────────────────────────────────

/// Shared two-wire bus handle. Cloning shares the same physical bus.
#[derive(Clone)]
pub struct SharedI2c {
    inner: Arc<Mutex<DynI2c>>,
}

impl SharedI2c {
    /// Wrap the platform's I2C bus.
    pub fn new(bus: DynI2c) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bus)),
        }
    }

    // A panic inside a contained driver poisons the lock but leaves the
    // bus itself usable.
    fn lock(&self) -> MutexGuard<'_, DynI2c> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Plain write to `address`.
    pub fn write(&self, address: u8, bytes: &[u8]) -> Result<(), BusError> {
        self.lock().write(address, bytes)
    }

    /// Plain read from `address`.
    pub fn read(&self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.lock().read(address, buf)
    }

    /// Write then read in one transaction.
    pub fn write_read(&self, address: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), BusError> {
        self.lock().write_read(address, bytes, buf)
    }

    /// Write one 8-bit register.
    pub fn write_register(&self, address: u8, register: u8, value: u8) -> Result<(), BusError> {
        self.write(address, &[register, value])
    }

    /// Read one 8-bit register.
    pub fn read_register(&self, address: u8, register: u8) -> Result<u8, BusError> {
        let mut buf = [0u8; 1];
        self.write_read(address, &[register], &mut buf)?;
        Ok(buf[0])
    }
}

impl I2cErrorType for SharedI2c {
    type Error = BusError;
}

impl I2c<SevenBitAddress> for SharedI2c {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.lock().transaction(address, operations)
    }
}

// ─── SPI ────────────────────────────────────────────────────────────

/// Shared SPI bus handle. Chip-select is managed by each device.
#[derive(Clone)]
pub struct SharedSpi {
    inner: Arc<Mutex<DynSpi>>,
}

impl SharedSpi {
    /// Wrap the platform's SPI bus.
    pub fn new(bus: DynSpi) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bus)),
        }
    }

    /// Run `f` with exclusive access to the bus.
    ///
    /// Devices assert and release their chip-select inside `f` so that no
    /// other device can interleave a transfer.
    pub fn with_bus<R>(
        &self,
        f: impl FnOnce(&mut DynSpi) -> Result<R, BusError>,
    ) -> Result<R, BusError> {
        let mut bus = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let result = f(&mut bus);
        bus.flush()?;
        result
    }
}

// ─── Provisioning ───────────────────────────────────────────────────

/// The shared buses of one board.
#[derive(Clone)]
pub struct Buses {
    /// Display, touch and MikroBus SPI.
    pub spi: SharedSpi,
    /// Expanders, sensors, UART bridge, Qwiic.
    pub i2c: SharedI2c,
}

impl Buses {
    /// Acquire both buses from the platform.
    ///
    /// Unlike peripheral bring-up this is not contained: without the buses
    /// nothing else on the board can work.
    ///
    /// # Errors
    /// Returns `HalError::BusAcquisition` if either bus cannot be created.
    pub fn provision(platform: &dyn Platform, config: &BoardConfig) -> Result<Self, HalError> {
        let spi_config = config.spi();
        let spi = platform.spi_bus(&spi_config).map_err(|e| {
            error!("SPI bus acquisition failed: {}", e);
            HalError::BusAcquisition(format!("spi: {e}"))
        })?;

        let i2c_config = config.i2c();
        let i2c = platform.i2c_bus(&i2c_config).map_err(|e| {
            error!("I2C bus acquisition failed: {}", e);
            HalError::BusAcquisition(format!("i2c: {e}"))
        })?;

        info!(
            "Buses acquired: spi={}Hz {:?}, i2c={}Hz",
            spi_config.frequency_hz, spi_config.mode, i2c_config.frequency_hz
        );

        Ok(Self {
            spi: SharedSpi::new(spi),
            i2c: SharedI2c::new(i2c),
        })
    }
}
