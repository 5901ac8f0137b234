//! On-board I2C sensors.
//!
//! Minimal drivers: construction talks to the chip (and checks its id
//! where it has one), so an absent or wrong part fails bring-up. Readings
//! are raw; compensation is left to the application.

use labkit_common::consts::{
    ENVIRONMENTAL_SENSOR_ADDRESS, LIGHT_SENSOR_ADDRESS, MOTION_SENSOR_ADDRESS,
};
use labkit_common::hal::error::HalError;
use tracing::debug;

use crate::bus::SharedI2c;

fn check_chip_id(
    i2c: &SharedI2c,
    address: u8,
    register: u8,
    expected: u8,
    part: &str,
) -> Result<(), HalError> {
    let id = i2c.read_register(address, register)?;
    if id != expected {
        return Err(HalError::Device(format!(
            "{part} at {address:#04x}: chip id {id:#04x}, expected {expected:#04x}"
        )));
    }
    Ok(())
}

// ─── BH1750 ─────────────────────────────────────────────────────────

const BH1750_POWER_ON: u8 = 0x01;
const BH1750_CONTINUOUS_HIGH_RES: u8 = 0x10;

/// BH1750 ambient light sensor.
#[derive(Clone)]
pub struct LightSensor {
    i2c: SharedI2c,
    address: u8,
}

impl LightSensor {
    /// Power the sensor on and start continuous measurement.
    pub fn new(i2c: SharedI2c) -> Result<Self, HalError> {
        let address = LIGHT_SENSOR_ADDRESS;
        i2c.write(address, &[BH1750_POWER_ON])?;
        i2c.write(address, &[BH1750_CONTINUOUS_HIGH_RES])?;
        debug!("BH1750 at {:#04x} measuring", address);
        Ok(Self { i2c, address })
    }

    /// Illuminance in lux.
    pub fn read_lux(&self) -> Result<f32, HalError> {
        let mut buf = [0u8; 2];
        self.i2c.read(self.address, &mut buf)?;
        Ok(f32::from(u16::from_be_bytes(buf)) / 1.2)
    }
}

// ─── BME68x ─────────────────────────────────────────────────────────

mod bme {
    pub const CHIP_ID_REG: u8 = 0xD0;
    pub const CHIP_ID: u8 = 0x61;
    pub const CTRL_HUM: u8 = 0x72;
    pub const CTRL_MEAS: u8 = 0x74;
    pub const DATA: u8 = 0x1F;
    /// Humidity oversampling x1.
    pub const OSRS_H_X1: u8 = 0x01;
    /// Temperature x2, pressure x16, forced mode.
    pub const MEAS_FORCED: u8 = (0b010 << 5) | (0b101 << 2) | 0b01;
}

/// Uncompensated BME68x conversion result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentalReading {
    /// Uncompensated 20-bit pressure.
    pub pressure_raw: u32,
    /// Uncompensated 20-bit temperature.
    pub temperature_raw: u32,
    /// Uncompensated humidity.
    pub humidity_raw: u16,
}

/// BME68x environmental sensor.
#[derive(Clone)]
pub struct EnvironmentalSensor {
    i2c: SharedI2c,
    address: u8,
}

impl EnvironmentalSensor {
    /// Check the chip id and set humidity oversampling.
    pub fn new(i2c: SharedI2c) -> Result<Self, HalError> {
        let address = ENVIRONMENTAL_SENSOR_ADDRESS;
        check_chip_id(&i2c, address, bme::CHIP_ID_REG, bme::CHIP_ID, "BME68x")?;
        i2c.write_register(address, bme::CTRL_HUM, bme::OSRS_H_X1)?;
        Ok(Self { i2c, address })
    }

    /// Trigger one forced-mode conversion and read the raw fields.
    pub fn read_raw(&self) -> Result<EnvironmentalReading, HalError> {
        self.i2c
            .write_register(self.address, bme::CTRL_MEAS, bme::MEAS_FORCED)?;
        let mut buf = [0u8; 8];
        self.i2c.write_read(self.address, &[bme::DATA], &mut buf)?;
        let raw20 = |b: &[u8]| (u32::from(b[0]) << 12) | (u32::from(b[1]) << 4) | (u32::from(b[2]) >> 4);
        Ok(EnvironmentalReading {
            pressure_raw: raw20(&buf[0..3]),
            temperature_raw: raw20(&buf[3..6]),
            humidity_raw: u16::from_be_bytes([buf[6], buf[7]]),
        })
    }
}

// ─── BMI270 ─────────────────────────────────────────────────────────

mod bmi {
    pub const CHIP_ID_REG: u8 = 0x00;
    pub const CHIP_ID: u8 = 0x24;
    pub const ACC_DATA: u8 = 0x0C;
    pub const PWR_CONF: u8 = 0x7C;
    pub const PWR_CTRL: u8 = 0x7D;
    pub const ACC_EN: u8 = 0x04;
}

/// BMI270 inertial sensor, accelerometer only.
#[derive(Clone)]
pub struct MotionSensor {
    i2c: SharedI2c,
    address: u8,
}

impl MotionSensor {
    /// Check the chip id and enable the accelerometer.
    pub fn new(i2c: SharedI2c) -> Result<Self, HalError> {
        let address = MOTION_SENSOR_ADDRESS;
        check_chip_id(&i2c, address, bmi::CHIP_ID_REG, bmi::CHIP_ID, "BMI270")?;
        // Leave advanced power save, then enable the accelerometer.
        i2c.write_register(address, bmi::PWR_CONF, 0x00)?;
        i2c.write_register(address, bmi::PWR_CTRL, bmi::ACC_EN)?;
        Ok(Self { i2c, address })
    }

    /// Raw acceleration, x/y/z.
    pub fn read_acceleration(&self) -> Result<[i16; 3], HalError> {
        let mut buf = [0u8; 6];
        self.i2c.write_read(self.address, &[bmi::ACC_DATA], &mut buf)?;
        Ok([
            i16::from_le_bytes([buf[0], buf[1]]),
            i16::from_le_bytes([buf[2], buf[3]]),
            i16::from_le_bytes([buf[4], buf[5]]),
        ])
    }
}

macro_rules! opaque_debug {
    ($($ty:ident),*) => {$(
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($ty), "({:#04x})"), self.address)
            }
        }
    )*};
}

opaque_debug!(LightSensor, EnvironmentalSensor, MotionSensor);
