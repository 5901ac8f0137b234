//! Platform API: the bus and pin primitives the capability layer consumes.
//!
//! Bus and pin handles are expressed as `embedded-hal` 1.0 and
//! `embedded-io` trait objects with a single error type, [`BusError`].
//! A platform backend (a real microcontroller port, or the simulation in
//! `labkit_hal::sim`) implements [`Platform`] and hands out boxed handles.
//!
//! # Ownership
//!
//! Every handle returned here is exclusively owned by its caller. Bus
//! sharing between several logical devices is done one layer up, in
//! `labkit_hal::bus`.

use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal::i2c::I2c;
use embedded_hal::pwm::SetDutyCycle;
use embedded_hal::spi::SpiBus;
use std::time::Duration;

use super::error::BusError;
use super::types::{I2cConfig, McuFamily, McuPin, Pull, SerialConfig, SpiConfig, Trigger};

/// Callback invoked from the platform's interrupt dispatch context.
pub type InterruptCallback = Box<dyn FnMut(PinState) + Send + 'static>;

/// Digital input with asynchronous edge interrupts.
///
/// Registering a new callback replaces the previous one.
pub trait InterruptInput: InputPin<Error = BusError> + Send {
    /// Register `callback` for the given edge(s).
    fn set_async_interrupt(
        &mut self,
        trigger: Trigger,
        callback: InterruptCallback,
    ) -> Result<(), BusError>;

    /// Remove the registered callback.
    fn clear_async_interrupt(&mut self) -> Result<(), BusError>;
}

/// PWM output with adjustable frequency.
pub trait PwmOutput: SetDutyCycle<Error = BusError> + Send {
    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), BusError>;
}

/// Byte-oriented serial port.
pub trait SerialPort:
    embedded_io::Read + embedded_io::Write + embedded_io::ErrorType<Error = BusError> + Send
{
    /// Deadline applied to each blocking read and write.
    fn set_timeouts(&mut self, read: Duration, write: Duration);

    /// Baud rate and framing currently applied.
    fn config(&self) -> SerialConfig;
}

pub type DynI2c = Box<dyn I2c<Error = BusError> + Send>;
pub type DynSpi = Box<dyn SpiBus<Error = BusError> + Send>;
pub type DynOutput = Box<dyn OutputPin<Error = BusError> + Send>;
pub type DynInput = Box<dyn InputPin<Error = BusError> + Send>;
pub type DynInterruptInput = Box<dyn InterruptInput>;
pub type DynPwm = Box<dyn PwmOutput>;
pub type DynSerial = Box<dyn SerialPort>;

/// The microcontroller the process runs on.
///
/// Implementations must be shareable across threads; the capability layer
/// keeps one `Arc<dyn Platform>` for the lifetime of the board.
pub trait Platform: Send + Sync {
    /// Family used to tell V3 from V4 boards.
    fn family(&self) -> McuFamily;

    /// Create the shared SPI bus. Called once per process.
    fn spi_bus(&self, config: &SpiConfig) -> Result<DynSpi, BusError>;

    /// Create the shared I2C bus. Called once per process.
    fn i2c_bus(&self, config: &I2cConfig) -> Result<DynI2c, BusError>;

    fn output(&self, pin: McuPin, initial: PinState) -> Result<DynOutput, BusError>;

    fn input(&self, pin: McuPin, pull: Pull) -> Result<DynInput, BusError>;

    /// Input with edge interrupts. Fails on pins without interrupt support.
    fn interrupt_input(&self, pin: McuPin, pull: Pull) -> Result<DynInterruptInput, BusError>;

    /// Whether `pin` can deliver edge interrupts on this part.
    fn supports_interrupt(&self, pin: McuPin) -> bool;

    fn pwm(&self, pin: McuPin, frequency_hz: u32) -> Result<DynPwm, BusError>;

    /// Open a named platform serial port.
    fn serial(&self, port: &str, config: &SerialConfig) -> Result<DynSerial, BusError>;
}
