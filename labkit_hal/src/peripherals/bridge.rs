//! SC16IS752 dual UART behind I2C.
//!
//! Each channel is exposed as a [`SerialPort`], so the Modbus transport
//! treats a bridged port exactly like a native one. In RS-485 mode the
//! chip drives the transceiver direction from its RTS output; no separate
//! enable pin is needed.

use bitflags::bitflags;
use labkit_common::hal::error::{BusError, HalError};
use labkit_common::hal::platform::SerialPort;
use labkit_common::hal::types::{Parity, SerialConfig, StopBits};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::bus::SharedI2c;

/// Register numbers, before the channel sub-address shift.
pub mod reg {
    /// Receive holding register.
    pub const RHR: u8 = 0x00;
    /// Transmit holding register.
    pub const THR: u8 = 0x00;
    /// Divisor latch low (LCR bit 7 set).
    pub const DLL: u8 = 0x00;
    /// Divisor latch high (LCR bit 7 set).
    pub const DLH: u8 = 0x01;
    /// FIFO control.
    pub const FCR: u8 = 0x02;
    /// Line control.
    pub const LCR: u8 = 0x03;
    /// Line status.
    pub const LSR: u8 = 0x05;
    /// Scratch pad.
    pub const SPR: u8 = 0x07;
    /// Free space in the TX FIFO.
    pub const TXLVL: u8 = 0x08;
    /// Bytes waiting in the RX FIFO.
    pub const RXLVL: u8 = 0x09;
    /// Extra features control (RS-485).
    pub const EFCR: u8 = 0x0F;
}

bitflags! {
    /// Line control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lcr: u8 {
        /// Word length bit 0.
        const WORD_LEN_0   = 0x01;
        /// Word length bit 1.
        const WORD_LEN_1   = 0x02;
        /// Stop bit select.
        const STOP_BITS    = 0x04;
        /// Parity enable.
        const PARITY       = 0x08;
        /// Even parity select.
        const EVEN_PARITY  = 0x10;
        /// Divisor latch enable.
        const DIVISOR_LATCH = 0x80;
    }

    /// Line status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Lsr: u8 {
        /// Receive data ready.
        const DATA_READY = 0x01;
        /// Overrun error.
        const OVERRUN    = 0x02;
        /// Parity error.
        const PARITY_ERR = 0x04;
        /// Framing error.
        const FRAMING    = 0x08;
        /// Break interrupt.
        const BREAK      = 0x10;
        /// Transmit holding register empty.
        const THR_EMPTY  = 0x20;
        /// Transmitter empty.
        const TX_EMPTY   = 0x40;
        /// Error in receive FIFO.
        const FIFO_ERR   = 0x80;
    }

    /// Extra features control register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Efcr: u8 {
        /// RTS follows the transmitter (RS-485 direction).
        const RTSCON   = 0x10;
        /// RTS high while transmitting.
        const RTSINVER = 0x20;
    }
}

/// FIFO enable plus RX/TX FIFO reset.
const FCR_ENABLE_AND_RESET: u8 = 0x07;
const SCRATCH_PATTERN: u8 = 0x5A;
const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// One of the bridge's two UARTs.
pub enum UartChannel {
    /// Channel A.
    A = 0,
    /// Channel B.
    B = 1,
}

/// One channel of the bridge.
pub struct BridgeUart {
    i2c: SharedI2c,
    address: u8,
    channel: UartChannel,
    config: SerialConfig,
    read_timeout: Duration,
    write_timeout: Duration,
}

impl BridgeUart {
    /// Verify the chip answers and program the channel.
    pub fn open(
        i2c: SharedI2c,
        address: u8,
        channel: UartChannel,
        clock_hz: u32,
        config: &SerialConfig,
        rs485: bool,
    ) -> Result<Self, HalError> {
        let uart = Self {
            i2c,
            address,
            channel,
            config: *config,
            read_timeout: config.timeout,
            write_timeout: config.timeout,
        };

        uart.write_reg(reg::SPR, SCRATCH_PATTERN)?;
        let scratch = uart.read_reg(reg::SPR)?;
        if scratch != SCRATCH_PATTERN {
            return Err(HalError::Device(format!(
                "UART bridge at {address:#04x}: scratch read back {scratch:#04x}"
            )));
        }

        let divisor = divisor(clock_hz, config.baud_rate)?;
        let framing = line_control(config)?;
        uart.write_reg(reg::LCR, Lcr::DIVISOR_LATCH.bits())?;
        uart.write_reg(reg::DLL, (divisor & 0xFF) as u8)?;
        uart.write_reg(reg::DLH, (divisor >> 8) as u8)?;
        uart.write_reg(reg::LCR, framing.bits())?;
        uart.write_reg(reg::FCR, FCR_ENABLE_AND_RESET)?;

        let efcr = if rs485 {
            Efcr::RTSCON | Efcr::RTSINVER
        } else {
            Efcr::empty()
        };
        uart.write_reg(reg::EFCR, efcr.bits())?;

        debug!(
            "UART bridge {:#04x} channel {:?}: {} baud, divisor {}, rs485={}",
            address, channel, config.baud_rate, divisor, rs485
        );
        Ok(uart)
    }

    /// Channel this handle drives.
    pub fn channel(&self) -> UartChannel {
        self.channel
    }

    fn subaddress(&self, register: u8) -> u8 {
        (register << 3) | ((self.channel as u8) << 1)
    }

    fn write_reg(&self, register: u8, value: u8) -> Result<(), BusError> {
        self.i2c
            .write_register(self.address, self.subaddress(register), value)
    }

    fn read_reg(&self, register: u8) -> Result<u8, BusError> {
        self.i2c.read_register(self.address, self.subaddress(register))
    }

    /// Poll `register` until it is non-zero or `timeout` passes.
    fn wait_level(&self, register: u8, timeout: Duration) -> Result<u8, BusError> {
        let deadline = Instant::now() + timeout;
        loop {
            let level = self.read_reg(register)?;
            if level > 0 {
                return Ok(level);
            }
            if Instant::now() >= deadline {
                return Err(BusError::Timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Baud divisor for a x16 sampling clock.
pub fn divisor(clock_hz: u32, baud_rate: u32) -> Result<u16, HalError> {
    if baud_rate == 0 {
        return Err(HalError::Device("baud rate must be positive".into()));
    }
    let value = clock_hz / (16 * baud_rate);
    u16::try_from(value)
        .ok()
        .filter(|d| *d > 0)
        .ok_or_else(|| HalError::Device(format!("{baud_rate} baud unreachable from {clock_hz} Hz")))
}

fn line_control(config: &SerialConfig) -> Result<Lcr, HalError> {
    if !(5..=8).contains(&config.data_bits) {
        return Err(HalError::Device(format!(
            "{} data bits not supported",
            config.data_bits
        )));
    }
    let mut lcr = Lcr::from_bits_truncate(config.data_bits - 5);
    if config.stop_bits == StopBits::Two {
        lcr |= Lcr::STOP_BITS;
    }
    match config.parity {
        Parity::None => {}
        Parity::Odd => lcr |= Lcr::PARITY,
        Parity::Even => lcr |= Lcr::PARITY | Lcr::EVEN_PARITY,
    }
    Ok(lcr)
}

impl embedded_io::ErrorType for BridgeUart {
    type Error = BusError;
}

impl embedded_io::Read for BridgeUart {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let available = self.wait_level(reg::RXLVL, self.read_timeout)? as usize;
        let n = available.min(buf.len());
        for byte in &mut buf[..n] {
            *byte = self.read_reg(reg::RHR)?;
        }
        Ok(n)
    }
}

impl embedded_io::Write for BridgeUart {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let space = self.wait_level(reg::TXLVL, self.write_timeout)? as usize;
        let n = space.min(buf.len());
        let mut frame = Vec::with_capacity(n + 1);
        frame.push(self.subaddress(reg::THR));
        frame.extend_from_slice(&buf[..n]);
        self.i2c.write(self.address, &frame)?;
        Ok(n)
    }

    /// Wait until the transmitter is completely empty.
    fn flush(&mut self) -> Result<(), Self::Error> {
        let deadline = Instant::now() + self.write_timeout;
        loop {
            let lsr = Lsr::from_bits_truncate(self.read_reg(reg::LSR)?);
            if lsr.contains(Lsr::TX_EMPTY) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BusError::Timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl SerialPort for BridgeUart {
    fn set_timeouts(&mut self, read: Duration, write: Duration) {
        self.read_timeout = read;
        self.write_timeout = write;
    }

    fn config(&self) -> SerialConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divisor_for_modbus_defaults() {
        // 1.8432 MHz / (16 * 19200) = 6
        assert_eq!(divisor(1_843_200, 19_200).unwrap(), 6);
        assert_eq!(divisor(1_843_200, 9_600).unwrap(), 12);
        assert!(divisor(1_843_200, 0).is_err());
        assert!(divisor(1_843_200, 1_000_000).is_err());
    }

    #[test]
    fn test_line_control_8n1_and_7e2() {
        assert_eq!(line_control(&SerialConfig::default()).unwrap().bits(), 0x03);
        let config = SerialConfig {
            data_bits: 7,
            parity: Parity::Even,
            stop_bits: StopBits::Two,
            ..SerialConfig::default()
        };
        assert_eq!(line_control(&config).unwrap().bits(), 0x02 | 0x04 | 0x08 | 0x10);
    }

    #[test]
    fn test_line_control_rejects_nine_bits() {
        let config = SerialConfig {
            data_bits: 9,
            ..SerialConfig::default()
        };
        assert!(line_control(&config).is_err());
    }
}
