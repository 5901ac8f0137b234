//! RS-485 transport for Modbus.
//!
//! Two ways to reach the transceiver, chosen per revision:
//!
//! - **Direct**: a platform UART plus a driver-enable output.
//! - **Bridged**: a channel of the I2C UART bridge in RS-485 mode, which
//!   switches direction itself.
//!
//! Both get the same two timing hooks. A one-byte dummy write right after
//! opening warms up the transmit path so the first real frame is not
//! delayed. After every write the transport waits until the last bit has
//! left the wire before the enable line drops.

use labkit_common::consts::POST_WRITE_SLACK_MS;
use labkit_common::hal::error::{BusError, HalError};
use labkit_common::hal::platform::{DynOutput, DynSerial};
use labkit_common::hal::types::SerialConfig;
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Post-write delay in whole milliseconds.
///
/// Time on the wire for `byte_count` bytes of `data_bits` each, truncated,
/// plus a fixed slack of [`POST_WRITE_SLACK_MS`].
pub fn post_write_delay_ms(baud_rate: u32, data_bits: u8, byte_count: usize) -> u64 {
    let bit_ms = byte_count as u64 * u64::from(data_bits) * 1000;
    bit_ms / u64::from(baud_rate.max(1)) + POST_WRITE_SLACK_MS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// How the transport reaches the RS-485 transceiver.
pub enum TransportKind {
    /// Platform UART plus driver-enable pin.
    Direct,
    /// UART bridge channel with automatic direction.
    Bridged,
}

/// Open Modbus serial link.
pub struct ModbusTransport {
    kind: TransportKind,
    port: DynSerial,
    enable: Option<DynOutput>,
    config: SerialConfig,
}

impl ModbusTransport {
    /// Platform UART with a driver-enable line.
    pub fn direct(
        port: DynSerial,
        enable: DynOutput,
        config: &SerialConfig,
    ) -> Result<Self, HalError> {
        Self::open(TransportKind::Direct, port, Some(enable), config)
    }

    /// Bridge channel with automatic direction control.
    pub fn bridged(port: DynSerial, config: &SerialConfig) -> Result<Self, HalError> {
        Self::open(TransportKind::Bridged, port, None, config)
    }

    fn open(
        kind: TransportKind,
        mut port: DynSerial,
        mut enable: Option<DynOutput>,
        config: &SerialConfig,
    ) -> Result<Self, HalError> {
        port.set_timeouts(config.timeout, config.timeout);
        if let Some(enable) = enable.as_mut() {
            enable.set_low()?;
        }

        // Warm-up byte; sent with the driver disabled on direct ports.
        port.write_all(&[0x00]).map_err(map_timeout)?;
        port.flush().map_err(map_timeout)?;
        thread::sleep(Duration::from_millis(post_write_delay_ms(
            config.baud_rate,
            config.data_bits,
            1,
        )));

        debug!(
            "Modbus transport open ({:?}, {} baud, {} data bits)",
            kind, config.baud_rate, config.data_bits
        );
        Ok(Self {
            kind,
            port,
            enable,
            config: *config,
        })
    }

    /// Direct or bridged.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Settings the port was opened with.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Delay applied after writing `byte_count` bytes.
    pub fn post_write_delay(&self, byte_count: usize) -> Duration {
        Duration::from_millis(post_write_delay_ms(
            self.config.baud_rate,
            self.config.data_bits,
            byte_count,
        ))
    }

    /// Send one frame and hold the line until it has been shifted out.
    pub fn write(&mut self, frame: &[u8]) -> Result<(), HalError> {
        if let Some(enable) = self.enable.as_mut() {
            enable.set_high()?;
        }
        let result = self
            .port
            .write_all(frame)
            .and_then(|()| self.port.flush())
            .map_err(map_timeout);

        let delay = self.post_write_delay(frame.len());
        trace!("wrote {} bytes, holding {:?}", frame.len(), delay);
        thread::sleep(delay);

        if let Some(enable) = self.enable.as_mut() {
            enable.set_low()?;
        }
        result
    }

    /// Read whatever is available, waiting up to the configured timeout.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, HalError> {
        self.port.read(buf).map_err(map_timeout)
    }

    /// Fill `buf` completely.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..])?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ModbusTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModbusTransport")
            .field("kind", &self.kind)
            .field("config", &self.config)
            .finish()
    }
}

fn map_timeout(e: BusError) -> HalError {
    match e {
        BusError::Timeout => HalError::TransportTimeout,
        other => HalError::Bus(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_eight_bytes_19200() {
        assert_eq!(post_write_delay_ms(19_200, 8, 8), 6);
    }

    #[test]
    fn test_delay_grows_with_frame_length() {
        // 256 * 8 * 1000 / 9600 = 213.3
        assert_eq!(post_write_delay_ms(9_600, 8, 256), 216);
        assert_eq!(post_write_delay_ms(115_200, 8, 1), 3);
        assert_eq!(post_write_delay_ms(19_200, 7, 0), 3);
    }

    #[test]
    fn test_timeout_maps_to_transport_timeout() {
        assert!(matches!(map_timeout(BusError::Timeout), HalError::TransportTimeout));
        assert!(matches!(map_timeout(BusError::Nack), HalError::Bus(BusError::Nack)));
    }
}
