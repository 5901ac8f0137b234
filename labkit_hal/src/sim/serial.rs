//! Simulated platform serial ports.

use labkit_common::hal::error::BusError;
use labkit_common::hal::platform::SerialPort;
use labkit_common::hal::types::SerialConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Default)]
struct PortRecord {
    config: Option<SerialConfig>,
    opened: usize,
    rx: VecDeque<u8>,
    /// Transmitter never drains; writes block until their timeout.
    stalled: bool,
    /// One entry per `write` call.
    writes: Vec<Vec<u8>>,
}

/// All serial ports of one simulated microcontroller.
#[derive(Default)]
pub struct SerialBank {
    ports: Mutex<HashMap<String, PortRecord>>,
}

impl SerialBank {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, PortRecord>> {
        self.ports.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn open(&self, port: &str, config: &SerialConfig) {
        let mut ports = self.lock();
        let record = ports.entry(port.to_string()).or_default();
        record.opened += 1;
        record.config = Some(*config);
    }

    /// Queue bytes for `port` to receive.
    pub fn push_rx(&self, port: &str, bytes: &[u8]) {
        self.lock()
            .entry(port.to_string())
            .or_default()
            .rx
            .extend(bytes);
    }

    /// Stop (or restart) the transmitter of `port`.
    pub fn stall_tx(&self, port: &str, stalled: bool) {
        self.lock().entry(port.to_string()).or_default().stalled = stalled;
    }

    fn is_stalled(&self, port: &str) -> bool {
        self.lock().get(port).is_some_and(|r| r.stalled)
    }

    /// Everything transmitted on `port`, concatenated.
    pub fn tx(&self, port: &str) -> Vec<u8> {
        self.lock()
            .get(port)
            .map(|r| r.writes.concat())
            .unwrap_or_default()
    }

    /// Transmitted bytes of `port`, one entry per write call.
    pub fn writes(&self, port: &str) -> Vec<Vec<u8>> {
        self.lock()
            .get(port)
            .map(|r| r.writes.clone())
            .unwrap_or_default()
    }

    /// How many times `port` was opened.
    pub fn open_count(&self, port: &str) -> usize {
        self.lock().get(port).map_or(0, |r| r.opened)
    }

    /// Settings `port` was last opened with.
    pub fn config(&self, port: &str) -> Option<SerialConfig> {
        self.lock().get(port).and_then(|r| r.config)
    }
}

/// Simulated UART.
pub struct SimSerial {
    pub(crate) bank: Arc<SerialBank>,
    pub(crate) port: String,
    pub(crate) config: SerialConfig,
    pub(crate) read_timeout: Duration,
    pub(crate) write_timeout: Duration,
}

impl SimSerial {
    /// Block while the transmitter is stalled, up to the write timeout.
    fn wait_tx(&self) -> Result<(), BusError> {
        let deadline = Instant::now() + self.write_timeout;
        while self.bank.is_stalled(&self.port) {
            if Instant::now() >= deadline {
                return Err(BusError::Timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }
}

impl embedded_io::ErrorType for SimSerial {
    type Error = BusError;
}

impl embedded_io::Read for SimSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let deadline = Instant::now() + self.read_timeout;
        loop {
            {
                let mut ports = self.bank.lock();
                let record = ports.entry(self.port.clone()).or_default();
                if !record.rx.is_empty() {
                    let n = buf.len().min(record.rx.len());
                    for (slot, byte) in buf.iter_mut().zip(record.rx.drain(..n)) {
                        *slot = byte;
                    }
                    return Ok(n);
                }
            }
            if Instant::now() >= deadline {
                return Err(BusError::Timeout);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl embedded_io::Write for SimSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.wait_tx()?;
        self.bank
            .lock()
            .entry(self.port.clone())
            .or_default()
            .writes
            .push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.wait_tx()
    }
}

impl SerialPort for SimSerial {
    fn set_timeouts(&mut self, read: Duration, write: Duration) {
        self.read_timeout = read;
        self.write_timeout = write;
    }

    fn config(&self) -> SerialConfig {
        self.config
    }
}
