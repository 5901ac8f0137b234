//! Simulated two-wire bus.
//!
//! Devices are either plain register files (expanders, sensors) or a model
//! of the UART bridge. Any address can be given a fault so that a probe
//! sees a NACK, a timeout or a panicking driver.

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};
use labkit_common::hal::error::BusError;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

/// Injected failure for one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Address not acknowledged.
    Nack,
    /// Transaction never completes.
    Timeout,
    /// The transaction panics, as a buggy driver would.
    Panic,
}

// ─── Devices ────────────────────────────────────────────────────────

/// 256 eight-bit registers with an auto-incrementing pointer.
#[derive(Debug, Clone)]
pub struct RegisterFile {
    regs: [u8; 256],
    pointer: u8,
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self {
            regs: [0; 256],
            pointer: 0,
        }
    }
}

impl RegisterFile {
    /// Preset one register.
    pub fn with(mut self, register: u8, value: u8) -> Self {
        self.regs[register as usize] = value;
        self
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&pointer, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = pointer;
        for &b in data {
            self.regs[self.pointer as usize] = b;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        for b in buf {
            *b = self.regs[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

const BRIDGE_FIFO: usize = 64;

/// Enough of the UART bridge for bring-up and byte traffic.
#[derive(Debug, Default, Clone)]
pub struct BridgeModel {
    regs: [[u8; 16]; 2],
    rx: [VecDeque<u8>; 2],
    tx: [Vec<u8>; 2],
    tx_stalled: [bool; 2],
    subaddress: u8,
}

impl BridgeModel {
    fn decode(subaddress: u8) -> (usize, usize) {
        let register = ((subaddress >> 3) & 0x0F) as usize;
        let channel = ((subaddress >> 1) & 0x01) as usize;
        (register, channel)
    }

    fn latched(&self, channel: usize) -> bool {
        self.regs[channel][0x03] & 0x80 != 0
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&sub, data)) = bytes.split_first() else {
            return;
        };
        self.subaddress = sub;
        let (register, channel) = Self::decode(sub);
        if register == 0x00 && !self.latched(channel) {
            self.tx[channel].extend_from_slice(data);
        } else if let Some(&value) = data.first() {
            self.regs[channel][register] = value;
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        let (register, channel) = Self::decode(self.subaddress);
        for b in buf {
            *b = match register {
                0x00 if !self.latched(channel) => self.rx[channel].pop_front().unwrap_or(0),
                // LSR: transmitter idle unless stalled, data-ready when RX is not empty.
                0x05 => {
                    let idle = if self.tx_stalled[channel] { 0x00 } else { 0x60 };
                    idle | u8::from(!self.rx[channel].is_empty())
                }
                0x08 if self.tx_stalled[channel] => 0,
                0x08 => BRIDGE_FIFO as u8,
                0x09 => self.rx[channel].len().min(BRIDGE_FIFO) as u8,
                r => self.regs[channel][r],
            };
        }
    }
}

#[derive(Debug, Clone)]
/// A chip on the simulated bus.
pub enum SimDevice {
    /// Plain register file, e.g. an expander or sensor.
    Registers(RegisterFile),
    /// Dual UART bridge.
    Bridge(BridgeModel),
}

impl SimDevice {
    fn write(&mut self, bytes: &[u8]) {
        match self {
            Self::Registers(d) => d.write(bytes),
            Self::Bridge(d) => d.write(bytes),
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        match self {
            Self::Registers(d) => d.read(buf),
            Self::Bridge(d) => d.read(buf),
        }
    }
}

// ─── Bus ────────────────────────────────────────────────────────────

#[derive(Default)]
struct BusState {
    devices: BTreeMap<u8, SimDevice>,
    faults: HashMap<u8, Fault>,
    writes: Vec<(u8, Vec<u8>)>,
}

/// The simulated bus. Clones share the same devices.
#[derive(Clone, Default)]
pub struct SimI2cBus {
    state: Arc<Mutex<BusState>>,
}

impl SimI2cBus {
    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Put `device` at `address`.
    pub fn attach(&self, address: u8, device: SimDevice) {
        self.lock().devices.insert(address, device);
    }

    /// Take the chip at `address` off the bus.
    pub fn remove(&self, address: u8) {
        self.lock().devices.remove(&address);
    }

    /// Whether a chip answers at `address`.
    pub fn is_attached(&self, address: u8) -> bool {
        self.lock().devices.contains_key(&address)
    }

    /// Make every transaction to `address` fail with `fault`.
    pub fn set_fault(&self, address: u8, fault: Fault) {
        self.lock().faults.insert(address, fault);
    }

    /// Undo [`SimI2cBus::set_fault`].
    pub fn clear_fault(&self, address: u8) {
        self.lock().faults.remove(&address);
    }

    /// Poke a register of a register-file device.
    pub fn set_register(&self, address: u8, register: u8, value: u8) {
        if let Some(SimDevice::Registers(d)) = self.lock().devices.get_mut(&address) {
            d.regs[register as usize] = value;
        }
    }

    /// Register of a register-file device.
    pub fn register(&self, address: u8, register: u8) -> Option<u8> {
        match self.lock().devices.get(&address) {
            Some(SimDevice::Registers(d)) => Some(d.regs[register as usize]),
            _ => None,
        }
    }

    /// Bytes the bridge at `address` has transmitted on `channel`.
    pub fn bridge_tx(&self, address: u8, channel: usize) -> Vec<u8> {
        match self.lock().devices.get(&address) {
            Some(SimDevice::Bridge(b)) => b.tx[channel].clone(),
            _ => Vec::new(),
        }
    }

    /// Queue bytes for the bridge at `address` to receive on `channel`.
    pub fn push_bridge_rx(&self, address: u8, channel: usize, bytes: &[u8]) {
        if let Some(SimDevice::Bridge(b)) = self.lock().devices.get_mut(&address) {
            b.rx[channel].extend(bytes);
        }
    }

    /// Keep the TX FIFO of `channel` full so writes never make progress.
    pub fn stall_bridge_tx(&self, address: u8, channel: usize, stalled: bool) {
        if let Some(SimDevice::Bridge(b)) = self.lock().devices.get_mut(&address) {
            b.tx_stalled[channel] = stalled;
        }
    }

    /// Bridge register of `channel`, as last written.
    pub fn bridge_register(&self, address: u8, channel: usize, register: u8) -> Option<u8> {
        match self.lock().devices.get(&address) {
            Some(SimDevice::Bridge(b)) => Some(b.regs[channel][register as usize & 0x0F]),
            _ => None,
        }
    }

    /// Every write transaction so far, as (address, bytes).
    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.lock().writes.clone()
    }
}

impl ErrorType for SimI2cBus {
    type Error = BusError;
}

impl I2c<SevenBitAddress> for SimI2cBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut guard = self.lock();
        match guard.faults.get(&address).copied() {
            Some(Fault::Nack) => return Err(BusError::Nack),
            Some(Fault::Timeout) => return Err(BusError::Timeout),
            Some(Fault::Panic) => {
                drop(guard);
                panic!("simulated driver fault at {address:#04x}");
            }
            None => {}
        }

        let state = &mut *guard;
        let device = state.devices.get_mut(&address).ok_or(BusError::Nack)?;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    device.write(&bytes[..]);
                    state.writes.push((address, bytes.to_vec()));
                }
                Operation::Read(buf) => device.read(&mut buf[..]),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_file_auto_increment() {
        let mut bus = SimI2cBus::default();
        bus.attach(0x23, SimDevice::Registers(RegisterFile::default()));
        bus.write(0x23, &[0x10, 0xAA, 0xBB]).unwrap();
        let mut buf = [0u8; 2];
        bus.write_read(0x23, &[0x10], &mut buf).unwrap();
        assert_eq!(buf, [0xAA, 0xBB]);
    }

    #[test]
    fn test_absent_device_nacks() {
        let mut bus = SimI2cBus::default();
        assert_eq!(bus.write(0x20, &[0x00]), Err(BusError::Nack));
    }

    #[test]
    fn test_faults_override_device() {
        let mut bus = SimI2cBus::default();
        bus.attach(0x27, SimDevice::Registers(RegisterFile::default()));
        bus.set_fault(0x27, Fault::Timeout);
        assert_eq!(bus.write(0x27, &[0x00]), Err(BusError::Timeout));
        bus.clear_fault(0x27);
        assert!(bus.write(0x27, &[0x00]).is_ok());
    }

    #[test]
    fn test_bridge_fifo_traffic() {
        let mut bus = SimI2cBus::default();
        bus.attach(0x4D, SimDevice::Bridge(BridgeModel::default()));
        // THR of channel A.
        bus.write(0x4D, &[0x00, 1, 2, 3]).unwrap();
        assert_eq!(bus.bridge_tx(0x4D, 0), vec![1, 2, 3]);

        bus.push_bridge_rx(0x4D, 0, &[9]);
        let mut level = [0u8; 1];
        bus.write_read(0x4D, &[0x09 << 3], &mut level).unwrap();
        assert_eq!(level[0], 1);
    }
}
