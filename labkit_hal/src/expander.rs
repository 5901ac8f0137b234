//! MCP23008 I/O expander and expander-borrowed pins.
//!
//! An [`ExpanderHandle`] is owned by exactly one revision object. Pins taken
//! from it ([`ExpanderPin`]) hold only a weak back-reference plus a bit
//! index; once the handle is dropped every borrowed pin reports
//! `ExpanderGone` instead of touching the bus.
//!
//! Pin-change interrupts are delivered through the expander's INT line,
//! which is wired to a microcontroller interrupt pin. On each falling edge
//! the port is read once and per-pin handlers fire for the bits that
//! changed.

use bitflags::bitflags;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};
use labkit_common::hal::error::{BusError, HalError};
use labkit_common::hal::platform::{DynInterruptInput, InterruptCallback, InterruptInput};
use labkit_common::hal::types::{Pull, Trigger};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, trace, warn};

use crate::bus::SharedI2c;

/// MCP23008 register map.
pub mod reg {
    /// I/O direction, 1 = input.
    pub const IODIR: u8 = 0x00;
    /// Input polarity.
    pub const IPOL: u8 = 0x01;
    /// Interrupt-on-change enable.
    pub const GPINTEN: u8 = 0x02;
    /// Default compare value.
    pub const DEFVAL: u8 = 0x03;
    /// Interrupt compare mode.
    pub const INTCON: u8 = 0x04;
    /// Configuration.
    pub const IOCON: u8 = 0x05;
    /// Pull-up enable.
    pub const GPPU: u8 = 0x06;
    /// Interrupt flags.
    pub const INTF: u8 = 0x07;
    /// Port value captured at interrupt.
    pub const INTCAP: u8 = 0x08;
    /// Port value.
    pub const GPIO: u8 = 0x09;
    /// Output latch.
    pub const OLAT: u8 = 0x0A;
}

/// Number of I/O lines on one expander.
pub const PIN_COUNT: u8 = 8;

bitflags! {
    /// IOCON configuration bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IoCon: u8 {
        /// Disable register address auto-increment.
        const SEQOP  = 0x20;
        /// Disable SDA slew-rate control.
        const DISSLW = 0x10;
        /// Hardware address enable (SPI variant only).
        const HAEN   = 0x08;
        /// INT output open-drain.
        const ODR    = 0x04;
        /// INT output active-high.
        const INTPOL = 0x02;
    }
}

/// Cached copies of the writable configuration registers.
#[derive(Debug, Clone, Copy)]
struct Shadow {
    iodir: u8,
    gppu: u8,
    gpinten: u8,
    olat: u8,
}

struct PinHandler {
    trigger: Trigger,
    callback: Mutex<InterruptCallback>,
}

struct ExpanderInner {
    i2c: SharedI2c,
    address: u8,
    shadow: Mutex<Shadow>,
    handlers: Mutex<[Option<Arc<PinHandler>>; PIN_COUNT as usize]>,
    last_port: AtomicU8,
    interrupt_attached: AtomicBool,
}

impl ExpanderInner {
    fn shadow(&self) -> MutexGuard<'_, Shadow> {
        self.shadow.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set or clear one bit of a shadowed register and write it out.
    fn modify(
        &self,
        register: u8,
        field: fn(&mut Shadow) -> &mut u8,
        index: u8,
        set: bool,
    ) -> Result<(), BusError> {
        let mut shadow = self.shadow();
        let slot = field(&mut shadow);
        let value = if set {
            *slot | (1 << index)
        } else {
            *slot & !(1 << index)
        };
        if value != *slot {
            self.i2c.write_register(self.address, register, value)?;
            *slot = value;
        }
        Ok(())
    }

    fn read_port(&self) -> Result<u8, BusError> {
        self.i2c.read_register(self.address, reg::GPIO)
    }

    /// Handle one INT edge: read the port and fire handlers of changed bits.
    fn dispatch(&self) {
        let port = match self.read_port() {
            Ok(port) => port,
            Err(e) => {
                warn!("expander {:#04x}: interrupt read failed: {}", self.address, e);
                return;
            }
        };
        let changed = port ^ self.last_port.swap(port, Ordering::AcqRel);
        trace!(
            "expander {:#04x}: port={:#010b} changed={:#010b}",
            self.address, port, changed
        );
        if changed == 0 {
            return;
        }

        // Callbacks run without the table lock; a handler may clear itself.
        let handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner()).clone();
        for index in 0..PIN_COUNT {
            let mask = 1u8 << index;
            if changed & mask == 0 {
                continue;
            }
            if let Some(handler) = &handlers[index as usize] {
                let level = PinState::from(port & mask != 0);
                if handler.trigger.fires_on(level) {
                    let mut callback = handler.callback.lock().unwrap_or_else(|e| e.into_inner());
                    (*callback)(level);
                }
            }
        }
    }
}

// ─── ExpanderHandle ─────────────────────────────────────────────────

/// A brought-up MCP23008 at a fixed bus address.
pub struct ExpanderHandle {
    inner: Arc<ExpanderInner>,
    interrupt: Mutex<Option<DynInterruptInput>>,
}

impl ExpanderHandle {
    /// Talk to the chip at `address` and put it into a known state.
    ///
    /// # Errors
    /// Any bus failure (NACK, timeout) or a read-back mismatch.
    pub fn bring_up(i2c: SharedI2c, address: u8) -> Result<Self, HalError> {
        let iocon = IoCon::SEQOP;
        i2c.write_register(address, reg::IOCON, iocon.bits())?;
        let readback = i2c.read_register(address, reg::IOCON)?;
        if readback != iocon.bits() {
            return Err(HalError::Device(format!(
                "expander {address:#04x}: IOCON read back {readback:#04x}, wrote {:#04x}",
                iocon.bits()
            )));
        }

        // All inputs, no pull-ups, no interrupts.
        i2c.write_register(address, reg::IODIR, 0xFF)?;
        i2c.write_register(address, reg::GPPU, 0x00)?;
        i2c.write_register(address, reg::GPINTEN, 0x00)?;
        i2c.write_register(address, reg::INTCON, 0x00)?;
        let port = i2c.read_register(address, reg::GPIO)?;

        debug!("expander {:#04x} up, port={:#010b}", address, port);

        Ok(Self {
            inner: Arc::new(ExpanderInner {
                i2c,
                address,
                shadow: Mutex::new(Shadow {
                    iodir: 0xFF,
                    gppu: 0x00,
                    gpinten: 0x00,
                    olat: 0x00,
                }),
                handlers: Mutex::new(std::array::from_fn(|_| None)),
                last_port: AtomicU8::new(port),
                interrupt_attached: AtomicBool::new(false),
            }),
            interrupt: Mutex::new(None),
        })
    }

    /// Bus address.
    pub fn address(&self) -> u8 {
        self.inner.address
    }

    /// Read all eight input levels.
    pub fn read_port(&self) -> Result<u8, HalError> {
        Ok(self.inner.read_port()?)
    }

    /// Borrow line `index` (0-7).
    ///
    /// # Panics
    /// Panics if `index` is out of range; pin tables are static.
    pub fn pin(&self, index: u8) -> ExpanderPin {
        assert!(index < PIN_COUNT, "expander pin {index} out of range");
        ExpanderPin {
            expander: Arc::downgrade(&self.inner),
            address: self.inner.address,
            index,
        }
    }

    /// Route the expander's INT output through `line`.
    ///
    /// The handle keeps the line for as long as it lives.
    pub fn attach_interrupt(&self, mut line: DynInterruptInput) -> Result<(), HalError> {
        let weak = Arc::downgrade(&self.inner);
        line.set_async_interrupt(
            Trigger::FallingEdge,
            Box::new(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.dispatch();
                }
            }),
        )?;
        *self.interrupt.lock().unwrap_or_else(|e| e.into_inner()) = Some(line);
        self.inner.interrupt_attached.store(true, Ordering::Release);
        debug!("expander {:#04x}: interrupt line attached", self.address());
        Ok(())
    }

    /// Whether an INT line has been attached.
    pub fn has_interrupt(&self) -> bool {
        self.inner.interrupt_attached.load(Ordering::Acquire)
    }
}

impl Drop for ExpanderHandle {
    fn drop(&mut self) {
        let line = self.interrupt.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(line) = line.as_mut() {
            let _ = line.clear_async_interrupt();
        }
    }
}

// ─── ExpanderPin ────────────────────────────────────────────────────

/// Weak reference to one line of an expander.
#[derive(Clone)]
pub struct ExpanderPin {
    expander: Weak<ExpanderInner>,
    address: u8,
    index: u8,
}

impl std::fmt::Debug for ExpanderPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExpanderPin({:#04x}:GP{})", self.address, self.index)
    }
}

impl ExpanderPin {
    /// Bus address of the owning expander.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Line number, 0-7.
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Whether the owning expander is still alive.
    pub fn is_valid(&self) -> bool {
        self.expander.strong_count() > 0
    }

    /// Whether edge handlers on this line can fire, i.e. the expander's INT
    /// output reaches the microcontroller.
    pub fn supports_interrupt(&self) -> bool {
        self.expander
            .upgrade()
            .is_some_and(|inner| inner.interrupt_attached.load(Ordering::Acquire))
    }

    fn upgrade(&self) -> Result<Arc<ExpanderInner>, BusError> {
        self.expander.upgrade().ok_or_else(|| {
            BusError::Unavailable(format!("expander {:#04x} dropped", self.address))
        })
    }

    fn gone(&self) -> HalError {
        HalError::ExpanderGone(self.address)
    }

    /// Configure as a push-pull output.
    pub fn into_output(self, initial: PinState) -> Result<ExpanderOutput, HalError> {
        let inner = self.upgrade().map_err(|_| self.gone())?;
        inner.modify(
            reg::OLAT,
            |s| &mut s.olat,
            self.index,
            initial == PinState::High,
        )?;
        inner.modify(reg::IODIR, |s| &mut s.iodir, self.index, false)?;
        Ok(ExpanderOutput { pin: self })
    }

    /// Configure as an input. The MCP23008 has pull-ups only.
    pub fn into_input(self, pull: Pull) -> Result<ExpanderInput, HalError> {
        let inner = self.upgrade().map_err(|_| self.gone())?;
        if pull == Pull::Down {
            return Err(HalError::Device(format!(
                "expander {:#04x} has no pull-down on GP{}",
                self.address, self.index
            )));
        }
        inner.modify(reg::IODIR, |s| &mut s.iodir, self.index, true)?;
        inner.modify(reg::GPPU, |s| &mut s.gppu, self.index, pull == Pull::Up)?;
        Ok(ExpanderInput { pin: self })
    }
}

/// Expander line configured as output.
#[derive(Debug)]
pub struct ExpanderOutput {
    pin: ExpanderPin,
}

impl ErrorType for ExpanderOutput {
    type Error = BusError;
}

impl OutputPin for ExpanderOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin
            .upgrade()?
            .modify(reg::OLAT, |s| &mut s.olat, self.pin.index, false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin
            .upgrade()?
            .modify(reg::OLAT, |s| &mut s.olat, self.pin.index, true)
    }
}

/// Expander line configured as input, with interrupt support through the
/// expander's INT line.
#[derive(Debug)]
pub struct ExpanderInput {
    pin: ExpanderPin,
}

impl ErrorType for ExpanderInput {
    type Error = BusError;
}

impl InputPin for ExpanderInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let port = self.pin.upgrade()?.read_port()?;
        Ok(port & (1 << self.pin.index) != 0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

impl InterruptInput for ExpanderInput {
    fn set_async_interrupt(
        &mut self,
        trigger: Trigger,
        callback: InterruptCallback,
    ) -> Result<(), BusError> {
        let inner = self.pin.upgrade()?;
        let index = self.pin.index as usize;
        inner.handlers.lock().unwrap_or_else(|e| e.into_inner())[index] =
            Some(Arc::new(PinHandler {
                trigger,
                callback: Mutex::new(callback),
            }));
        // INTCON stays 0: compare against previous value, i.e. both edges.
        inner.modify(
            reg::GPINTEN,
            |s| &mut s.gpinten,
            self.pin.index,
            trigger != Trigger::Disabled,
        )
    }

    fn clear_async_interrupt(&mut self) -> Result<(), BusError> {
        let inner = self.pin.upgrade()?;
        inner.modify(reg::GPINTEN, |s| &mut s.gpinten, self.pin.index, false)?;
        inner.handlers.lock().unwrap_or_else(|e| e.into_inner())[self.pin.index as usize] = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{RegisterFile, SimDevice, SimI2cBus};
    use std::sync::atomic::AtomicUsize;

    const ADDRESS: u8 = 0x20;

    fn setup() -> (SimI2cBus, ExpanderHandle) {
        let bus = SimI2cBus::default();
        bus.attach(
            ADDRESS,
            SimDevice::Registers(RegisterFile::default().with(reg::GPIO, 0xFF)),
        );
        let handle = ExpanderHandle::bring_up(SharedI2c::new(Box::new(bus.clone())), ADDRESS)
            .expect("bring-up");
        (bus, handle)
    }

    #[test]
    fn test_bring_up_configures_all_inputs() {
        let (bus, handle) = setup();
        assert_eq!(bus.register(ADDRESS, reg::IOCON), Some(IoCon::SEQOP.bits()));
        assert_eq!(bus.register(ADDRESS, reg::IODIR), Some(0xFF));
        assert_eq!(handle.read_port().unwrap(), 0xFF);
    }

    #[test]
    fn test_output_updates_latch_and_direction() {
        let (bus, handle) = setup();
        let mut out = handle.pin(2).into_output(PinState::High).unwrap();
        assert_eq!(bus.register(ADDRESS, reg::OLAT), Some(0b0000_0100));
        assert_eq!(bus.register(ADDRESS, reg::IODIR), Some(0b1111_1011));
        out.set_low().unwrap();
        assert_eq!(bus.register(ADDRESS, reg::OLAT), Some(0x00));
    }

    #[test]
    fn test_borrowed_pin_invalid_after_handle_dropped() {
        let (bus, handle) = setup();
        let pin = handle.pin(3);
        let mut input = handle.pin(4).into_input(Pull::Up).unwrap();
        assert!(pin.is_valid());

        drop(handle);
        let writes_before = bus.writes().len();

        assert!(!pin.is_valid());
        assert!(!pin.supports_interrupt());
        assert!(matches!(
            pin.into_output(PinState::High),
            Err(HalError::ExpanderGone(ADDRESS))
        ));
        assert!(matches!(input.is_high(), Err(BusError::Unavailable(_))));
        // Nothing reached the bus once the owner was gone.
        assert_eq!(bus.writes().len(), writes_before);
    }

    #[test]
    fn test_dispatch_fires_changed_pin_only() {
        let (bus, handle) = setup();
        let fired = Arc::new(AtomicUsize::new(0));
        for index in [0, 1] {
            let counter = Arc::clone(&fired);
            let mut input = handle.pin(index).into_input(Pull::Up).unwrap();
            input
                .set_async_interrupt(
                    Trigger::Both,
                    Box::new(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .unwrap();
        }

        bus.set_register(ADDRESS, reg::GPIO, 0xFE);
        handle.inner.dispatch();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Same port again: nothing changed.
        handle.inner.dispatch();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handler_may_clear_its_own_interrupt() {
        let (bus, handle) = setup();
        let input = Arc::new(Mutex::new(Some(
            handle.pin(0).into_input(Pull::Up).unwrap(),
        )));
        let owned = Arc::clone(&input);
        input
            .lock()
            .unwrap()
            .as_mut()
            .unwrap()
            .set_async_interrupt(
                Trigger::Both,
                Box::new(move |_| {
                    // Last owner goes away from inside its own callback.
                    if let Some(mut line) = owned.lock().unwrap().take() {
                        line.clear_async_interrupt().unwrap();
                    }
                }),
            )
            .unwrap();
        assert_eq!(bus.register(ADDRESS, reg::GPINTEN), Some(0x01));

        bus.set_register(ADDRESS, reg::GPIO, 0xFE);
        handle.inner.dispatch();

        assert!(input.lock().unwrap().is_none());
        assert_eq!(bus.register(ADDRESS, reg::GPINTEN), Some(0x00));
        assert!(handle.inner.handlers.lock().unwrap()[0].is_none());
    }
}
