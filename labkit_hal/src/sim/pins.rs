//! Simulated GPIO and PWM.
//!
//! Every pin is a record keyed by its silkscreen name. Tests drive input
//! levels with [`PinBank::drive`]; a registered interrupt callback runs on
//! the calling thread, with no bank lock held.

use embedded_hal::digital::{ErrorType, InputPin, OutputPin, PinState};
use embedded_hal::pwm::{ErrorType as PwmErrorType, SetDutyCycle};
use labkit_common::hal::error::BusError;
use labkit_common::hal::platform::{InterruptCallback, InterruptInput, PwmOutput};
use labkit_common::hal::types::{Pull, Trigger};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

/// PWM resolution of the simulated timers.
pub const SIM_MAX_DUTY: u16 = 1000;

#[derive(Default)]
struct PinRecord {
    level: bool,
    driven: bool,
    opened: usize,
    history: Vec<bool>,
    interrupt: Option<(Trigger, InterruptCallback)>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Last PWM settings of one pin.
pub struct PwmRecord {
    /// Last frequency set.
    pub frequency_hz: u32,
    /// Last duty cycle set.
    pub duty: u16,
}

#[derive(Default)]
struct BankState {
    pins: HashMap<&'static str, PinRecord>,
    pwm: HashMap<&'static str, PwmRecord>,
    no_interrupt: HashSet<&'static str>,
}

/// All pins of one simulated microcontroller.
#[derive(Default)]
pub struct PinBank {
    state: Mutex<BankState>,
}

impl PinBank {
    fn lock(&self) -> MutexGuard<'_, BankState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn open_output(&self, name: &'static str, initial: PinState) {
        let mut state = self.lock();
        let pin = state.pins.entry(name).or_default();
        pin.opened += 1;
        pin.driven = true;
        pin.level = initial == PinState::High;
        pin.history.push(pin.level);
    }

    pub(crate) fn open_input(&self, name: &'static str, pull: Pull) {
        let mut state = self.lock();
        let pin = state.pins.entry(name).or_default();
        pin.opened += 1;
        if !pin.driven {
            pin.level = pull == Pull::Up;
        }
    }

    pub(crate) fn open_pwm(&self, name: &'static str, frequency_hz: u32) {
        let mut state = self.lock();
        state.pins.entry(name).or_default().opened += 1;
        state.pwm.insert(
            name,
            PwmRecord {
                frequency_hz,
                duty: 0,
            },
        );
    }

    fn set_output(&self, name: &'static str, high: bool) {
        let mut state = self.lock();
        let pin = state.pins.entry(name).or_default();
        pin.level = high;
        pin.history.push(high);
    }

    fn level(&self, name: &'static str) -> bool {
        self.lock().pins.get(name).is_some_and(|p| p.level)
    }

    /// Whether `name` can raise edge interrupts.
    pub fn supports_interrupt(&self, name: &'static str) -> bool {
        !self.lock().no_interrupt.contains(name)
    }

    /// Mark `name` as lacking edge-interrupt support.
    pub fn disable_interrupt(&self, name: &'static str) {
        self.lock().no_interrupt.insert(name);
    }

    /// Drive an input to `high`, firing its interrupt on a matching edge.
    pub fn drive(&self, name: &'static str, high: bool) {
        let taken = {
            let mut state = self.lock();
            let pin = state.pins.entry(name).or_default();
            let changed = pin.level != high;
            pin.level = high;
            pin.driven = true;
            match pin.interrupt.take() {
                Some((trigger, callback)) if changed && trigger.fires_on(PinState::from(high)) => {
                    Some((trigger, callback))
                }
                other => {
                    pin.interrupt = other;
                    None
                }
            }
        };

        if let Some((trigger, mut callback)) = taken {
            callback(PinState::from(high));
            let mut state = self.lock();
            let pin = state.pins.entry(name).or_default();
            // Keep a callback registered from inside the handler.
            if pin.interrupt.is_none() {
                pin.interrupt = Some((trigger, callback));
            }
        }
    }

    /// Current level, if the pin was ever touched.
    pub fn level_of(&self, name: &'static str) -> Option<bool> {
        self.lock().pins.get(name).map(|p| p.level)
    }

    /// How many times the pin was opened.
    pub fn open_count(&self, name: &'static str) -> usize {
        self.lock().pins.get(name).map_or(0, |p| p.opened)
    }

    /// Output levels written to `name`, oldest first.
    pub fn history(&self, name: &'static str) -> Vec<bool> {
        self.lock()
            .pins
            .get(name)
            .map(|p| p.history.clone())
            .unwrap_or_default()
    }

    /// Whether an interrupt callback is registered.
    pub fn has_interrupt(&self, name: &'static str) -> bool {
        self.lock()
            .pins
            .get(name)
            .is_some_and(|p| p.interrupt.is_some())
    }

    /// Last PWM settings of `name`, if it was opened as PWM.
    pub fn pwm(&self, name: &'static str) -> Option<PwmRecord> {
        self.lock().pwm.get(name).copied()
    }

    fn set_interrupt(&self, name: &'static str, interrupt: Option<(Trigger, InterruptCallback)>) {
        self.lock().pins.entry(name).or_default().interrupt = interrupt;
    }

    fn update_pwm(&self, name: &'static str, f: impl FnOnce(&mut PwmRecord)) {
        f(self.lock().pwm.entry(name).or_default());
    }
}

// ─── Handles ────────────────────────────────────────────────────────

/// Simulated push-pull output.
pub struct SimOutput {
    pub(crate) bank: Arc<PinBank>,
    pub(crate) name: &'static str,
}

impl ErrorType for SimOutput {
    type Error = BusError;
}

impl OutputPin for SimOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bank.set_output(self.name, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bank.set_output(self.name, true);
        Ok(())
    }
}

/// Input, with interrupts when opened through `interrupt_input`.
pub struct SimInput {
    pub(crate) bank: Arc<PinBank>,
    pub(crate) name: &'static str,
}

impl ErrorType for SimInput {
    type Error = BusError;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.bank.level(self.name))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.bank.level(self.name))
    }
}

impl InterruptInput for SimInput {
    fn set_async_interrupt(
        &mut self,
        trigger: Trigger,
        callback: InterruptCallback,
    ) -> Result<(), BusError> {
        self.bank.set_interrupt(self.name, Some((trigger, callback)));
        Ok(())
    }

    fn clear_async_interrupt(&mut self) -> Result<(), BusError> {
        self.bank.set_interrupt(self.name, None);
        Ok(())
    }
}

/// Simulated PWM channel.
pub struct SimPwm {
    pub(crate) bank: Arc<PinBank>,
    pub(crate) name: &'static str,
}

impl PwmErrorType for SimPwm {
    type Error = BusError;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        SIM_MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        if duty > SIM_MAX_DUTY {
            return Err(BusError::Io(format!("duty {duty} above {SIM_MAX_DUTY}")));
        }
        self.bank.update_pwm(self.name, |p| p.duty = duty);
        Ok(())
    }
}

impl PwmOutput for SimPwm {
    fn set_frequency(&mut self, frequency_hz: u32) -> Result<(), BusError> {
        self.bank.update_pwm(self.name, |p| p.frequency_hz = frequency_hz);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_interrupt_fires_on_matching_edge_only() {
        let bank = Arc::new(PinBank::default());
        bank.open_input("D09", Pull::Up);
        let fired = Arc::new(AtomicUsize::new(0));
        let mut input = SimInput {
            bank: Arc::clone(&bank),
            name: "D09",
        };
        let counter = Arc::clone(&fired);
        input
            .set_async_interrupt(
                Trigger::FallingEdge,
                Box::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        bank.drive("D09", true); // no change
        bank.drive("D09", false); // falling
        bank.drive("D09", true); // rising
        bank.drive("D09", false); // falling
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert!(bank.has_interrupt("D09"));
    }

    #[test]
    fn test_output_history() {
        let bank = Arc::new(PinBank::default());
        bank.open_output("D02", PinState::Low);
        let mut out = SimOutput {
            bank: Arc::clone(&bank),
            name: "D02",
        };
        out.set_high().unwrap();
        out.set_low().unwrap();
        assert_eq!(bank.history("D02"), vec![false, true, false]);
        assert_eq!(bank.open_count("D02"), 1);
    }
}
