//! Fault containment and lazy initialization.
//!
//! Every optional peripheral lives in a slot. A slot is built once, either
//! eagerly ([`PeripheralSlot::contain`]) while the revision is wired, or on
//! first access ([`LazySlot::get_or_build`]). A failed build (an `Err` or a
//! panic inside the driver) is recorded as a [`BringupFailure`] and never
//! propagates past the slot. Slots never rebuild.

use labkit_common::hal::error::{BringupFailure, HalError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Observable state of a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    /// Built successfully.
    Present,
    /// Build attempted and failed.
    Empty(BringupFailure),
    /// Lazy slot not yet accessed.
    Deferred,
}

impl SlotStatus {
    /// Whether the slot holds a peripheral.
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }
}

/// Run one bring-up attempt and convert any failure into a `BringupFailure`.
///
/// Both an `Err` return and a panic inside `build` end here.
pub fn contained<T>(
    peripheral: &'static str,
    build: impl FnOnce() -> Result<T, HalError>,
) -> Result<T, BringupFailure> {
    match panic::catch_unwind(AssertUnwindSafe(build)) {
        Ok(Ok(value)) => {
            info!("{} ready", peripheral);
            Ok(value)
        }
        Ok(Err(e)) => {
            let failure = match e {
                HalError::Bringup(inner) if inner.peripheral == peripheral => inner,
                // A dependency (e.g. an expander) was missing.
                HalError::Bringup(inner) => BringupFailure::new(peripheral, inner),
                other => BringupFailure::new(peripheral, other),
            };
            warn!("{} skipped: {}", peripheral, failure.reason);
            Err(failure)
        }
        Err(payload) => {
            let failure = BringupFailure::new(
                peripheral,
                format!("driver panicked: {}", panic_message(payload.as_ref())),
            );
            warn!("{} skipped: {}", peripheral, failure.reason);
            Err(failure)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ─── PeripheralSlot ─────────────────────────────────────────────────

/// Eagerly built, write-once peripheral holder.
pub struct PeripheralSlot<T> {
    name: &'static str,
    value: Result<Arc<T>, BringupFailure>,
}

impl<T> PeripheralSlot<T> {
    /// Attempt `build` now and keep whatever it produced.
    pub fn contain(name: &'static str, build: impl FnOnce() -> Result<T, HalError>) -> Self {
        Self {
            name,
            value: contained(name, build).map(Arc::new),
        }
    }

    /// Slot name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The peripheral, or the recorded reason it is missing.
    pub fn get(&self) -> Result<Arc<T>, HalError> {
        self.value.clone().map_err(HalError::Bringup)
    }

    /// Present, or empty with the failure.
    pub fn status(&self) -> SlotStatus {
        match &self.value {
            Ok(_) => SlotStatus::Present,
            Err(failure) => SlotStatus::Empty(failure.clone()),
        }
    }
}

// ─── LazySlot ───────────────────────────────────────────────────────

/// Peripheral holder built on first access.
///
/// Concurrent first accesses are serialized by the `OnceLock`: one caller
/// runs the build while the others block, then all of them observe the
/// same result. The build never runs twice, even if it failed.
pub struct LazySlot<T> {
    name: &'static str,
    cell: OnceLock<Result<Arc<T>, BringupFailure>>,
}

impl<T> LazySlot<T> {
    /// Slot that builds nothing until first access.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceLock::new(),
        }
    }

    /// Slot name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Return the peripheral, building it with `build` if this is the first
    /// access.
    pub fn get_or_build(
        &self,
        build: impl FnOnce() -> Result<T, HalError>,
    ) -> Result<Arc<T>, HalError> {
        self.cell
            .get_or_init(|| {
                debug!("building deferred {}", self.name);
                contained(self.name, build).map(Arc::new)
            })
            .clone()
            .map_err(HalError::Bringup)
    }

    /// Deferred until first access, then the outcome of the build.
    pub fn status(&self) -> SlotStatus {
        match self.cell.get() {
            None => SlotStatus::Deferred,
            Some(Ok(_)) => SlotStatus::Present,
            Some(Err(failure)) => SlotStatus::Empty(failure.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labkit_common::hal::error::BusError;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_contain_success() {
        let slot = PeripheralSlot::contain("speaker", || Ok(42u32));
        assert_eq!(*slot.get().unwrap(), 42);
        assert_eq!(slot.status(), SlotStatus::Present);
    }

    #[test]
    fn test_contain_error_leaves_slot_empty() {
        let slot: PeripheralSlot<u32> =
            PeripheralSlot::contain("light_sensor", || Err(BusError::Nack.into()));
        match slot.get() {
            Err(HalError::Bringup(failure)) => {
                assert_eq!(failure.peripheral, "light_sensor");
                assert!(failure.reason.contains("acknowledge"));
            }
            other => panic!("unexpected {:?}", other.map(|v| *v)),
        }
        assert!(!slot.status().is_present());
    }

    #[test]
    fn test_contain_panic_is_contained() {
        let slot: PeripheralSlot<u32> =
            PeripheralSlot::contain("motion_sensor", || panic!("register map mismatch"));
        let Err(HalError::Bringup(failure)) = slot.get() else {
            panic!("expected bring-up failure");
        };
        assert!(failure.reason.contains("register map mismatch"));
    }

    #[test]
    fn test_missing_dependency_is_named_in_reason() {
        let slot: PeripheralSlot<u32> = PeripheralSlot::contain("up_button", || {
            Err(BringupFailure::new("internal_expander", "not present").into())
        });
        let Err(HalError::Bringup(failure)) = slot.get() else {
            panic!("expected bring-up failure");
        };
        assert_eq!(failure.peripheral, "up_button");
        assert_eq!(failure.reason, "internal_expander: not present");
    }

    #[test]
    fn test_lazy_slot_deferred_until_access() {
        let slot = LazySlot::new("display");
        assert_eq!(slot.status(), SlotStatus::Deferred);
        slot.get_or_build(|| Ok(1u8)).unwrap();
        assert_eq!(slot.status(), SlotStatus::Present);
    }

    #[test]
    fn test_lazy_slot_failure_is_not_retried() {
        let builds = AtomicUsize::new(0);
        let slot: LazySlot<u8> = LazySlot::new("rgb_led");
        for _ in 0..3 {
            let result = slot.get_or_build(|| {
                builds.fetch_add(1, Ordering::SeqCst);
                Err(BusError::Timeout.into())
            });
            assert!(matches!(result, Err(HalError::Bringup(_))));
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lazy_slot_concurrent_first_access_builds_once() {
        const CALLERS: usize = 100;
        let builds = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(LazySlot::<String>::new("display"));
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let builds = Arc::clone(&builds);
                let slot = Arc::clone(&slot);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slot.get_or_build(|| {
                        builds.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok("st7789".to_string())
                    })
                    .unwrap()
                })
            })
            .collect();

        let results: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), CALLERS);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }
}
