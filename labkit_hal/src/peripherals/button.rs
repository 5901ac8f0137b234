//! Push buttons.
//!
//! Buttons are active-low with a pull-up. Level changes arrive either from
//! an edge interrupt (MCU pin with interrupt support, or an expander line
//! whose INT output is wired) or from a polling thread on pins without
//! one. Either way they are re-exposed as a `PressStarted`/`PressEnded`
//! pair; the handler runs on whichever context delivered the change.

use embedded_hal::digital::PinState;
use labkit_common::consts::BUTTON_POLL_INTERVAL;
use labkit_common::hal::error::HalError;
use labkit_common::hal::platform::{DynInput, DynInterruptInput, Platform};
use labkit_common::hal::types::{Pull, Trigger};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

use crate::connector::PhysicalPin;

/// Press transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ButtonEvent {
    /// The button went down.
    PressStarted,
    /// The button was released.
    PressEnded,
}

type Handler = Arc<dyn Fn(ButtonEvent) + Send + Sync>;

/// State shared with the interrupt callback or the poll thread.
struct ButtonState {
    name: &'static str,
    pressed: AtomicBool,
    handler: Mutex<Option<Handler>>,
}

impl ButtonState {
    fn update(&self, pressed: bool) {
        if self.pressed.swap(pressed, Ordering::AcqRel) == pressed {
            return;
        }
        let event = if pressed {
            ButtonEvent::PressStarted
        } else {
            ButtonEvent::PressEnded
        };
        trace!("{}: {:?}", self.name, event);
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }
}

enum Source {
    Interrupt(Mutex<DynInterruptInput>),
    Polled {
        stop: Arc<AtomicBool>,
        thread: Option<JoinHandle<()>>,
    },
}

/// A direction button.
pub struct PushButton {
    state: Arc<ButtonState>,
    source: Source,
}

impl PushButton {
    /// Wire a button on `pin`, using interrupts when the pin supports them.
    pub fn on_pin(
        name: &'static str,
        pin: &PhysicalPin,
        platform: &dyn Platform,
    ) -> Result<Self, HalError> {
        if pin.supports_interrupt(platform) {
            let input = pin.open_interrupt_input(platform, Pull::Up)?;
            Self::with_interrupt(name, input)
        } else {
            debug!("{}: {} has no edge interrupt, polling", name, pin);
            let input = pin.open_input(platform, Pull::Up)?;
            Self::polled(name, input)
        }
    }

    /// Button driven by an edge interrupt on both edges.
    pub fn with_interrupt(name: &'static str, mut input: DynInterruptInput) -> Result<Self, HalError> {
        let state = Arc::new(ButtonState {
            name,
            pressed: AtomicBool::new(input.is_low()?),
            handler: Mutex::new(None),
        });

        let shared = Arc::clone(&state);
        input.set_async_interrupt(
            Trigger::Both,
            Box::new(move |level| shared.update(level == PinState::Low)),
        )?;

        Ok(Self {
            state,
            source: Source::Interrupt(Mutex::new(input)),
        })
    }

    /// Button sampled every [`BUTTON_POLL_INTERVAL`] on a background thread.
    pub fn polled(name: &'static str, mut input: DynInput) -> Result<Self, HalError> {
        let state = Arc::new(ButtonState {
            name,
            pressed: AtomicBool::new(input.is_low()?),
            handler: Mutex::new(None),
        });
        let stop = Arc::new(AtomicBool::new(false));

        let shared = Arc::clone(&state);
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name(format!("poll-{name}"))
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    match input.is_low() {
                        Ok(low) => shared.update(low),
                        Err(e) => warn!("{}: poll read failed: {}", shared.name, e),
                    }
                    thread::sleep(BUTTON_POLL_INTERVAL);
                }
            })
            .map_err(|e| HalError::Device(format!("{name}: cannot start poll thread: {e}")))?;

        Ok(Self {
            state,
            source: Source::Polled {
                stop,
                thread: Some(thread),
            },
        })
    }

    /// Slot name, e.g. `up_button`.
    pub fn name(&self) -> &'static str {
        self.state.name
    }

    /// Last observed state.
    pub fn is_pressed(&self) -> bool {
        self.state.pressed.load(Ordering::Acquire)
    }

    /// Whether state comes from a poll thread instead of an interrupt.
    pub fn is_polled(&self) -> bool {
        matches!(self.source, Source::Polled { .. })
    }

    /// Install the press handler, replacing any previous one.
    pub fn set_handler(&self, handler: impl Fn(ButtonEvent) + Send + Sync + 'static) {
        *self.state.handler.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(handler));
    }

    /// Stop delivering events.
    pub fn clear_handler(&self) {
        *self.state.handler.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Drop for PushButton {
    fn drop(&mut self) {
        match &mut self.source {
            Source::Interrupt(input) => {
                let input = input.get_mut().unwrap_or_else(|e| e.into_inner());
                let _ = input.clear_async_interrupt();
            }
            Source::Polled { stop, thread } => {
                stop.store(true, Ordering::Release);
                if let Some(thread) = thread.take() {
                    let _ = thread.join();
                }
            }
        }
    }
}

impl std::fmt::Debug for PushButton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushButton")
            .field("name", &self.state.name)
            .field("pressed", &self.is_pressed())
            .field("polled", &self.is_polled())
            .finish()
    }
}
