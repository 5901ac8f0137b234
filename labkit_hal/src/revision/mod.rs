//! Per-revision wiring.
//!
//! Every board revision implements [`RevisionWiring`]. The revision is
//! chosen once, in [`wire`], and held as a trait object afterwards; no
//! later code looks at the revision tag to decide how to talk to hardware.
//!
//! Pin tables are static data ([`PinSource`]) resolved against the
//! expanders this board owns. A pin on an expander that did not answer the
//! probe resolves to a bring-up failure, so the peripheral using it is
//! skipped and the connector role is left unwired.

pub mod core_compute;
pub mod v1;
pub mod v2;
pub mod v3;
pub mod v4;

use embedded_hal::digital::PinState;
use labkit_common::hal::error::{BringupFailure, HalError};
use labkit_common::hal::platform::{DynOutput, Platform};
use labkit_common::hal::types::{HardwareRevision, McuPin, Pull, SerialConfig};
use labkit_common::io::role::{ConnectorName, PinRole};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::bus::Buses;
use crate::connector::{BusHandle, Connector, PhysicalPin, PinMapping};
use crate::expander::ExpanderHandle;
use crate::peripherals::{
    Display, DisplayController, DisplayPins, EnvironmentalSensor, LightSensor, MotionSensor,
    PushButton, RgbLed, Speaker, Touchscreen,
};
use crate::probe::ProbeResult;
use crate::slot::{PeripheralSlot, contained};
use crate::transport::ModbusTransport;

use PinRole::*;
use PinSource::Mcu;

/// Idle frequency the speaker PWM is opened at.
const SPEAKER_IDLE_HZ: u32 = 2_000;

// ─── Board context ──────────────────────────────────────────────────

/// What every builder is handed instead of reaching for global state.
#[derive(Clone)]
pub struct BoardContext {
    /// Platform capability provider.
    pub platform: Arc<dyn Platform>,
    /// Shared SPI and I2C buses.
    pub buses: Buses,
}

impl BoardContext {
    /// The platform as a plain reference.
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }
}

/// Expanders owned by one board.
#[derive(Default)]
pub struct Expanders {
    /// 0x20
    pub internal: Option<ExpanderHandle>,
    /// 0x21
    pub header: Option<ExpanderHandle>,
    /// 0x27
    pub version: Option<ExpanderHandle>,
}

impl From<ProbeResult> for Expanders {
    fn from(probe: ProbeResult) -> Self {
        Self {
            internal: probe.internal,
            header: probe.header,
            version: probe.version,
        }
    }
}

impl Expanders {
    /// Number of expanders present.
    pub fn count(&self) -> usize {
        [&self.internal, &self.header, &self.version]
            .iter()
            .filter(|e| e.is_some())
            .count()
    }

    /// Turn a table entry into a physical pin.
    pub fn resolve(&self, source: PinSource) -> Result<PhysicalPin, HalError> {
        match source {
            PinSource::Mcu(name) => Ok(PhysicalPin::Mcu(McuPin(name))),
            PinSource::Internal(index) => self
                .internal
                .as_ref()
                .map(|e| PhysicalPin::Expander(e.pin(index)))
                .ok_or_else(|| BringupFailure::new("internal_expander", "not present").into()),
            PinSource::Header(index) => self
                .header
                .as_ref()
                .map(|e| PhysicalPin::Expander(e.pin(index)))
                .ok_or_else(|| BringupFailure::new("header_expander", "not present").into()),
        }
    }

    /// Route the internal expander's INT output to `pin`.
    ///
    /// Without it, expander buttons fall back to polling.
    pub fn attach_interrupt(&self, platform: &dyn Platform, pin: &'static str) {
        let Some(internal) = self.internal.as_ref() else {
            return;
        };
        let attached = contained("expander_interrupt", || {
            let line = platform.interrupt_input(McuPin(pin), Pull::Up)?;
            internal.attach_interrupt(line)
        });
        if attached.is_err() {
            debug!("internal expander buttons will be polled");
        }
    }
}

// ─── Pin tables ─────────────────────────────────────────────────────

/// Static location of a pin in a revision's wiring table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinSource {
    /// Microcontroller pin, by silkscreen name.
    Mcu(&'static str),
    /// Line of the internal expander (0x20).
    Internal(u8),
    /// Line of the header expander (0x21).
    Header(u8),
}

impl PinSource {
    /// Whether the line goes through an expander.
    pub fn is_expander(&self) -> bool {
        !matches!(self, Self::Mcu(_))
    }
}

/// Static role table of one connector.
pub type ConnectorTable = &'static [(PinRole, PinSource)];

/// Direction buttons.
#[derive(Debug, Clone, Copy)]
pub struct ButtonPins {
    /// Up button line.
    pub up: PinSource,
    /// Down button line.
    pub down: PinSource,
    /// Left button line.
    pub left: PinSource,
    /// Right button line.
    pub right: PinSource,
}

/// Display control lines and controller.
#[derive(Debug, Clone, Copy)]
pub struct DisplayWiring {
    /// Controller chip.
    pub controller: DisplayController,
    /// Chip select.
    pub cs: PinSource,
    /// Data/command select.
    pub dc: PinSource,
    /// Reset.
    pub rst: PinSource,
    /// Backlight enable, if switchable.
    pub backlight: Option<PinSource>,
}

/// Settle after a reset driven straight from the microcontroller.
const DIRECT_RESET_SETTLE: Duration = Duration::from_millis(5);

// Shared bus pins.
pub(crate) const SCK: PinSource = Mcu("D13");
pub(crate) const CIPO: PinSource = Mcu("D12");
pub(crate) const COPI: PinSource = Mcu("D11");
pub(crate) const SCL: PinSource = Mcu("D21");
pub(crate) const SDA: PinSource = Mcu("D20");

const GROVE_DIGITAL: ConnectorTable = &[(D0, Mcu("D16")), (D1, Mcu("D17"))];
const GROVE_ANALOG: ConnectorTable = &[(D0, Mcu("A06")), (D1, Mcu("A07"))];
const GROVE_UART: ConnectorTable = &[(Rx, Mcu("D00")), (Tx, Mcu("D01"))];
const QWIIC: ConnectorTable = &[(Scl, SCL), (Sda, SDA)];

/// Serial port routed to a header's RX/TX pair.
fn uart_port(name: ConnectorName) -> Option<&'static str> {
    match name {
        ConnectorName::GroveUart => Some("COM1"),
        ConnectorName::MikroBus1 => Some("COM2"),
        ConnectorName::MikroBus2 => Some("COM3"),
        _ => None,
    }
}

/// Tables identical on every revision.
pub(crate) fn shared_table(name: ConnectorName) -> Option<ConnectorTable> {
    match name {
        ConnectorName::GroveDigital => Some(GROVE_DIGITAL),
        ConnectorName::GroveAnalog => Some(GROVE_ANALOG),
        ConnectorName::GroveUart => Some(GROVE_UART),
        ConnectorName::Qwiic => Some(QWIIC),
        _ => None,
    }
}

// ─── Capability sets ────────────────────────────────────────────────

/// The four direction buttons.
pub struct ButtonSet {
    /// Up.
    pub up: PeripheralSlot<PushButton>,
    /// Down.
    pub down: PeripheralSlot<PushButton>,
    /// Left.
    pub left: PeripheralSlot<PushButton>,
    /// Right.
    pub right: PeripheralSlot<PushButton>,
}

/// Eagerly built peripherals other than the buttons.
pub struct SensorSet {
    /// BH1750.
    pub light: PeripheralSlot<LightSensor>,
    /// BME68x.
    pub environmental: PeripheralSlot<EnvironmentalSensor>,
    /// BMI270.
    pub motion: PeripheralSlot<MotionSensor>,
    /// Piezo speaker.
    pub speaker: PeripheralSlot<Speaker>,
}

// ─── RevisionWiring ─────────────────────────────────────────────────

/// Capability interface shared by all revisions.
pub trait RevisionWiring: Send + Sync {
    /// Revision this wiring was built for.
    fn revision(&self) -> HardwareRevision;

    /// Platform and shared buses.
    fn context(&self) -> &BoardContext;

    /// Expanders found by the probe.
    fn expanders(&self) -> &Expanders;

    /// Wire the four direction buttons. Each one is contained.
    fn wire_buttons(&self) -> ButtonSet;

    /// Bring up sensors and speaker. Each one is contained.
    fn wire_sensors(&self) -> SensorSet;

    /// Build the display. Called once, from the lazy slot.
    fn build_display(&self) -> Result<Display, HalError>;

    /// Build the RGB indicator.
    fn build_rgb_led(&self) -> Result<RgbLed, HalError>;

    /// Build the touch controller. Absent unless overridden.
    fn build_touchscreen(&self) -> Result<Touchscreen, HalError> {
        Err(BringupFailure::new("touchscreen", "not fitted on this revision").into())
    }

    /// Revision-specific table for `name`.
    fn connector_table(&self, name: ConnectorName) -> ConnectorTable;

    /// Build a connector from this revision's role table.
    fn build_connector(&self, name: ConnectorName) -> Connector {
        assemble_connector(
            self.context(),
            self.expanders(),
            name,
            self.connector_table(name),
        )
    }

    /// Open the RS-485 port with the revision's transport strategy.
    fn open_modbus(&self, config: &SerialConfig) -> Result<ModbusTransport, HalError>;
}

/// Instantiate the wiring for `revision`. The one place the tag is matched.
pub fn wire(
    revision: HardwareRevision,
    context: BoardContext,
    expanders: Expanders,
) -> Box<dyn RevisionWiring> {
    match revision {
        HardwareRevision::V1 => Box::new(v1::V1Board::new(context, expanders)),
        HardwareRevision::V2 { .. } => Box::new(v2::V2Board::new(revision, context, expanders)),
        HardwareRevision::V3 { .. } => Box::new(core_compute::CoreComputeBoard::new(
            revision,
            context,
            expanders,
            &v3::PINS,
        )),
        HardwareRevision::V4 { .. } => Box::new(core_compute::CoreComputeBoard::new(
            revision,
            context,
            expanders,
            &v4::PINS,
        )),
    }
}

// ─── Shared builders ────────────────────────────────────────────────

pub(crate) fn wire_buttons(ctx: &BoardContext, expanders: &Expanders, pins: &ButtonPins) -> ButtonSet {
    let button = |name: &'static str, source: PinSource| {
        PeripheralSlot::contain(name, || {
            let pin = expanders.resolve(source)?;
            PushButton::on_pin(name, &pin, ctx.platform())
        })
    };
    ButtonSet {
        up: button("up_button", pins.up),
        down: button("down_button", pins.down),
        left: button("left_button", pins.left),
        right: button("right_button", pins.right),
    }
}

pub(crate) fn wire_sensors(ctx: &BoardContext, speaker_pin: &'static str) -> SensorSet {
    let i2c = &ctx.buses.i2c;
    SensorSet {
        light: PeripheralSlot::contain("light_sensor", || LightSensor::new(i2c.clone())),
        environmental: PeripheralSlot::contain("environmental_sensor", || {
            EnvironmentalSensor::new(i2c.clone())
        }),
        motion: PeripheralSlot::contain("motion_sensor", || MotionSensor::new(i2c.clone())),
        speaker: PeripheralSlot::contain("speaker", || {
            Speaker::new(ctx.platform.pwm(McuPin(speaker_pin), SPEAKER_IDLE_HZ)?)
        }),
    }
}

pub(crate) fn open_output(
    ctx: &BoardContext,
    expanders: &Expanders,
    source: PinSource,
    initial: PinState,
) -> Result<DynOutput, HalError> {
    expanders
        .resolve(source)?
        .open_output(ctx.platform(), initial)
}

pub(crate) fn build_display(
    ctx: &BoardContext,
    expanders: &Expanders,
    wiring: &DisplayWiring,
) -> Result<Display, HalError> {
    let open = |source| open_output(ctx, expanders, source, PinState::High);
    let pins = DisplayPins {
        cs: open(wiring.cs)?,
        dc: open(wiring.dc)?,
        rst: open(wiring.rst)?,
        backlight: wiring.backlight.map(open).transpose()?,
    };
    let settle = if wiring.rst.is_expander() || wiring.cs.is_expander() {
        labkit_common::consts::DISPLAY_SETTLE
    } else {
        DIRECT_RESET_SETTLE
    };
    Display::new(wiring.controller, ctx.buses.spi.clone(), pins, settle)
}

pub(crate) fn build_rgb_led(
    ctx: &BoardContext,
    expanders: &Expanders,
    [red, green, blue]: [PinSource; 3],
) -> Result<RgbLed, HalError> {
    let open = |source| open_output(ctx, expanders, source, PinState::High);
    RgbLed::new(open(red)?, open(green)?, open(blue)?)
}

pub(crate) fn assemble_connector(
    ctx: &BoardContext,
    expanders: &Expanders,
    name: ConnectorName,
    table: ConnectorTable,
) -> Connector {
    let mut mapping = PinMapping::new();
    for &(role, source) in table {
        match expanders.resolve(source) {
            Ok(pin) => mapping.push(role, pin),
            Err(e) => warn!("{} {} left unwired: {}", name, role, e),
        }
    }

    let mut connector = Connector::new(name, mapping)
        .with_bus(BusHandle::Spi(ctx.buses.spi.clone()), &[Sck, Cipo, Copi])
        .with_bus(BusHandle::Spi(ctx.buses.spi.clone()), &[Clk, Copi])
        .with_bus(BusHandle::I2c(ctx.buses.i2c.clone()), &[Scl, Sda]);
    if let Some(port) = uart_port(name) {
        connector = connector.with_bus(BusHandle::Uart(port), &[Rx, Tx]);
    }
    debug!("{} assembled: {:?}", name, connector.roles());
    connector
}
