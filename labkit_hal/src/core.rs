//! Board bring-up and the capability surface.
//!
//! `Board` is the object applications program against. It is built once by
//! [`Board::bring_up`], which provisions the buses, probes the expanders,
//! selects the revision wiring and wires the eager peripherals. Everything
//! else (display, RGB LED, touchscreen, connectors) is built on first access.

use labkit_common::config::LabConfig;
use labkit_common::hal::error::{BringupFailure, HalError};
use labkit_common::hal::platform::Platform;
use labkit_common::hal::types::{HardwareRevision, McuFamily, SerialConfig};
use labkit_common::io::role::ConnectorName;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bus::Buses;
use crate::connector::Connector;
use crate::peripherals::{
    Display, EnvironmentalSensor, LightSensor, MotionSensor, PushButton, RgbLed, Speaker,
    Touchscreen,
};
use crate::probe::{detect_revision, probe_expanders};
use crate::revision::{self, BoardContext, ButtonSet, Expanders, RevisionWiring, SensorSet};
use crate::slot::{LazySlot, PeripheralSlot, SlotStatus};
use crate::transport::ModbusTransport;

/// Bring-up progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BringupState {
    /// Nothing attempted yet.
    Uninitialized,
    /// Looking for expanders on the I2C bus.
    ProbingExpanders,
    /// Revision known, core buttons being wired.
    WiringCoreButtons,
    /// Capability surface usable. Optional slots may still be empty.
    Ready,
}

/// Connector slots, indexed by [`ConnectorName::index`].
struct ConnectorSlots([LazySlot<Connector>; 8]);

impl ConnectorSlots {
    fn new() -> Self {
        Self(ConnectorName::ALL.map(|name| LazySlot::new(name.as_str())))
    }

    fn get(&self, name: ConnectorName) -> &LazySlot<Connector> {
        &self.0[name.index()]
    }
}

/// The capability surface of one physical board.
pub struct Board {
    /// MCU family the wiring was chosen for
    family: McuFamily,
    /// Detected revision, fixed for the lifetime of the board
    revision: HardwareRevision,
    /// Current bring-up state
    state: BringupState,
    /// Revision-specific wiring, selected once
    wiring: Box<dyn RevisionWiring>,
    buttons: ButtonSet,
    sensors: SensorSet,
    display: LazySlot<Display>,
    rgb_led: LazySlot<RgbLed>,
    touchscreen: LazySlot<Touchscreen>,
    connectors: ConnectorSlots,
    /// Serial settings used by [`Board::default_modbus_transport`]
    modbus: SerialConfig,
    /// Expanders that did not answer the probe
    probe_failures: Vec<BringupFailure>,
}

impl Board {
    /// Detect the board and wire its capability surface.
    ///
    /// # Errors
    /// Fails only when the configuration is invalid, a shared bus cannot be
    /// acquired, or the microcontroller family has no board wiring.
    /// Peripheral failures are recorded in their slots instead.
    pub fn bring_up(platform: Arc<dyn Platform>, config: &LabConfig) -> Result<Self, HalError> {
        config.validate()?;
        let mut state = BringupState::Uninitialized;
        debug!("Board bring-up: {:?}", state);

        let family = match config.board.family {
            Some(family) => {
                if family != platform.family() {
                    warn!(
                        "Configured family {} overrides platform family {}",
                        family,
                        platform.family()
                    );
                }
                family
            }
            None => platform.family(),
        };
        if family == McuFamily::Unsupported {
            return Err(HalError::UnsupportedPlatform(family.to_string()));
        }

        let buses = Buses::provision(platform.as_ref(), &config.board)?;

        state = BringupState::ProbingExpanders;
        debug!("Board bring-up: {:?}", state);
        let mut probe = probe_expanders(&buses.i2c);
        let revision = detect_revision(family, &probe)?;
        let probe_failures = std::mem::take(&mut probe.failures);

        let ctx = BoardContext { platform, buses };
        let wiring = revision::wire(revision, ctx, Expanders::from(probe));

        state = BringupState::WiringCoreButtons;
        debug!("Board bring-up: {:?}", state);
        let buttons = wiring.wire_buttons();
        let sensors = wiring.wire_sensors();

        state = BringupState::Ready;
        let board = Self {
            family,
            revision,
            state,
            wiring,
            buttons,
            sensors,
            display: LazySlot::new("display"),
            rgb_led: LazySlot::new("rgb_led"),
            touchscreen: LazySlot::new("touchscreen"),
            connectors: ConnectorSlots::new(),
            modbus: config.modbus.serial(),
            probe_failures,
        };

        let empty = board
            .slot_statuses()
            .iter()
            .filter(|(_, s)| matches!(s, SlotStatus::Empty(_)))
            .count();
        info!(
            "Board {} ready ({} expanders, {} eager slots empty)",
            board.wiring.revision(),
            board.wiring.expanders().count(),
            empty
        );
        Ok(board)
    }

    // ─── Identity ───────────────────────────────────────────────────

    /// Detected revision.
    pub fn revision(&self) -> HardwareRevision {
        self.revision
    }

    /// `"v{major}.{minor|x}"`.
    pub fn revision_string(&self) -> String {
        self.revision.to_string()
    }

    /// Family the board was wired for.
    pub fn family(&self) -> McuFamily {
        self.family
    }

    /// Bring-up state.
    pub fn state(&self) -> BringupState {
        self.state
    }

    /// Expanders that failed to answer during the probe.
    pub fn probe_failures(&self) -> &[BringupFailure] {
        &self.probe_failures
    }

    // ─── Eager peripherals ──────────────────────────────────────────

    /// Up direction button.
    pub fn up_button(&self) -> Result<Arc<PushButton>, HalError> {
        self.buttons.up.get()
    }

    /// Down direction button.
    pub fn down_button(&self) -> Result<Arc<PushButton>, HalError> {
        self.buttons.down.get()
    }

    /// Left direction button.
    pub fn left_button(&self) -> Result<Arc<PushButton>, HalError> {
        self.buttons.left.get()
    }

    /// Right direction button.
    pub fn right_button(&self) -> Result<Arc<PushButton>, HalError> {
        self.buttons.right.get()
    }

    /// BH1750 ambient light sensor.
    pub fn light_sensor(&self) -> Result<Arc<LightSensor>, HalError> {
        self.sensors.light.get()
    }

    /// BME68x environmental sensor.
    pub fn environmental_sensor(&self) -> Result<Arc<EnvironmentalSensor>, HalError> {
        self.sensors.environmental.get()
    }

    /// BMI270 motion sensor.
    pub fn motion_sensor(&self) -> Result<Arc<MotionSensor>, HalError> {
        self.sensors.motion.get()
    }

    /// Piezo speaker.
    pub fn speaker(&self) -> Result<Arc<Speaker>, HalError> {
        self.sensors.speaker.get()
    }

    // ─── Deferred peripherals ───────────────────────────────────────

    /// The display, built on first call.
    pub fn display(&self) -> Result<Arc<Display>, HalError> {
        self.display.get_or_build(|| self.wiring.build_display())
    }

    /// RGB status indicator, built on first access.
    pub fn rgb_led(&self) -> Result<Arc<RgbLed>, HalError> {
        self.rgb_led.get_or_build(|| self.wiring.build_rgb_led())
    }

    /// Touch controller, built on first access. Core-compute boards only.
    pub fn touchscreen(&self) -> Result<Arc<Touchscreen>, HalError> {
        self.touchscreen
            .get_or_build(|| self.wiring.build_touchscreen())
    }

    /// Expansion header `name`, assembled on first request.
    ///
    /// Roles this revision does not wire are simply absent; asking the
    /// connector for one yields `HalError::PinNotConnected`.
    pub fn connector(&self, name: ConnectorName) -> Result<Arc<Connector>, HalError> {
        self.connectors
            .get(name)
            .get_or_build(|| Ok(self.wiring.build_connector(name)))
    }

    /// Like [`Board::connector`], by name.
    pub fn connector_by_name(&self, name: &str) -> Result<Arc<Connector>, HalError> {
        let name: ConnectorName = name.parse().map_err(HalError::UnknownConnector)?;
        self.connector(name)
    }

    // ─── Transport ──────────────────────────────────────────────────

    /// Open the Modbus port with explicit serial settings.
    ///
    /// Each call opens a fresh transport; the caller owns it.
    pub fn modbus_transport(&self, config: SerialConfig) -> Result<ModbusTransport, HalError> {
        debug!(
            "Opening Modbus transport on {}: {} baud",
            self.revision, config.baud_rate
        );
        self.wiring.open_modbus(&config)
    }

    /// Open the Modbus port with the configured settings.
    pub fn default_modbus_transport(&self) -> Result<ModbusTransport, HalError> {
        self.modbus_transport(self.modbus)
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// Every peripheral slot with its status, in a stable order.
    pub fn slot_statuses(&self) -> Vec<(&'static str, SlotStatus)> {
        fn eager<T>(slot: &PeripheralSlot<T>) -> (&'static str, SlotStatus) {
            (slot.name(), slot.status())
        }
        fn lazy<T>(slot: &LazySlot<T>) -> (&'static str, SlotStatus) {
            (slot.name(), slot.status())
        }

        vec![
            eager(&self.buttons.up),
            eager(&self.buttons.down),
            eager(&self.buttons.left),
            eager(&self.buttons.right),
            eager(&self.sensors.light),
            eager(&self.sensors.environmental),
            eager(&self.sensors.motion),
            eager(&self.sensors.speaker),
            lazy(&self.display),
            lazy(&self.rgb_led),
            lazy(&self.touchscreen),
        ]
    }

    /// Connectors built so far, in report order.
    pub fn built_connectors(&self) -> Vec<Arc<Connector>> {
        ConnectorName::ALL
            .iter()
            .filter(|name| self.connectors.get(**name).status().is_present())
            .filter_map(|name| self.connector(*name).ok())
            .collect()
    }
}

impl std::fmt::Debug for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Board")
            .field("family", &self.family)
            .field("revision", &self.revision)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPlatform;

    fn bring_up(revision: HardwareRevision) -> Board {
        let sim = Arc::new(SimPlatform::board(revision));
        Board::bring_up(sim, &LabConfig::default()).unwrap()
    }

    #[test]
    fn test_board_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Board>();
    }

    #[test]
    fn test_full_v2_board_has_every_eager_slot() {
        let board = bring_up(HardwareRevision::V2 { minor: Some(1) });
        assert_eq!(board.state(), BringupState::Ready);
        assert_eq!(board.revision_string(), "v2.1");
        for (name, status) in board.slot_statuses().into_iter().take(8) {
            assert_eq!(status, SlotStatus::Present, "{name}");
        }
    }

    #[test]
    fn test_wiring_matches_detected_revision() {
        for revision in [
            HardwareRevision::V1,
            HardwareRevision::V2 { minor: None },
            HardwareRevision::V3 { minor: Some(2) },
            HardwareRevision::V4 { minor: Some(1) },
        ] {
            let board = bring_up(revision);
            assert_eq!(board.wiring.revision(), board.revision());
        }
    }

    #[test]
    fn test_lazy_slots_start_deferred() {
        let board = bring_up(HardwareRevision::V1);
        let statuses = board.slot_statuses();
        let display = statuses.iter().find(|(n, _)| *n == "display").unwrap();
        assert_eq!(display.1, SlotStatus::Deferred);
        assert!(board.built_connectors().is_empty());
    }

    #[test]
    fn test_touchscreen_absent_on_feather_boards() {
        let board = bring_up(HardwareRevision::V1);
        let err = board.touchscreen().unwrap_err();
        assert!(matches!(err, HalError::Bringup(_)));
    }

    #[test]
    fn test_unknown_connector_name() {
        let board = bring_up(HardwareRevision::V1);
        assert!(matches!(
            board.connector_by_name("MikroBus3"),
            Err(HalError::UnknownConnector(_))
        ));
    }
}
