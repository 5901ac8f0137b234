//! Human- and machine-readable summary of a brought-up board.

use serde::Serialize;
use std::fmt::Write as _;

use crate::core::{Board, BringupState};
use crate::slot::SlotStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
/// Slot state as reported.
pub enum SlotState {
    /// Peripheral built.
    Present,
    /// Bring-up failed.
    Empty,
    /// Not built yet.
    Deferred,
}

#[derive(Debug, Clone, Serialize)]
/// One capability slot.
pub struct SlotReport {
    /// Slot name.
    pub name: &'static str,
    /// Slot state.
    pub status: SlotState,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Failure reason of an empty slot.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
/// One built connector.
pub struct ConnectorReport {
    /// Connector name.
    pub name: &'static str,
    /// Wired roles, in mapping order.
    pub roles: Vec<&'static str>,
}

/// Snapshot of a board's capability surface.
#[derive(Debug, Clone, Serialize)]
pub struct BoardReport {
    /// Revision string, e.g. `v2.3`.
    pub revision: String,
    /// MCU family.
    pub family: String,
    /// Bring-up state.
    pub state: BringupState,
    /// Every capability slot, core and lazy.
    pub slots: Vec<SlotReport>,
    /// Connectors built so far.
    pub connectors: Vec<ConnectorReport>,
    /// Expanders the probe did not find.
    pub probe_failures: Vec<String>,
}

impl BoardReport {
    /// Capture the board as it is now. Deferred slots are not built.
    pub fn from_board(board: &Board) -> Self {
        let slots = board
            .slot_statuses()
            .into_iter()
            .map(|(name, status)| {
                let (status, reason) = match status {
                    SlotStatus::Present => (SlotState::Present, None),
                    SlotStatus::Deferred => (SlotState::Deferred, None),
                    SlotStatus::Empty(failure) => (SlotState::Empty, Some(failure.reason)),
                };
                SlotReport {
                    name,
                    status,
                    reason,
                }
            })
            .collect();

        let connectors = board
            .built_connectors()
            .iter()
            .map(|c| ConnectorReport {
                name: c.name().as_str(),
                roles: c.roles().iter().map(|r| r.as_str()).collect(),
            })
            .collect();

        Self {
            revision: board.revision_string(),
            family: board.family().to_string(),
            state: board.state(),
            slots,
            connectors,
            probe_failures: board
                .probe_failures()
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Board {} ({}) state={:?}", self.revision, self.family, self.state);

        let _ = writeln!(out, "Slots:");
        for slot in &self.slots {
            let status = match slot.status {
                SlotState::Present => "present",
                SlotState::Empty => "EMPTY",
                SlotState::Deferred => "deferred",
            };
            match &slot.reason {
                Some(reason) => {
                    let _ = writeln!(out, "  {:<22} {} ({})", slot.name, status, reason);
                }
                None => {
                    let _ = writeln!(out, "  {:<22} {}", slot.name, status);
                }
            }
        }

        if !self.connectors.is_empty() {
            let _ = writeln!(out, "Connectors:");
            for c in &self.connectors {
                let _ = writeln!(out, "  {:<14} {}", c.name, c.roles.join(" "));
            }
        }

        if !self.probe_failures.is_empty() {
            let _ = writeln!(out, "Probe:");
            for failure in &self.probe_failures {
                let _ = writeln!(out, "  {failure}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimPlatform;
    use labkit_common::config::LabConfig;
    use labkit_common::consts::LIGHT_SENSOR_ADDRESS;
    use labkit_common::hal::types::HardwareRevision;
    use labkit_common::io::role::ConnectorName;
    use std::sync::Arc;

    #[test]
    fn test_report_lists_empty_slot_with_reason() {
        let sim = SimPlatform::board(HardwareRevision::V1).without(LIGHT_SENSOR_ADDRESS);
        let board = Board::bring_up(Arc::new(sim), &LabConfig::default()).unwrap();
        let report = BoardReport::from_board(&board);

        let light = report.slots.iter().find(|s| s.name == "light_sensor").unwrap();
        assert_eq!(light.status, SlotState::Empty);
        assert!(light.reason.is_some());
        assert!(report.to_text().contains("light_sensor"));
        // V1 has no expanders; all three probe attempts fail.
        assert_eq!(report.probe_failures.len(), 3);
    }

    #[test]
    fn test_report_json_shape() {
        let sim = SimPlatform::board(HardwareRevision::V2 { minor: Some(3) });
        let board = Board::bring_up(Arc::new(sim), &LabConfig::default()).unwrap();
        board.connector(ConnectorName::Qwiic).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&BoardReport::from_board(&board).to_json().unwrap()).unwrap();
        assert_eq!(json["revision"], "v2.3");
        assert_eq!(json["state"], "ready");
        assert_eq!(json["connectors"][0]["name"], "Qwiic");
        assert_eq!(json["connectors"][0]["roles"], serde_json::json!(["SCL", "SDA"]));
    }
}
