//! Connector mapping integration tests.

use labkit_common::config::LabConfig;
use labkit_common::consts::HEADER_EXPANDER_ADDRESS;
use labkit_common::hal::error::HalError;
use labkit_common::hal::types::HardwareRevision;
use labkit_common::io::role::{ConnectorName, PinRole};
use labkit_hal::connector::PhysicalPin;
use labkit_hal::core::Board;
use labkit_hal::sim::SimPlatform;
use std::sync::Arc;

/// Helper: bring up a simulated board.
fn board(sim: SimPlatform) -> Board {
    Board::bring_up(Arc::new(sim), &LabConfig::default()).expect("bring-up")
}

#[test]
fn test_mikrobus_reset_not_connected_on_v1() {
    let board = board(SimPlatform::board(HardwareRevision::V1));
    let mikrobus = board.connector_by_name("MikroBus1").unwrap();

    match mikrobus.pin_named("RST") {
        Err(HalError::PinNotConnected { connector, role }) => {
            assert_eq!(connector, ConnectorName::MikroBus1);
            assert_eq!(role, PinRole::Rst);
        }
        other => panic!("expected PinNotConnected, got {other:?}"),
    }
    // Everything else on the header is wired.
    assert!(mikrobus.pin(PinRole::Cs).is_ok());
    assert!(!mikrobus.has(PinRole::Rst));
}

#[test]
fn test_mikrobus_reset_routed_through_expander_on_v2() {
    let board = board(SimPlatform::board(HardwareRevision::V2 { minor: Some(3) }));
    let mikrobus = board.connector(ConnectorName::MikroBus1).unwrap();
    let rst = mikrobus.pin(PinRole::Rst).unwrap();
    assert!(rst.is_expander());
    assert_eq!(rst.to_string(), "0x20:GP7");

    let mikrobus2 = board.connector(ConnectorName::MikroBus2).unwrap();
    assert_eq!(mikrobus2.pin(PinRole::Rst).unwrap().to_string(), "0x21:GP0");
}

#[test]
fn test_duplicate_role_resolves_to_first_binding() {
    let board = board(SimPlatform::board(HardwareRevision::V4 { minor: Some(1) }));
    let mikrobus2 = board.connector(ConnectorName::MikroBus2).unwrap();
    assert!(mikrobus2.pin(PinRole::Rst).unwrap().is_expander());
    // Listed twice, reported once.
    let resets = mikrobus2
        .roles()
        .into_iter()
        .filter(|r| *r == PinRole::Rst)
        .count();
    assert_eq!(resets, 1);
}

#[test]
fn test_alternate_binding_used_when_expander_missing() {
    let board = board(
        SimPlatform::board(HardwareRevision::V4 { minor: Some(1) }).without(HEADER_EXPANDER_ADDRESS),
    );
    let mikrobus2 = board.connector(ConnectorName::MikroBus2).unwrap();
    match mikrobus2.pin(PinRole::Rst).unwrap() {
        PhysicalPin::Mcu(pin) => assert_eq!(pin.name(), "D34"),
        other => panic!("expected MCU reset line, got {other}"),
    }

    // IOTerminal D2/D3 live on the missing expander.
    let terminal = board.connector(ConnectorName::IOTerminal).unwrap();
    assert!(terminal.pin(PinRole::A1).is_ok());
    assert!(matches!(
        terminal.pin(PinRole::D2),
        Err(HalError::PinNotConnected { .. })
    ));
}

#[test]
fn test_connector_buses() {
    let board = board(SimPlatform::board(HardwareRevision::V3 { minor: None }));

    let mikrobus = board.connector(ConnectorName::MikroBus1).unwrap();
    assert!(mikrobus.spi_bus().is_some());
    assert!(mikrobus.i2c_bus().is_some());
    assert_eq!(mikrobus.serial_port(), Some("COM2"));

    let qwiic = board.connector(ConnectorName::Qwiic).unwrap();
    assert!(qwiic.i2c_bus().is_some());
    assert!(qwiic.spi_bus().is_none());

    let grove = board.connector(ConnectorName::GroveDigital).unwrap();
    assert!(grove.buses().is_empty());

    let display = board.connector(ConnectorName::Display).unwrap();
    assert!(display.spi_bus().is_some());
}

#[test]
fn test_connector_roles_stay_within_documented_set() {
    for revision in [
        HardwareRevision::V1,
        HardwareRevision::V2 { minor: None },
        HardwareRevision::V3 { minor: Some(1) },
        HardwareRevision::V4 { minor: Some(1) },
    ] {
        let board = board(SimPlatform::board(revision));
        for name in ConnectorName::ALL {
            let connector = board.connector(name).unwrap();
            for role in connector.roles() {
                assert!(
                    name.roles().contains(&role),
                    "{revision}: {name} exposes undocumented {role}"
                );
            }
        }
    }
}

#[test]
fn test_connector_is_memoized() {
    let board = board(SimPlatform::board(HardwareRevision::V2 { minor: None }));
    let a = board.connector(ConnectorName::GroveUart).unwrap();
    let b = board.connector_by_name("groveuart").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}
