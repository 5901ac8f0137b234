//! Modbus transport selection tests.

use labkit_common::config::LabConfig;
use labkit_common::consts::{MODBUS_SERIAL_PORT, UART_BRIDGE_ADDRESS};
use labkit_common::hal::error::HalError;
use labkit_common::hal::types::{HardwareRevision, SerialConfig};
use labkit_hal::core::Board;
use labkit_hal::sim::SimPlatform;
use labkit_hal::transport::TransportKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Helper: simulated board plus a handle to inspect it.
fn setup(revision: HardwareRevision) -> (Arc<SimPlatform>, Board) {
    let sim = Arc::new(SimPlatform::board(revision));
    let board = Board::bring_up(sim.clone(), &LabConfig::default()).expect("bring-up");
    (sim, board)
}

fn short_timeout() -> SerialConfig {
    SerialConfig {
        timeout: Duration::from_millis(50),
        ..SerialConfig::default()
    }
}

#[test]
fn test_direct_transport_warm_up_and_enable_line() {
    let (sim, board) = setup(HardwareRevision::V1);
    let mut transport = board.default_modbus_transport().unwrap();
    assert_eq!(transport.kind(), TransportKind::Direct);
    assert_eq!(transport.config().baud_rate, 19_200);

    // Warm-up byte goes out before anything else.
    assert_eq!(sim.serial_ports().writes(MODBUS_SERIAL_PORT), vec![vec![0x00]]);

    let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x02, 0xC4, 0x0B];
    let started = Instant::now();
    transport.write(&frame).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(6));

    assert_eq!(
        sim.serial_ports().tx(MODBUS_SERIAL_PORT),
        [&[0x00][..], &frame[..]].concat()
    );
    // Opened low, held low for warm-up, raised for the frame, dropped after.
    assert_eq!(sim.pins().history("D27"), vec![false, false, true, false]);
}

#[test]
fn test_direct_transport_uses_caller_settings() {
    let (sim, board) = setup(HardwareRevision::V2 { minor: Some(3) });
    let transport = board
        .modbus_transport(SerialConfig::with_baud(9_600))
        .unwrap();
    assert_eq!(transport.post_write_delay(256), Duration::from_millis(216));
    assert_eq!(
        sim.serial_ports().config(MODBUS_SERIAL_PORT).map(|c| c.baud_rate),
        Some(9_600)
    );
    // V2 moved the driver-enable line.
    assert_eq!(sim.pins().history("D02").first(), Some(&false));
}

#[test]
fn test_bridged_transport_traffic() {
    let (sim, board) = setup(HardwareRevision::V3 { minor: Some(1) });
    let mut transport = board.default_modbus_transport().unwrap();
    assert_eq!(transport.kind(), TransportKind::Bridged);

    transport.write(&[0x11, 0x22, 0x33]).unwrap();
    assert_eq!(
        sim.i2c().bridge_tx(UART_BRIDGE_ADDRESS, 0),
        vec![0x00, 0x11, 0x22, 0x33]
    );
    // RS-485 auto direction enabled on the channel.
    assert_eq!(
        sim.i2c().bridge_register(UART_BRIDGE_ADDRESS, 0, 0x0F),
        Some(0x30)
    );
    // 8N1 framing, divisor latch closed.
    assert_eq!(
        sim.i2c().bridge_register(UART_BRIDGE_ADDRESS, 0, 0x03),
        Some(0x03)
    );

    sim.i2c().push_bridge_rx(UART_BRIDGE_ADDRESS, 0, &[0xAA, 0xBB]);
    let mut buf = [0u8; 2];
    transport.read_exact(&mut buf).unwrap();
    assert_eq!(buf, [0xAA, 0xBB]);
}

#[test]
fn test_bridged_transport_missing_bridge() {
    let sim = Arc::new(
        SimPlatform::board(HardwareRevision::V4 { minor: Some(1) }).without(UART_BRIDGE_ADDRESS),
    );
    let board = Board::bring_up(sim, &LabConfig::default()).unwrap();
    assert!(matches!(
        board.default_modbus_transport(),
        Err(HalError::Bus(_))
    ));
}

#[test]
fn test_read_timeout_surfaces_as_transport_timeout() {
    let (_sim, board) = setup(HardwareRevision::V1);
    let mut transport = board.modbus_transport(short_timeout()).unwrap();
    let mut buf = [0u8; 4];
    assert!(matches!(
        transport.read(&mut buf),
        Err(HalError::TransportTimeout)
    ));

    let (_sim, board) = setup(HardwareRevision::V4 { minor: Some(1) });
    let mut transport = board.modbus_transport(short_timeout()).unwrap();
    assert!(matches!(
        transport.read(&mut buf),
        Err(HalError::TransportTimeout)
    ));
    // Other peripherals are unaffected.
    assert!(board.light_sensor().is_ok());
}

#[test]
fn test_direct_read_returns_queued_bytes() {
    let (sim, board) = setup(HardwareRevision::V1);
    let mut transport = board.modbus_transport(short_timeout()).unwrap();
    sim.serial_ports().push_rx(MODBUS_SERIAL_PORT, &[1, 2, 3]);
    let mut buf = [0u8; 3];
    transport.read_exact(&mut buf).unwrap();
    assert_eq!(buf, [1, 2, 3]);
}

#[test]
fn test_warm_up_byte_is_held_for_post_write_delay() {
    let (_sim, board) = setup(HardwareRevision::V1);
    let started = Instant::now();
    let transport = board.default_modbus_transport().unwrap();
    assert!(started.elapsed() >= transport.post_write_delay(1));
}

#[test]
fn test_stalled_direct_write_times_out_and_releases_enable() {
    let (sim, board) = setup(HardwareRevision::V1);
    let mut transport = board.modbus_transport(short_timeout()).unwrap();
    sim.serial_ports().stall_tx(MODBUS_SERIAL_PORT, true);

    assert!(matches!(
        transport.write(&[0x01, 0x06, 0x00, 0x01]),
        Err(HalError::TransportTimeout)
    ));
    assert_eq!(sim.pins().history("D27").last(), Some(&false));
    assert_eq!(sim.serial_ports().writes(MODBUS_SERIAL_PORT), vec![vec![0x00]]);

    // The port recovers once the transmitter drains again.
    sim.serial_ports().stall_tx(MODBUS_SERIAL_PORT, false);
    transport.write(&[0x01]).unwrap();
}

#[test]
fn test_stalled_bridge_write_times_out() {
    let (sim, board) = setup(HardwareRevision::V3 { minor: Some(1) });
    let mut transport = board.modbus_transport(short_timeout()).unwrap();
    sim.i2c().stall_bridge_tx(UART_BRIDGE_ADDRESS, 0, true);

    assert!(matches!(
        transport.write(&[0x11, 0x22]),
        Err(HalError::TransportTimeout)
    ));
    assert_eq!(sim.i2c().bridge_tx(UART_BRIDGE_ADDRESS, 0), vec![0x00]);
    // Other peripherals are unaffected.
    assert!(board.light_sensor().is_ok());
}
