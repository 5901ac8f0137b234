//! Board-wide constants for the labkit workspace.
//!
//! Single source of truth for fixed bus addresses, settle times and
//! transport defaults. Imported by all crates.

use std::time::Duration;

// ─── I2C Addresses ──────────────────────────────────────────────────

/// Internal-peripheral I/O expander (buttons, display control lines).
pub const INTERNAL_EXPANDER_ADDRESS: u8 = 0x20;

/// Header/terminal I/O expander (MikroBus and terminal lines).
pub const HEADER_EXPANDER_ADDRESS: u8 = 0x21;

/// Version-identification I/O expander.
pub const VERSION_EXPANDER_ADDRESS: u8 = 0x27;

/// BH1750 ambient light sensor.
pub const LIGHT_SENSOR_ADDRESS: u8 = 0x23;

/// BME68x environmental sensor.
pub const ENVIRONMENTAL_SENSOR_ADDRESS: u8 = 0x76;

/// BMI270 motion sensor.
pub const MOTION_SENSOR_ADDRESS: u8 = 0x68;

/// SC16IS752 dual UART bridge.
pub const UART_BRIDGE_ADDRESS: u8 = 0x4D;

// ─── Timing ─────────────────────────────────────────────────────────

/// Settle time after driving display reset lines through an expander.
pub const DISPLAY_SETTLE: Duration = Duration::from_millis(50);

/// Poll interval for buttons on pins without edge-interrupt support.
pub const BUTTON_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Modbus read/write timeout.
pub const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed slack added to every post-write delay, in milliseconds.
pub const POST_WRITE_SLACK_MS: u64 = 3;

// ─── Transport ──────────────────────────────────────────────────────

/// Crystal frequency feeding the UART bridge.
pub const UART_BRIDGE_CLOCK_HZ: u32 = 1_843_200;

/// Default Modbus baud rate.
pub const DEFAULT_MODBUS_BAUD: u32 = 19_200;

/// Default Modbus data bits.
pub const DEFAULT_MODBUS_DATA_BITS: u8 = 8;

/// Platform serial port wired to the RS-485 transceiver on direct boards.
pub const MODBUS_SERIAL_PORT: &str = "COM4";

// ─── Buses ──────────────────────────────────────────────────────────

/// Default SPI clock (display, touch, MikroBus).
pub const DEFAULT_SPI_CLOCK_HZ: u32 = 24_000_000;

/// Default I2C clock.
pub const DEFAULT_I2C_FREQUENCY_HZ: u32 = 400_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_do_not_collide() {
        let all = [
            INTERNAL_EXPANDER_ADDRESS,
            HEADER_EXPANDER_ADDRESS,
            VERSION_EXPANDER_ADDRESS,
            LIGHT_SENSOR_ADDRESS,
            ENVIRONMENTAL_SENSOR_ADDRESS,
            MOTION_SENSOR_ADDRESS,
            UART_BRIDGE_ADDRESS,
        ];
        for (i, a) in all.iter().enumerate() {
            assert!(all[i + 1..].iter().all(|b| b != a), "duplicate address {a:#04x}");
        }
    }
}
