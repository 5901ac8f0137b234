//! Peripheral drivers used by the revision builders.

pub mod bridge;
pub mod button;
pub mod display;
pub mod rgb;
pub mod sensors;
pub mod speaker;
pub mod touch;

pub use bridge::{BridgeUart, UartChannel};
pub use button::{ButtonEvent, PushButton};
pub use display::{Display, DisplayController, DisplayPins};
pub use rgb::{RgbColor, RgbLed};
pub use sensors::{EnvironmentalReading, EnvironmentalSensor, LightSensor, MotionSensor};
pub use speaker::Speaker;
pub use touch::{TouchSample, Touchscreen};
