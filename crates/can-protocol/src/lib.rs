//! CAN Bus Access
//!
//! This crate provides raw SocketCAN access and decoding of the wheel-speed
//! signal published by the speed sensor node.

mod error;
mod frame;
mod reader;
#[cfg(target_os = "linux")]
mod socket;

pub use error::CanError;
pub use frame::{decode_raw, CanFrame, WheelSpeedSignal, CAN_MAX_DLEN};
pub use reader::FrameReader;
#[cfg(target_os = "linux")]
pub use socket::{CanSocket, DEFAULT_RECV_TIMEOUT};

/// Well-known frame identifiers on the sensor bus
pub mod id {
    /// Wheel rotational speed from the speed sensor node
    pub const WHEEL_SPEED: u32 = 0x100;
}
