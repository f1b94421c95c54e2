//! CAN Frame Layout and Signal Decoding
//!
//! Frames are read straight off a raw socket, so [`CanFrame`] mirrors the
//! kernel's `struct can_frame` byte for byte.

use crate::error::CanError;
use crate::id;

/// Maximum payload length of a classic CAN frame
pub const CAN_MAX_DLEN: usize = 8;

/// Classic CAN frame (matches `struct can_frame` in `linux/can.h`)
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanFrame {
    /// 32-bit identifier including the EFF/RTR/ERR flag bits
    pub can_id: u32,
    /// Data length code (payload bytes in use)
    pub dlc: u8,
    _pad: u8,
    _res0: u8,
    _len8_dlc: u8,
    /// Payload
    pub data: [u8; CAN_MAX_DLEN],
}

impl CanFrame {
    /// Size of the frame on the wire (16 bytes)
    pub const SIZE: usize = std::mem::size_of::<CanFrame>();

    /// Build a frame from an identifier and up to 8 payload bytes
    pub fn new(can_id: u32, payload: &[u8]) -> Result<Self, CanError> {
        if payload.len() > CAN_MAX_DLEN {
            return Err(CanError::MalformedFrame(format!(
                "payload of {} bytes exceeds {}",
                payload.len(),
                CAN_MAX_DLEN
            )));
        }

        let mut frame = Self {
            can_id,
            dlc: payload.len() as u8,
            ..Default::default()
        };
        frame.data[..payload.len()].copy_from_slice(payload);
        Ok(frame)
    }

    /// Payload bytes covered by the data length code
    pub fn payload(&self) -> &[u8] {
        let len = usize::from(self.dlc).min(CAN_MAX_DLEN);
        &self.data[..len]
    }
}

/// Reconstruct the raw speed value from two big-endian payload bytes
///
/// The sensor transmits an unsigned 16-bit count, so the result is always
/// in `0..=65535`.
pub fn decode_raw(b0: u8, b1: u8) -> i32 {
    i32::from(u16::from_be_bytes([b0, b1]))
}

/// The wheel rotational speed signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelSpeedSignal {
    can_id: u32,
}

impl WheelSpeedSignal {
    /// Offset of the first payload byte holding the value
    pub const OFFSET: usize = 0;
    /// Number of payload bytes holding the value
    pub const WIDTH: usize = 2;

    /// Track the signal on a custom identifier
    pub fn new(can_id: u32) -> Self {
        Self { can_id }
    }

    /// Identifier carrying this signal
    pub fn can_id(&self) -> u32 {
        self.can_id
    }

    /// Check whether a frame carries this signal
    pub fn matches(&self, frame: &CanFrame) -> bool {
        frame.can_id == self.can_id
    }

    /// Decode the raw value from a frame
    ///
    /// Returns `Ok(None)` for frames with another identifier and
    /// `MalformedFrame` when a tracked frame is too short to hold the value.
    pub fn decode(&self, frame: &CanFrame) -> Result<Option<i32>, CanError> {
        if !self.matches(frame) {
            return Ok(None);
        }

        match frame.payload().get(Self::OFFSET..Self::OFFSET + Self::WIDTH) {
            Some(&[b0, b1]) => Ok(Some(decode_raw(b0, b1))),
            _ => Err(CanError::MalformedFrame(format!(
                "id {:03X} carries {} bytes, need {}",
                frame.can_id,
                frame.dlc,
                Self::OFFSET + Self::WIDTH
            ))),
        }
    }
}

impl Default for WheelSpeedSignal {
    fn default() -> Self {
        Self::new(id::WHEEL_SPEED)
    }
}
