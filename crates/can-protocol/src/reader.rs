//! Frame Reader Abstraction

use crate::error::CanError;
use crate::frame::CanFrame;

/// A source of CAN frames
///
/// `read_frame` blocks for at most a bounded interval so callers can poll a
/// stop flag between reads. `Ok(None)` means nothing arrived in time.
pub trait FrameReader {
    /// Receive the next frame
    fn read_frame(&mut self) -> Result<Option<CanFrame>, CanError>;

    /// Release the underlying handle
    fn close(self)
    where
        Self: Sized,
    {
    }
}
