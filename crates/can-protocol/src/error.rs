//! CAN Error Types

use thiserror::Error;

/// Errors that can occur while talking to the CAN bus
#[derive(Debug, Error)]
pub enum CanError {
    /// The named interface does not exist on this host
    #[error("CAN interface not found: {0}")]
    InterfaceNotFound(String),

    /// A socket syscall failed
    #[error("CAN socket {op} failed: {source}")]
    Socket {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A frame arrived with an unexpected size or payload length
    #[error("Malformed CAN frame: {0}")]
    MalformedFrame(String),
}

impl CanError {
    pub(crate) fn socket(op: &'static str, source: std::io::Error) -> Self {
        CanError::Socket { op, source }
    }

    /// Whether this error only affects a single frame
    pub fn is_malformed(&self) -> bool {
        matches!(self, CanError::MalformedFrame(_))
    }
}
