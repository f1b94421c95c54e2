//! Filter Error Types

use thiserror::Error;

/// Errors raised when constructing filters or calculators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Window must hold at least one sample
    #[error("Filter window size must be at least 1")]
    InvalidWindow,

    /// Outlier threshold must be a positive finite number
    #[error("Outlier threshold must be positive and finite, got {0}")]
    InvalidThreshold(f64),

    /// Wheel geometry constants out of range
    #[error("Invalid wheel geometry: {0}")]
    InvalidGeometry(String),
}
