//! Signal Filtering and Speed Derivation
//!
//! Smooths raw wheel-speed samples and converts the result into a linear
//! vehicle speed.

mod error;
mod filter;
mod speed;

pub use error::FilterError;
pub use filter::{MovingAverageFilter, DEFAULT_OUTLIER_THRESHOLD, DEFAULT_WINDOW_SIZE};
pub use speed::{SpeedCalculator, SpeedUnit, WheelGeometry};
