//! Wheel Speed Pipeline
//!
//! Reads the wheel rotational speed off the CAN bus, smooths it, derives
//! linear speed and republishes both at a fixed rate.

mod acquisition;
mod measurement;
mod pipeline;
mod processor;
mod publisher;
mod settings;
mod shutdown;

#[cfg(test)]
mod testing;

pub use acquisition::{AcquisitionStats, FrameSource};
pub use measurement::{Measurement, SharedMeasurement};
pub use pipeline::{Pipeline, PipelineError, PipelineReport};
pub use processor::{Processor, ProcessorState, ProcessorStats, SpeedReading};
pub use publisher::{LogPublisher, PublishError, Publisher, SpeedAttributes, WatchPublisher};
pub use settings::{
    CanSettings, FilterSettings, ProcessorSettings, Settings, DEFAULT_CONFIG_PATH, ENV_PREFIX,
};
pub use shutdown::ShutdownSignal;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging at `level` (falls back to info if unparsable)
pub fn init_logging(level: &str) {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(true)
        .finish();

    // Only the first call installs a subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}
