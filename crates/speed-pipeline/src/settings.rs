//! Pipeline Configuration
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `SPEED_SENSOR_*` environment variables (`__` separates nested keys, e.g.
//! `SPEED_SENSOR_CAN__INTERFACE=vcan0`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use signal_filter::{WheelGeometry, DEFAULT_OUTLIER_THRESHOLD, DEFAULT_WINDOW_SIZE};
use std::path::Path;
use std::time::Duration;

/// Config file looked up when no path is given (extension optional)
pub const DEFAULT_CONFIG_PATH: &str = "config/speed-sensor";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "SPEED_SENSOR";

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Max log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub can: CanSettings,
    pub filter: FilterSettings,
    pub geometry: WheelGeometry,
    pub processor: ProcessorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            can: CanSettings::default(),
            filter: FilterSettings::default(),
            geometry: WheelGeometry::default(),
            processor: ProcessorSettings::default(),
        }
    }
}

/// Bus settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanSettings {
    /// Interface to bind (e.g. "can0", "vcan0")
    pub interface: String,
    /// Identifier of the wheel speed frame
    pub signal_id: u32,
    /// Receive timeout, bounds how long shutdown waits on the reader
    pub recv_timeout_ms: u64,
}

impl Default for CanSettings {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
            signal_id: can_protocol::id::WHEEL_SPEED,
            recv_timeout_ms: 100,
        }
    }
}

impl CanSettings {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
}

/// Smoothing filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Samples averaged
    pub window_size: usize,
    /// Outlier band in standard deviations, 0 disables clamping
    pub outlier_threshold: f64,
}

impl FilterSettings {
    pub fn outlier_threshold(&self) -> Option<f64> {
        (self.outlier_threshold != 0.0).then_some(self.outlier_threshold)
    }
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            outlier_threshold: DEFAULT_OUTLIER_THRESHOLD,
        }
    }
}

/// Processing loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Cycle period
    pub period_ms: u64,
    /// Age after which the measurement is reported stale
    pub stale_after_ms: u64,
    /// Delay between publisher registration attempts
    pub register_retry_ms: u64,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            period_ms: 100,
            stale_after_ms: 1000,
            register_retry_ms: 100,
        }
    }
}

impl ProcessorSettings {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }

    pub fn register_retry(&self) -> Duration {
        Duration::from_millis(self.register_retry_ms)
    }
}

impl Settings {
    /// Load settings from `path` (required) or the default location (optional)
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.can.interface.is_empty() {
            return Err(ConfigError::Message("can.interface must not be empty".into()));
        }
        if self.can.recv_timeout_ms == 0 {
            return Err(ConfigError::Message("can.recv_timeout_ms must be > 0".into()));
        }
        if self.processor.period_ms == 0 {
            return Err(ConfigError::Message("processor.period_ms must be > 0".into()));
        }
        if self.filter.window_size == 0 {
            return Err(ConfigError::Message("filter.window_size must be > 0".into()));
        }
        Ok(())
    }
}
