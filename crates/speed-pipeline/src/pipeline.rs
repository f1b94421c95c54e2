//! Pipeline Orchestration
//!
//! Opens the bus, runs the acquisition and processing loops on two named
//! threads and tears everything down once both have stopped.

use crate::acquisition::{AcquisitionStats, FrameSource};
use crate::measurement::SharedMeasurement;
use crate::processor::{Processor, ProcessorStats};
use crate::publisher::Publisher;
use crate::settings::Settings;
use crate::shutdown::ShutdownSignal;
use can_protocol::{CanError, FrameReader, WheelSpeedSignal};
use signal_filter::{FilterError, MovingAverageFilter, SpeedCalculator};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{error, info};

/// Errors that stop the pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Can(#[from] CanError),

    #[error("Invalid filter settings: {0}")]
    Filter(#[from] FilterError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Failed to spawn {0} thread: {1}")]
    Spawn(&'static str, #[source] std::io::Error),

    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
}

impl PipelineError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Filter(_) | PipelineError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Final counters from both loops
#[derive(Debug, Clone, Copy)]
pub struct PipelineReport {
    pub acquisition: AcquisitionStats,
    pub processing: ProcessorStats,
}

/// Wheel speed pipeline
pub struct Pipeline {
    settings: Settings,
    measurement: Arc<SharedMeasurement>,
    shutdown: ShutdownSignal,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            measurement: Arc::new(SharedMeasurement::new()),
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Load settings from `path` (or the default location), apply an
    /// interface override and validate the result
    pub fn load(path: Option<&Path>, interface: Option<&str>) -> Result<Self, PipelineError> {
        let mut settings = Settings::load(path)?;
        if let Some(interface) = interface {
            settings.can.interface = interface.to_string();
        }
        settings.validate()?;
        Ok(Self::new(settings))
    }

    /// Signal that stops both loops
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn measurement(&self) -> Arc<SharedMeasurement> {
        self.measurement.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build the processor from settings, validating filter and geometry
    pub fn build_processor(&self, publisher: Box<dyn Publisher>) -> Result<Processor, PipelineError> {
        let filter = MovingAverageFilter::new(
            self.settings.filter.window_size,
            self.settings.filter.outlier_threshold(),
        )?;
        let calculator = SpeedCalculator::new(self.settings.geometry)?;

        Ok(Processor::new(
            filter,
            calculator,
            publisher,
            self.measurement.clone(),
            self.settings.processor.clone(),
        ))
    }

    /// Open the configured CAN interface and run until shutdown
    ///
    /// Fails before any thread is started if the settings are invalid or the
    /// interface cannot be opened.
    #[cfg(target_os = "linux")]
    pub fn run(&self, publisher: Box<dyn Publisher>) -> Result<PipelineReport, PipelineError> {
        let processor = self.build_processor(publisher)?;
        let socket = can_protocol::CanSocket::open(
            &self.settings.can.interface,
            self.settings.can.recv_timeout(),
        )?;
        self.run_with(socket, processor)
    }

    /// Run both loops over an opened reader until shutdown
    ///
    /// The reader is closed exactly once, after the acquisition loop exits.
    pub fn run_with<R>(&self, reader: R, processor: Processor) -> Result<PipelineReport, PipelineError>
    where
        R: FrameReader + Send + 'static,
    {
        let signal = WheelSpeedSignal::new(self.settings.can.signal_id);
        let mut source = FrameSource::new(reader, signal, self.measurement.clone());

        let rx_shutdown = self.shutdown.clone();
        let rx = thread::Builder::new()
            .name("can-rx".to_string())
            .spawn(move || {
                let _stop_sibling = rx_shutdown.trigger_on_drop();
                let stats = source.receive_loop(&rx_shutdown);
                (source, stats)
            })
            .map_err(|e| PipelineError::Spawn("can-rx", e))?;

        let proc_shutdown = self.shutdown.clone();
        let mut processor = processor;
        let worker = thread::Builder::new()
            .name("speed-proc".to_string())
            .spawn(move || {
                let _stop_sibling = proc_shutdown.trigger_on_drop();
                processor.run(&proc_shutdown)
            });

        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                self.shutdown.trigger();
                if let Ok((source, _)) = rx.join() {
                    source.close();
                }
                return Err(PipelineError::Spawn("speed-proc", e));
            }
        };

        info!("Pipeline running on {}", self.settings.can.interface);

        let rx_result = rx.join();
        let worker_result = worker.join();

        let acquisition = match rx_result {
            Ok((source, stats)) => {
                source.close();
                stats
            }
            Err(_) => {
                error!("can-rx thread panicked");
                return Err(PipelineError::WorkerPanicked("can-rx"));
            }
        };
        let processing = worker_result.map_err(|_| {
            error!("speed-proc thread panicked");
            PipelineError::WorkerPanicked("speed-proc")
        })?;

        info!("Pipeline stopped");
        Ok(PipelineReport {
            acquisition,
            processing,
        })
    }
}
