//! Wheel Speed Sensor - Main Entry Point

#[cfg(not(target_os = "linux"))]
compile_error!("speed-sensor needs Linux SocketCAN");

use anyhow::Context;
use clap::Parser;
use speed_pipeline::{init_logging, LogPublisher, Pipeline, ShutdownSignal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

/// Publishes smoothed wheel rpm and vehicle speed read from a CAN bus
#[derive(Parser, Debug)]
#[command(name = "speed-sensor", version, long_about = None)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CAN interface, overrides the config file
    #[arg(short, long)]
    interface: Option<String>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn install_shutdown_handler(shutdown: ShutdownSignal) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        info!("Shutdown requested");
        shutdown.trigger();
    })
    .context("failed to install signal handler")
}

fn main() -> ExitCode {
    let args = Args::parse();

    let pipeline = match Pipeline::load(args.config.as_deref(), args.interface.as_deref()) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("speed-sensor: {}", e);
            return ExitCode::from(e.exit_code());
        }
    };
    let settings = pipeline.settings();

    init_logging(if args.verbose { "debug" } else { settings.log_level.as_str() });

    info!("=== Wheel Speed Sensor v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "CAN interface {}, signal id {:03X}, period {} ms",
        settings.can.interface, settings.can.signal_id, settings.processor.period_ms
    );

    if let Err(e) = install_shutdown_handler(pipeline.shutdown_signal()) {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }

    match pipeline.run(Box::new(LogPublisher::new())) {
        Ok(report) => {
            info!(
                "Clean shutdown: {} frames received, {} cycles, {} published",
                report.acquisition.frames_received,
                report.processing.cycles,
                report.processing.published
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("speed-sensor: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
