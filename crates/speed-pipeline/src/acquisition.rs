//! Frame Acquisition Loop
//!
//! Reads frames off the bus and keeps [`SharedMeasurement`] up to date.

use crate::measurement::SharedMeasurement;
use crate::shutdown::ShutdownSignal;
use can_protocol::{CanError, FrameReader, WheelSpeedSignal};
use metrics::counter;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Pause after a hard receive error before trying again
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Counters collected by one run of the receive loop
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquisitionStats {
    /// Full-size frames received, any identifier
    pub frames_received: u64,
    /// Frames that updated the measurement
    pub frames_tracked: u64,
    /// Frames dropped as malformed
    pub frames_malformed: u64,
    /// Receive errors other than timeouts
    pub read_errors: u64,
    /// Time of the last full-size frame
    pub last_frame_at: Option<Instant>,
}

/// Owns the bus handle and writes decoded values into the shared slot
pub struct FrameSource<R: FrameReader> {
    reader: R,
    signal: WheelSpeedSignal,
    measurement: Arc<SharedMeasurement>,
}

#[cfg(target_os = "linux")]
impl FrameSource<can_protocol::CanSocket> {
    /// Open and bind a raw CAN socket on `interface`
    pub fn open(
        interface: &str,
        recv_timeout: Duration,
        signal: WheelSpeedSignal,
        measurement: Arc<SharedMeasurement>,
    ) -> Result<Self, CanError> {
        let socket = can_protocol::CanSocket::open(interface, recv_timeout)?;
        Ok(Self::new(socket, signal, measurement))
    }
}

impl<R: FrameReader> FrameSource<R> {
    /// Wrap an already opened reader
    pub fn new(reader: R, signal: WheelSpeedSignal, measurement: Arc<SharedMeasurement>) -> Self {
        Self {
            reader,
            signal,
            measurement,
        }
    }

    /// Receive frames until `shutdown` is triggered
    pub fn receive_loop(&mut self, shutdown: &ShutdownSignal) -> AcquisitionStats {
        info!(
            "Frame acquisition started, tracking id {:03X}",
            self.signal.can_id()
        );
        let mut stats = AcquisitionStats::default();

        while !shutdown.is_triggered() {
            match self.reader.read_frame() {
                Ok(Some(frame)) => {
                    stats.frames_received += 1;
                    stats.last_frame_at = Some(Instant::now());
                    counter!("can_frames_received_total").increment(1);

                    match self.signal.decode(&frame) {
                        Ok(Some(raw)) => {
                            self.measurement.store(raw);
                            stats.frames_tracked += 1;
                            trace!("raw value {}", raw);
                        }
                        Ok(None) => {}
                        Err(e) => Self::drop_malformed(&mut stats, &e),
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_malformed() => Self::drop_malformed(&mut stats, &e),
                Err(e) => {
                    stats.read_errors += 1;
                    warn!("CAN read error: {}", e);
                    std::thread::sleep(READ_ERROR_BACKOFF);
                }
            }
        }

        info!(
            "Frame acquisition stopped: {} frames, {} tracked, {} malformed",
            stats.frames_received, stats.frames_tracked, stats.frames_malformed
        );
        stats
    }

    fn drop_malformed(stats: &mut AcquisitionStats, err: &CanError) {
        stats.frames_malformed += 1;
        counter!("can_frames_malformed_total").increment(1);
        debug!("Dropping frame: {}", err);
    }

    /// Release the bus handle
    pub fn close(self) {
        self.reader.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedReader;
    use can_protocol::CanFrame;
    use std::io;

    fn frame(id: u32, payload: &[u8]) -> CanFrame {
        CanFrame::new(id, payload).unwrap()
    }

    #[test]
    fn test_tracked_frames_update_measurement() {
        let shutdown = ShutdownSignal::new();
        let measurement = Arc::new(SharedMeasurement::new());
        let reader = ScriptedReader::new(vec![
            Ok(Some(frame(0x100, &[0x01, 0x00, 0, 0, 0, 0, 0, 0]))),
            Ok(Some(frame(0x200, &[0xFF, 0xFF]))),
            Ok(None),
            Ok(Some(frame(0x100, &[0x02, 0x10]))),
        ])
        .stop_when_exhausted(shutdown.clone());

        let mut source = FrameSource::new(reader, WheelSpeedSignal::default(), measurement.clone());
        let stats = source.receive_loop(&shutdown);

        assert_eq!(stats.frames_received, 3);
        assert_eq!(stats.frames_tracked, 2);
        assert!(stats.last_frame_at.is_some());
        assert_eq!(measurement.snapshot().raw_value, 0x0210);
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let shutdown = ShutdownSignal::new();
        let measurement = Arc::new(SharedMeasurement::new());
        let reader = ScriptedReader::new(vec![
            Ok(Some(frame(0x100, &[0x00, 0x64]))),
            Err(CanError::MalformedFrame("short read".to_string())),
            Ok(Some(frame(0x100, &[0x07]))),
        ])
        .stop_when_exhausted(shutdown.clone());

        let mut source = FrameSource::new(reader, WheelSpeedSignal::default(), measurement.clone());
        let stats = source.receive_loop(&shutdown);

        assert_eq!(stats.frames_malformed, 2);
        assert_eq!(stats.frames_tracked, 1);
        assert_eq!(measurement.snapshot().raw_value, 100);
    }

    #[test]
    fn test_read_errors_do_not_stop_the_loop() {
        let shutdown = ShutdownSignal::new();
        let measurement = Arc::new(SharedMeasurement::new());
        let reader = ScriptedReader::new(vec![
            Err(CanError::Socket {
                op: "recv",
                source: io::Error::new(io::ErrorKind::Other, "bus off"),
            }),
            Ok(Some(frame(0x100, &[0x00, 0x2A]))),
        ])
        .stop_when_exhausted(shutdown.clone());

        let mut source = FrameSource::new(reader, WheelSpeedSignal::default(), measurement.clone());
        let stats = source.receive_loop(&shutdown);

        assert_eq!(stats.read_errors, 1);
        assert_eq!(measurement.snapshot().raw_value, 42);
    }

    #[test]
    fn test_close_releases_reader_once() {
        let reader = ScriptedReader::new(Vec::new());
        let closes = reader.close_count();
        let source = FrameSource::new(
            reader,
            WheelSpeedSignal::default(),
            Arc::new(SharedMeasurement::new()),
        );
        source.close();
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
