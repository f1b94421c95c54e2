//! Test doubles for the bus and the publisher

use crate::publisher::{PublishError, Publisher};
use crate::shutdown::ShutdownSignal;
use can_protocol::{CanError, CanFrame, FrameReader};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replays a fixed script of read results, then idles
pub struct ScriptedReader {
    script: VecDeque<Result<Option<CanFrame>, CanError>>,
    stop_on_empty: Option<ShutdownSignal>,
    idle: Duration,
    closes: Arc<AtomicUsize>,
}

impl ScriptedReader {
    pub fn new(script: Vec<Result<Option<CanFrame>, CanError>>) -> Self {
        Self {
            script: script.into(),
            stop_on_empty: None,
            idle: Duration::from_millis(5),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Trigger `signal` once the script has been consumed
    pub fn stop_when_exhausted(mut self, signal: ShutdownSignal) -> Self {
        self.stop_on_empty = Some(signal);
        self
    }

    pub fn close_count(&self) -> Arc<AtomicUsize> {
        self.closes.clone()
    }
}

impl FrameReader for ScriptedReader {
    fn read_frame(&mut self) -> Result<Option<CanFrame>, CanError> {
        if let Some(next) = self.script.pop_front() {
            return next;
        }
        if let Some(signal) = &self.stop_on_empty {
            signal.trigger();
        }
        // Stand-in for the socket receive timeout
        std::thread::sleep(self.idle);
        Ok(None)
    }

    fn close(self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared view of what a [`RecordingPublisher`] saw
#[derive(Debug, Default)]
pub struct Recorded {
    pub registrations: usize,
    pub published: Vec<(u32, u32)>,
}

/// Publisher that records calls and can refuse the first registrations
pub struct RecordingPublisher {
    log: Arc<Mutex<Recorded>>,
    refuse_registrations: usize,
    fail_publishes: usize,
}

impl RecordingPublisher {
    pub fn new() -> (Self, Arc<Mutex<Recorded>>) {
        let log = Arc::new(Mutex::new(Recorded::default()));
        let publisher = Self {
            log: log.clone(),
            refuse_registrations: 0,
            fail_publishes: 0,
        };
        (publisher, log)
    }

    /// Refuse the first `n` registration attempts
    pub fn refusing(mut self, n: usize) -> Self {
        self.refuse_registrations = n;
        self
    }

    /// Reject the first `n` publish calls
    pub fn failing(mut self, n: usize) -> Self {
        self.fail_publishes = n;
        self
    }
}

impl Publisher for RecordingPublisher {
    fn name(&self) -> &str {
        "recording"
    }

    fn register(&mut self) -> Result<(), PublishError> {
        let mut log = self.log.lock().unwrap();
        log.registrations += 1;
        if log.registrations <= self.refuse_registrations {
            return Err(PublishError::NotReady("service not up".to_string()));
        }
        Ok(())
    }

    fn publish(&mut self, rpm: u32, speed: u32) -> Result<(), PublishError> {
        if self.fail_publishes > 0 {
            self.fail_publishes -= 1;
            return Err(PublishError::Rejected("attribute busy".to_string()));
        }
        self.log.lock().unwrap().published.push((rpm, speed));
        Ok(())
    }
}
