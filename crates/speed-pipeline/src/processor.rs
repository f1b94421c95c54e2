//! Fixed-Rate Processing Loop
//!
//! Each cycle copies the latest raw value out of the shared slot, smooths
//! it, derives the linear speed and hands both to the publisher.

use crate::measurement::{Measurement, SharedMeasurement};
use crate::publisher::{PublishError, Publisher};
use crate::settings::ProcessorSettings;
use crate::shutdown::ShutdownSignal;
use metrics::counter;
use signal_filter::{MovingAverageFilter, SpeedCalculator};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Lifecycle of the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Running,
    Stopped,
}

/// Result of one processing cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedReading {
    pub raw: i32,
    pub filtered_rpm: f64,
    pub speed: f64,
}

impl SpeedReading {
    /// Filtered rpm as published
    pub fn rpm_published(&self) -> u32 {
        to_published(self.filtered_rpm)
    }

    /// Speed as published
    pub fn speed_published(&self) -> u32 {
        to_published(self.speed)
    }
}

/// Round to the nearest integer; `as` saturates, so negatives and NaN become 0
fn to_published(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

/// Counters collected by one run of the processor
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessorStats {
    pub cycles: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub registration_attempts: u64,
}

/// Filter-and-publish control loop
pub struct Processor {
    filter: MovingAverageFilter,
    calculator: SpeedCalculator,
    publisher: Box<dyn Publisher>,
    measurement: Arc<SharedMeasurement>,
    settings: ProcessorSettings,
    state: ProcessorState,
    stats: ProcessorStats,
    registered: bool,
    next_registration: Option<Instant>,
    stale: bool,
}

impl Processor {
    pub fn new(
        filter: MovingAverageFilter,
        calculator: SpeedCalculator,
        publisher: Box<dyn Publisher>,
        measurement: Arc<SharedMeasurement>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            filter,
            calculator,
            publisher,
            measurement,
            settings,
            state: ProcessorState::Idle,
            stats: ProcessorStats::default(),
            registered: false,
            next_registration: None,
            stale: false,
        }
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Run cycles at the configured period until `shutdown` is triggered
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> ProcessorStats {
        let period = self.settings.period();
        self.state = ProcessorState::Running;
        info!(
            "Processor running: period={:?}, publisher={}",
            period,
            self.publisher.name()
        );

        let mut deadline = Instant::now();
        while !shutdown.is_triggered() {
            self.step(Instant::now());

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            } else {
                debug!("Cycle overran by {:?}", now - deadline);
                deadline = now;
            }
        }

        self.state = ProcessorState::Stopped;
        info!(
            "Processor stopped: {} cycles, {} published, {} failures",
            self.stats.cycles, self.stats.published, self.stats.publish_failures
        );
        self.stats
    }

    /// Execute a single cycle as of `now`
    pub fn step(&mut self, now: Instant) -> SpeedReading {
        let snapshot = self.measurement.snapshot();
        self.track_staleness(&snapshot, now);

        let filtered_rpm = self.filter.filter(snapshot.raw_value);
        let speed = self.calculator.speed(filtered_rpm);
        let reading = SpeedReading {
            raw: snapshot.raw_value,
            filtered_rpm,
            speed,
        };

        info!(
            "Received RPM: {} | Filtered RPM: {:.2} | Speed: {:.2} {}",
            reading.raw,
            reading.filtered_rpm,
            reading.speed,
            self.calculator.geometry().unit.label()
        );

        self.publish(&reading, now);
        self.stats.cycles += 1;
        reading
    }

    fn publish(&mut self, reading: &SpeedReading, now: Instant) {
        if !self.registered && !self.try_register(now) {
            debug!("Publisher not registered, dropping sample");
            return;
        }

        match self
            .publisher
            .publish(reading.rpm_published(), reading.speed_published())
        {
            Ok(()) => self.stats.published += 1,
            Err(e) => {
                self.stats.publish_failures += 1;
                counter!("speed_publish_failures_total").increment(1);
                warn!("Publishing to {} failed: {}", self.publisher.name(), e);
                if matches!(e, PublishError::NotReady(_)) {
                    self.registered = false;
                    self.next_registration = Some(now + self.settings.register_retry());
                }
            }
        }
    }

    fn try_register(&mut self, now: Instant) -> bool {
        if self.next_registration.is_some_and(|at| now < at) {
            return false;
        }

        self.stats.registration_attempts += 1;
        match self.publisher.register() {
            Ok(()) => {
                info!("Publisher {} registered", self.publisher.name());
                self.registered = true;
                self.next_registration = None;
                true
            }
            Err(e) => {
                let retry = self.settings.register_retry();
                warn!(
                    "Registering publisher {} failed, trying again in {:?}: {}",
                    self.publisher.name(),
                    retry,
                    e
                );
                self.next_registration = Some(now + retry);
                false
            }
        }
    }

    fn track_staleness(&mut self, snapshot: &Measurement, now: Instant) {
        let stale = match snapshot.age(now) {
            Some(age) => age > self.settings.stale_after(),
            None => true,
        };
        if stale == self.stale {
            return;
        }
        self.stale = stale;

        match snapshot.age(now) {
            Some(age) if stale => warn!(
                "No wheel speed frame for {:?}, republishing raw value {}",
                age, snapshot.raw_value
            ),
            None => warn!("No wheel speed frame received yet"),
            _ => info!("Wheel speed frames resumed"),
        }
    }
}
