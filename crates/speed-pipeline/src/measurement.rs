//! Latest Raw Measurement Slot

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Copy of the slot contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measurement {
    /// Last decoded raw value (0 until the first frame)
    pub raw_value: i32,
    /// When the value was last written
    pub last_update: Option<Instant>,
}

impl Measurement {
    /// Time since the last write, `None` if never written
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.last_update.map(|t| now.saturating_duration_since(t))
    }
}

/// Single-value mailbox between the frame reader and the processor
///
/// Every write overwrites the previous value; the lock is only held for the
/// copy in or out.
#[derive(Debug, Default)]
pub struct SharedMeasurement {
    inner: Mutex<Measurement>,
}

impl SharedMeasurement {
    /// Create a slot holding the neutral value 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new raw value stamped with the current time
    pub fn store(&self, raw_value: i32) {
        self.store_at(raw_value, Instant::now());
    }

    /// Record a new raw value with an explicit timestamp
    pub fn store_at(&self, raw_value: i32, at: Instant) {
        let mut slot = self.lock();
        slot.raw_value = raw_value;
        slot.last_update = Some(at);
    }

    /// Copy the current contents out
    pub fn snapshot(&self) -> Measurement {
        *self.lock()
    }

    // A writer cannot leave the slot half-updated, so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Measurement> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_neutral() {
        let slot = SharedMeasurement::new();
        let m = slot.snapshot();
        assert_eq!(m.raw_value, 0);
        assert!(m.last_update.is_none());
        assert!(m.age(Instant::now()).is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let slot = SharedMeasurement::new();
        slot.store(10);
        slot.store(20);
        slot.store(30);

        let first = slot.snapshot();
        let second = slot.snapshot();
        assert_eq!(first.raw_value, 30);
        assert_eq!(first, second);
    }

    #[test]
    fn test_age() {
        let slot = SharedMeasurement::new();
        let t0 = Instant::now();
        slot.store_at(5, t0);
        let age = slot.snapshot().age(t0 + Duration::from_millis(250)).unwrap();
        assert_eq!(age, Duration::from_millis(250));
    }

    #[test]
    fn test_concurrent_reads_never_torn() {
        // Every written value is a multiple of 65537, so both 16-bit halves
        // match; a torn read would break that and the writer only increases.
        const WRITES: i32 = 20_000;
        const STRIDE: i32 = 65_537;

        let slot = Arc::new(SharedMeasurement::new());
        let writer_slot = slot.clone();
        let writer = thread::spawn(move || {
            for k in 1..=WRITES {
                writer_slot.store(k * STRIDE);
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let slot = slot.clone();
                thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..50_000 {
                        let m = slot.snapshot();
                        assert_eq!(m.raw_value % STRIDE, 0, "torn value {}", m.raw_value);
                        assert!(m.raw_value >= last, "went backwards");
                        assert_eq!(m.raw_value == 0, m.last_update.is_none());
                        last = m.raw_value;
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(slot.snapshot().raw_value, WRITES * STRIDE);
    }
}
