//! Cooperative Shutdown Flag

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stop flag shared by the acquisition and processing loops
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every loop holding this signal to stop
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether shutdown was requested
    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Guard that triggers the signal when dropped, including on unwind
    pub(crate) fn trigger_on_drop(&self) -> TriggerOnDrop {
        TriggerOnDrop(self.clone())
    }
}

/// Stops the sibling loop when one worker exits
pub(crate) struct TriggerOnDrop(ShutdownSignal);

impl Drop for TriggerOnDrop {
    fn drop(&mut self) {
        self.0.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_triggered());
        signal.trigger();
        assert!(other.is_triggered());
    }

    #[test]
    fn test_guard_triggers_on_drop() {
        let signal = ShutdownSignal::new();
        {
            let _guard = signal.trigger_on_drop();
            assert!(!signal.is_triggered());
        }
        assert!(signal.is_triggered());
    }
}
