//! Publisher Interface and Implementations
//!
//! The processor hands every cycle's result to a [`Publisher`]. Concrete
//! middleware bindings live outside this crate; two in-process
//! implementations are provided here.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Errors reported by a publisher
#[derive(Debug, Error)]
pub enum PublishError {
    /// Not registered yet (or lost its registration); retry later
    #[error("Publisher not ready: {0}")]
    NotReady(String),

    /// The values were refused
    #[error("Publisher rejected values: {0}")]
    Rejected(String),
}

/// Consumer of `(rpm, speed)` pairs
pub trait Publisher: Send {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Register with the backing service
    ///
    /// Called before the first publish and again after `NotReady`.
    fn register(&mut self) -> Result<(), PublishError> {
        Ok(())
    }

    /// Expose the latest values
    fn publish(&mut self, rpm: u32, speed: u32) -> Result<(), PublishError>;
}

/// Values published each cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedAttributes {
    pub rpm: u32,
    pub speed: u32,
}

/// Publisher that writes values to the log
#[derive(Debug, Default)]
pub struct LogPublisher {
    published: u64,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pairs published so far
    pub fn published(&self) -> u64 {
        self.published
    }
}

impl Publisher for LogPublisher {
    fn name(&self) -> &str {
        "log"
    }

    fn publish(&mut self, rpm: u32, speed: u32) -> Result<(), PublishError> {
        self.published += 1;
        info!(target: "speed_publisher", rpm, speed, "published");
        Ok(())
    }
}

/// Publisher exposing the latest values through a tokio `watch` channel
///
/// Behaves like a service attribute: subscribers always see the newest pair.
/// It is not ready while nobody is subscribed.
#[derive(Debug, Clone)]
pub struct WatchPublisher {
    tx: Arc<watch::Sender<SpeedAttributes>>,
}

impl WatchPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SpeedAttributes::default());
        Self { tx: Arc::new(tx) }
    }

    /// Subscribe to attribute updates
    pub fn subscribe(&self) -> watch::Receiver<SpeedAttributes> {
        self.tx.subscribe()
    }

    /// Last published values
    pub fn current(&self) -> SpeedAttributes {
        *self.tx.borrow()
    }
}

impl Default for WatchPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher for WatchPublisher {
    fn name(&self) -> &str {
        "watch"
    }

    fn register(&mut self) -> Result<(), PublishError> {
        if self.tx.receiver_count() == 0 {
            return Err(PublishError::NotReady("no subscribers".to_string()));
        }
        Ok(())
    }

    fn publish(&mut self, rpm: u32, speed: u32) -> Result<(), PublishError> {
        self.tx
            .send(SpeedAttributes { rpm, speed })
            .map_err(|_| PublishError::NotReady("all subscribers dropped".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_publisher_counts() {
        let mut publisher = LogPublisher::new();
        publisher.register().unwrap();
        publisher.publish(1200, 4).unwrap();
        publisher.publish(1210, 4).unwrap();
        assert_eq!(publisher.published(), 2);
    }

    #[test]
    fn test_watch_not_ready_without_subscribers() {
        let mut publisher = WatchPublisher::new();
        assert!(matches!(publisher.register(), Err(PublishError::NotReady(_))));
        assert!(matches!(publisher.publish(1, 1), Err(PublishError::NotReady(_))));
    }

    #[tokio::test]
    async fn test_watch_delivers_latest() {
        let mut publisher = WatchPublisher::new();
        let mut rx = publisher.subscribe();
        publisher.register().unwrap();

        publisher.publish(800, 3).unwrap();
        publisher.publish(900, 4).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), SpeedAttributes { rpm: 900, speed: 4 });
        assert_eq!(publisher.current(), SpeedAttributes { rpm: 900, speed: 4 });
    }

    #[tokio::test]
    async fn test_watch_loses_registration_when_subscribers_leave() {
        let mut publisher = WatchPublisher::new();
        let rx = publisher.subscribe();
        publisher.register().unwrap();
        drop(rx);
        assert!(matches!(publisher.publish(1, 1), Err(PublishError::NotReady(_))));
    }
}
