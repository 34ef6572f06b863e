//! Progress plumbing between the repository service and the status store.
//!
//! The service reports samples synchronously through [`CloneProgressSink`];
//! the sink only publishes the latest sample on a watch channel, so a slow
//! status store never stalls the transfer. The worker drains the channel and
//! writes at most one update per interval.

use clone_pipeline_domain::CloneProgressUpdate;
use clone_pipeline_ports::CloneProgressSink;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Sink that keeps only the most recent sample.
#[derive(Debug)]
pub struct WatchProgressSink {
    sender: watch::Sender<Option<CloneProgressUpdate>>,
}

impl WatchProgressSink {
    /// Create a sink and the receiver that observes it.
    #[must_use]
    pub fn channel() -> (Self, watch::Receiver<Option<CloneProgressUpdate>>) {
        let (sender, receiver) = watch::channel(None);
        (Self { sender }, receiver)
    }
}

impl CloneProgressSink for WatchProgressSink {
    fn report(&self, update: CloneProgressUpdate) {
        self.sender.send_if_modified(|current| {
            if *current == Some(update) {
                return false;
            }
            *current = Some(update);
            true
        });
    }
}

/// Write throttle for progress samples.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last_write: Option<Instant>,
    last_percentage: Option<u8>,
}

impl ProgressThrottle {
    /// Allow one write per `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_write: None,
            last_percentage: None,
        }
    }

    /// Returns true (and records the write) when `update` should be persisted.
    pub fn admit(&mut self, update: &CloneProgressUpdate) -> bool {
        if self.last_percentage == Some(update.percentage) {
            return false;
        }
        let now = Instant::now();
        if self
            .last_write
            .is_some_and(|last| now.duration_since(last) < self.interval)
        {
            return false;
        }
        self.last_write = Some(now);
        self.last_percentage = Some(update.percentage);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(percentage: u8) -> CloneProgressUpdate {
        CloneProgressUpdate {
            percentage,
            objects: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_spaces_writes() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(500));
        assert!(throttle.admit(&sample(1)));
        assert!(!throttle.admit(&sample(2)));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(throttle.admit(&sample(3)));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!throttle.admit(&sample(3)));
    }

    #[tokio::test]
    async fn sink_keeps_latest_sample() {
        let (sink, mut receiver) = WatchProgressSink::channel();
        sink.report(sample(10));
        sink.report(sample(20));
        assert!(receiver.has_changed().unwrap_or(false));
        assert_eq!(*receiver.borrow_and_update(), Some(sample(20)));

        sink.report(sample(20));
        assert!(!receiver.has_changed().unwrap_or(true));
    }
}
