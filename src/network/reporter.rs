//! Periodic stats push to the connected producer

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::relay::Hub;

/// Background task that queues a stats message to the producer on every
/// tick. Pushes are best effort; a failed one is simply retried on the
/// next tick.
pub struct StatusReporter {
    hub: Arc<Hub>,
    interval: Duration,
}

impl StatusReporter {
    pub fn new(hub: Arc<Hub>, interval: Duration) -> Self {
        Self { hub, interval }
    }

    /// Run until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(interval_ms = self.interval.as_millis() as u64, "Status reporter started");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if self.hub.push_stats() {
                        tracing::trace!("Pushed stats to producer");
                    }
                }
            }
        }

        tracing::debug!("Status reporter stopped");
    }

    pub fn spawn(self, tracker: &TaskTracker, cancel: CancellationToken) -> JoinHandle<()> {
        tracker.spawn(self.run(cancel))
    }
}
