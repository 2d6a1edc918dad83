//! Periodic removal of batch records past the retention window.
//!
//! Batch state is volatile and only useful while a client is still
//! polling; the sweeper keeps the store from growing without bound. Once
//! a batch is swept its id reports not-found.

use crate::dispatch::store::BatchStore;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

pub struct RetentionSweeper {
    store: Arc<dyn BatchStore>,
    retention: ChronoDuration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn BatchStore>, retention: Duration, interval: Duration) -> Self {
        let retention =
            ChronoDuration::from_std(retention).unwrap_or_else(|_| ChronoDuration::hours(24));
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Run the sweep loop forever.
    pub async fn run(self) -> ! {
        log::info!(
            "retention sweeper started ({}s window, sweeping every {}s)",
            self.retention.num_seconds(),
            self.interval.as_secs()
        );

        loop {
            tokio::time::sleep(self.interval).await;

            let cutoff = Utc::now() - self.retention;
            let removed = self.store.sweep_older_than(cutoff);
            if removed > 0 {
                log::info!("sweeper: removed {} expired batches", removed);
            }
        }
    }
}
