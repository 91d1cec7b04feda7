//! Background sweep of abandoned staged assets
//!
//! Uploads whose promotion never came (a closed form, an abandoned edit)
//! sit in the staging tree until the retention window lapses; this service
//! reclaims them on an interval.

use crate::reaper::Reaper;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

pub struct SweepService {
    reaper: Arc<Reaper>,
    retention_hours: i64,
    interval_secs: u64,
}

impl SweepService {
    pub fn new(reaper: Arc<Reaper>, retention_hours: i64, interval_secs: u64) -> Self {
        Self {
            reaper,
            retention_hours,
            interval_secs,
        }
    }

    /// Start the background sweep task. Returns a JoinHandle for graceful
    /// shutdown.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep_interval = interval(Duration::from_secs(self.interval_secs));

            loop {
                sweep_interval.tick().await;

                tracing::info!(
                    retention_hours = self.retention_hours,
                    "Starting scheduled sweep of stale staged assets"
                );

                match self.reaper.sweep_stale(self.retention_hours).await {
                    Ok(reaped) => {
                        tracing::info!(reaped, "Sweep completed");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Sweep failed");
                    }
                }
            }
        })
    }
}
