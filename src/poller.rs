//! PresencePoller: periodic re-scan of a bound scanner
//!
//! Scans on a fixed interval and hands each successful device set to a
//! callback. A failed scan is logged and skipped; the scanner keeps its
//! previous results. The scanner is logged out when polling stops.

use std::future::Future;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::scanner::{DeviceSet, Scanner};

/// Shortest period accepted by [`PresencePoller`]
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub scans: u64,
    pub failures: u64,
}

pub struct PresencePoller {
    scanner: Box<dyn Scanner>,
    interval: Duration,
    max_scans: Option<u64>,
}

impl PresencePoller {
    /// `interval` is raised to [`MIN_INTERVAL`] if shorter
    pub fn new(scanner: Box<dyn Scanner>, interval: Duration) -> Self {
        Self {
            scanner,
            interval: interval.max(MIN_INTERVAL),
            max_scans: None,
        }
    }

    /// Stop after this many scans
    pub fn with_max_scans(mut self, max_scans: u64) -> Self {
        self.max_scans = Some(max_scans);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn scanner(&self) -> &dyn Scanner {
        self.scanner.as_ref()
    }

    /// Poll until `shutdown` resolves or the scan limit is reached.
    /// The first scan runs immediately.
    pub async fn run<S, F>(&mut self, shutdown: S, mut on_devices: F) -> PollSummary
    where
        S: Future<Output = ()>,
        F: FnMut(&DeviceSet),
    {
        let variant = self.scanner.variant();
        tracing::info!(
            "[Poller] Polling {} every {}s",
            variant,
            self.interval.as_secs_f32()
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut summary = PollSummary::default();
        loop {
            if self.max_scans.is_some_and(|max| summary.scans >= max) {
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("[Poller] Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {}
            }

            summary.scans += 1;
            match self.scanner.scan().await {
                Ok(devices) => on_devices(&devices),
                Err(e) => {
                    summary.failures += 1;
                    tracing::warn!(
                        "[Poller] {} scan failed, keeping {} known clients: {}",
                        variant,
                        self.scanner.last_results().len(),
                        e
                    );
                }
            }
        }

        self.scanner.logout().await;
        tracing::info!(
            "[Poller] Stopped after {} scans ({} failed)",
            summary.scans,
            summary.failures
        );
        summary
    }
}
