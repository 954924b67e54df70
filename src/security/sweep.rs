//! Periodic eviction of idle limiter entries.
//!
//! # Responsibilities
//! - Tick on a fixed interval
//! - Compact every window and drop sources idle past the horizon
//! - Stop on the shutdown broadcast

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::gate::clock::Clock;
use crate::security::rate_limit::RateLimiter;

pub struct LimiterSweeper {
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl LimiterSweeper {
    pub fn new(limiter: Arc<RateLimiter>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            limiter,
            clock,
            interval,
        }
    }

    /// Run one sweep immediately. Returns the number of evicted sources.
    pub fn sweep_once(&self) -> usize {
        let evicted = self.limiter.sweep(self.clock.now());
        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining = self.limiter.tracked_sources(),
                "Evicted idle rate-limit entries"
            );
        }
        evicted
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Limiter sweeper starting"
        );

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Limiter sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
