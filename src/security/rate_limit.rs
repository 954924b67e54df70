//! Sliding-window failure limiter keyed by source identity.
//!
//! Each source owns a window of failure timestamps. Windows are compacted
//! lazily whenever their source is touched and swept periodically once idle
//! (see `sweep.rs`).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Error building a limiter policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("window must be greater than zero")]
    ZeroWindow,

    #[error("window of {0:?} is out of range")]
    WindowOutOfRange(Duration),

    #[error("threshold must be at least 1")]
    ZeroThreshold,

    #[error("idle multiplier {0} is out of range")]
    IdleMultiplier(u32),
}

/// Window length, failure threshold, and idle horizon in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitPolicy {
    window: TimeDelta,
    threshold: usize,
    idle_horizon: TimeDelta,
}

impl LimitPolicy {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
    pub const DEFAULT_THRESHOLD: usize = 1000;
    pub const DEFAULT_IDLE_MULTIPLIER: u32 = 2;

    /// Policy admitting fewer than `threshold` failures per trailing `window`.
    pub fn new(window: Duration, threshold: usize) -> Result<Self, PolicyError> {
        Self::with_idle_multiplier(window, threshold, Self::DEFAULT_IDLE_MULTIPLIER)
    }

    /// Like [`LimitPolicy::new`], with empty windows evicted after
    /// `idle_multiplier` whole windows without activity.
    pub fn with_idle_multiplier(
        window: Duration,
        threshold: usize,
        idle_multiplier: u32,
    ) -> Result<Self, PolicyError> {
        if window.is_zero() {
            return Err(PolicyError::ZeroWindow);
        }
        if threshold == 0 {
            return Err(PolicyError::ZeroThreshold);
        }
        let window = TimeDelta::from_std(window).map_err(|_| PolicyError::WindowOutOfRange(window))?;
        let idle_horizon = i32::try_from(idle_multiplier)
            .ok()
            .filter(|m| *m > 0)
            .and_then(|m| window.checked_mul(m))
            .ok_or(PolicyError::IdleMultiplier(idle_multiplier))?;

        Ok(Self {
            window,
            threshold,
            idle_horizon,
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self, PolicyError> {
        Self::with_idle_multiplier(
            Duration::from_secs(config.window_secs),
            config.threshold,
            config.idle_multiplier,
        )
    }

    pub fn window(&self) -> TimeDelta {
        self.window
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn idle_horizon(&self) -> TimeDelta {
        self.idle_horizon
    }
}

impl Default for LimitPolicy {
    fn default() -> Self {
        let window = TimeDelta::seconds(60);
        Self {
            window,
            threshold: Self::DEFAULT_THRESHOLD,
            idle_horizon: window * Self::DEFAULT_IDLE_MULTIPLIER as i32,
        }
    }
}

/// Failure history of one source.
#[derive(Debug, Default)]
struct FailureWindow {
    /// Failure instants, oldest first.
    failures: VecDeque<DateTime<Utc>>,
    /// Admitted attempts whose outcome is not known yet.
    in_flight: usize,
    last_seen: Option<DateTime<Utc>>,
}

impl FailureWindow {
    fn compact(&mut self, now: DateTime<Utc>, window: TimeDelta) {
        while let Some(&oldest) = self.failures.front() {
            if now - oldest >= window {
                self.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn push(&mut self, at: DateTime<Utc>) {
        // Racing writers may hand in slightly older instants; keep the deque sorted.
        let idx = self.failures.partition_point(|t| *t <= at);
        self.failures.insert(idx, at);
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        if self.last_seen.map_or(true, |seen| now > seen) {
            self.last_seen = Some(now);
        }
    }

    fn is_idle(&self, now: DateTime<Utc>, horizon: TimeDelta) -> bool {
        self.failures.is_empty()
            && self.in_flight == 0
            && self.last_seen.map_or(true, |seen| now - seen >= horizon)
    }
}

/// Result of [`RateLimiter::reserve`].
#[derive(Debug)]
pub enum Admission<'a> {
    /// The attempt may proceed; the reservation holds one of the source's
    /// remaining slots until it is settled.
    Admitted(Reservation<'a>),
    /// The source has at least `threshold` failures in its window.
    Denied { failures: usize },
}

/// An admitted, unresolved attempt.
///
/// Dropping it releases the slot without recording anything. Converting it
/// with [`Reservation::record_failure`] turns the slot into a failure.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it immediately"]
pub struct Reservation<'a> {
    limiter: &'a RateLimiter,
    source: String,
    settled: bool,
}

impl Reservation<'_> {
    /// Resolve the attempt as a failure at `now`.
    pub fn record_failure(mut self, now: DateTime<Utc>) {
        self.settled = true;
        self.limiter.settle(&self.source, Some(now));
    }

    /// Resolve the attempt without recording a failure.
    pub fn release(self) {}
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.limiter.settle(&self.source, None);
        }
    }
}

/// Per-source sliding-window limiter.
///
/// Windows live in a sharded map, so sources on different shards never
/// contend. Everything that reads or writes one source's window happens
/// under that entry's lock.
///
/// `reserve` may block while every remaining slot of a source is held by
/// an unresolved attempt. Each settle bumps `settled` and wakes the waiters.
pub struct RateLimiter {
    windows: DashMap<String, FailureWindow>,
    policy: ArcSwap<LimitPolicy>,
    settled: Mutex<u64>,
    settled_cv: Condvar,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("sources", &self.windows.len())
            .field("policy", &self.policy())
            .finish()
    }
}

impl RateLimiter {
    pub fn new(policy: LimitPolicy) -> Self {
        Self {
            windows: DashMap::new(),
            policy: ArcSwap::from_pointee(policy),
            settled: Mutex::new(0),
            settled_cv: Condvar::new(),
        }
    }

    pub fn policy(&self) -> LimitPolicy {
        **self.policy.load()
    }

    /// Swap the policy in place. Existing windows are re-evaluated against it
    /// the next time they are touched.
    pub fn set_policy(&self, policy: LimitPolicy) {
        self.policy.store(std::sync::Arc::new(policy));
        // A raised threshold frees slots for parked attempts.
        self.notify_settled();
    }

    /// Whether `source` is below the threshold at `now`.
    ///
    /// Compacts the source's window first; records nothing. A source that has
    /// never failed is always admitted.
    pub fn admit(&self, source: &str, now: DateTime<Utc>) -> bool {
        let policy = self.policy();
        match self.windows.get_mut(source) {
            Some(mut window) => {
                window.compact(now, policy.window);
                window.touch(now);
                window.failures.len() < policy.threshold
            }
            None => true,
        }
    }

    /// Add a failure at `now` to `source`'s window.
    pub fn record_failure(&self, source: &str, now: DateTime<Utc>) {
        let policy = self.policy();
        let mut window = self.windows.entry(source.to_owned()).or_default();
        window.compact(now, policy.window);
        window.push(now);
        window.touch(now);
    }

    /// Failures currently inside `source`'s window.
    pub fn failure_count(&self, source: &str, now: DateTime<Utc>) -> usize {
        let policy = self.policy();
        match self.windows.get_mut(source) {
            Some(mut window) => {
                window.compact(now, policy.window);
                window.failures.len()
            }
            None => 0,
        }
    }

    /// Atomically admit an attempt and hold a slot for it.
    ///
    /// Denies only a source with at least `threshold` failures in its window.
    /// When failures plus unresolved reservations already fill the threshold,
    /// the call blocks until one of them settles and then decides again, so
    /// concurrent attempts resolve as if they had run one after another and
    /// no lock is held while credentials are checked.
    pub fn reserve(&self, source: &str, now: DateTime<Utc>) -> Admission<'_> {
        loop {
            let seen = self.settle_generation();
            let policy = self.policy();
            {
                let mut window = self.windows.entry(source.to_owned()).or_default();
                window.compact(now, policy.window);
                window.touch(now);

                let failures = window.failures.len();
                if failures >= policy.threshold {
                    return Admission::Denied { failures };
                }
                if failures + window.in_flight < policy.threshold {
                    window.in_flight += 1;
                    drop(window);
                    return Admission::Admitted(Reservation {
                        limiter: self,
                        source: source.to_owned(),
                        settled: false,
                    });
                }
            }

            tracing::debug!(source = %source, "Waiting for an in-flight attempt to settle");
            self.wait_for_settle(seen);
        }
    }

    fn settle(&self, source: &str, failure: Option<DateTime<Utc>>) {
        match self.windows.get_mut(source) {
            Some(mut window) => {
                assert!(
                    window.in_flight > 0,
                    "in-flight count underflow for source {source}"
                );
                window.in_flight -= 1;
                if let Some(at) = failure {
                    window.push(at);
                    window.touch(at);
                }
            }
            None => {
                // Entries with reservations are never swept.
                tracing::error!(source = %source, "Reservation settled for an untracked source");
                if let Some(at) = failure {
                    self.record_failure(source, at);
                }
            }
        }
        self.notify_settled();
    }

    fn settle_generation(&self) -> u64 {
        *self.settled.lock().expect("limiter settle mutex poisoned")
    }

    fn wait_for_settle(&self, seen: u64) {
        let generation = self.settled.lock().expect("limiter settle mutex poisoned");
        let _generation = self
            .settled_cv
            .wait_while(generation, |generation| *generation == seen)
            .expect("limiter settle mutex poisoned");
    }

    fn notify_settled(&self) {
        let mut generation = self.settled.lock().expect("limiter settle mutex poisoned");
        *generation = generation.wrapping_add(1);
        drop(generation);
        self.settled_cv.notify_all();
    }

    /// Compact every window and drop the ones idle past the horizon.
    ///
    /// Returns the number of sources evicted.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let policy = self.policy();
        let mut evicted = 0;
        self.windows.retain(|_, window| {
            window.compact(now, policy.window);
            if window.is_idle(now, policy.idle_horizon) {
                evicted += 1;
                false
            } else {
                true
            }
        });

        metrics::record_limiter_sweep(evicted, self.windows.len());
        evicted
    }

    /// Number of sources with a tracked window.
    pub fn tracked_sources(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(LimitPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn limiter(window_secs: u64, threshold: usize) -> RateLimiter {
        RateLimiter::new(LimitPolicy::new(Duration::from_secs(window_secs), threshold).unwrap())
    }

    #[test]
    fn test_threshold_three_per_minute() {
        let limiter = limiter(60, 3);
        for t in [0, 10, 20] {
            limiter.record_failure("S", at(t));
        }

        assert!(!limiter.admit("S", at(25)));
        assert!(limiter.admit("S", at(61)));
        assert_eq!(limiter.failure_count("S", at(61)), 2);
        assert!(limiter.admit("S", at(71)));
        assert_eq!(limiter.failure_count("S", at(71)), 1);
    }

    #[test]
    fn test_failure_expires_exactly_at_window() {
        let limiter = limiter(60, 1);
        limiter.record_failure("S", at(0));

        assert!(!limiter.admit("S", at(59)));
        assert!(limiter.admit("S", at(60)));
    }

    #[test]
    fn test_unknown_source_admitted() {
        let limiter = limiter(60, 1);
        assert!(limiter.admit("never-seen", at(0)));
        assert_eq!(limiter.failure_count("never-seen", at(0)), 0);
        assert_eq!(limiter.tracked_sources(), 0);
    }

    #[test]
    fn test_sources_are_independent() {
        let limiter = limiter(60, 2);
        limiter.record_failure("a", at(0));
        limiter.record_failure("a", at(1));

        assert!(!limiter.admit("a", at(2)));
        assert!(limiter.admit("b", at(2)));
    }

    #[test]
    fn test_out_of_order_failures_stay_sorted() {
        let limiter = limiter(60, 10);
        limiter.record_failure("S", at(30));
        limiter.record_failure("S", at(5));
        limiter.record_failure("S", at(20));

        // at(66) expires the failure at 5 only.
        assert_eq!(limiter.failure_count("S", at(66)), 2);
        assert_eq!(limiter.failure_count("S", at(85)), 1);
    }

    #[test]
    fn test_reserve_counts_in_flight_attempts() {
        let limiter = limiter(60, 2);
        let first = match limiter.reserve("S", at(0)) {
            Admission::Admitted(r) => r,
            Admission::Denied { .. } => panic!("first attempt should be admitted"),
        };
        let second = match limiter.reserve("S", at(0)) {
            Admission::Admitted(r) => r,
            Admission::Denied { .. } => panic!("second attempt should be admitted"),
        };

        first.release();
        second.record_failure(at(1));

        assert_eq!(limiter.failure_count("S", at(2)), 1);
        assert!(matches!(limiter.reserve("S", at(2)), Admission::Admitted(_)));
    }

    #[test]
    fn test_reserve_waits_for_in_flight_success() {
        let limiter = limiter(60, 1);
        let first = match limiter.reserve("S", at(0)) {
            Admission::Admitted(r) => r,
            Admission::Denied { .. } => panic!("first attempt should be admitted"),
        };

        std::thread::scope(|scope| {
            let second = scope.spawn(|| match limiter.reserve("S", at(0)) {
                Admission::Admitted(r) => {
                    r.release();
                    None
                }
                Admission::Denied { failures } => Some(failures),
            });

            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(!second.is_finished());
            first.release();

            assert_eq!(second.join().unwrap(), None);
        });
        assert_eq!(limiter.failure_count("S", at(0)), 0);
    }

    #[test]
    fn test_reserve_waits_for_in_flight_failure() {
        let limiter = limiter(60, 1);
        let first = match limiter.reserve("S", at(0)) {
            Admission::Admitted(r) => r,
            Admission::Denied { .. } => panic!("first attempt should be admitted"),
        };

        std::thread::scope(|scope| {
            let second = scope.spawn(|| match limiter.reserve("S", at(0)) {
                Admission::Admitted(_) => None,
                Admission::Denied { failures } => Some(failures),
            });

            std::thread::sleep(std::time::Duration::from_millis(50));
            first.record_failure(at(0));

            assert_eq!(second.join().unwrap(), Some(1));
        });
    }

    #[test]
    fn test_raised_threshold_wakes_waiters() {
        let limiter = limiter(60, 1);
        let first = match limiter.reserve("S", at(0)) {
            Admission::Admitted(r) => r,
            Admission::Denied { .. } => panic!("first attempt should be admitted"),
        };

        std::thread::scope(|scope| {
            let second = scope.spawn(|| matches!(limiter.reserve("S", at(0)), Admission::Admitted(_)));

            std::thread::sleep(std::time::Duration::from_millis(50));
            limiter.set_policy(LimitPolicy::new(Duration::from_secs(60), 2).unwrap());

            assert!(second.join().unwrap());
        });
        first.release();
    }

    #[test]
    fn test_dropped_reservation_records_nothing() {
        let limiter = limiter(60, 1);
        {
            let _reservation = limiter.reserve("S", at(0));
        }
        assert_eq!(limiter.failure_count("S", at(0)), 0);
        assert!(limiter.admit("S", at(0)));
        assert!(matches!(limiter.reserve("S", at(1)), Admission::Admitted(_)));
    }

    #[test]
    fn test_denied_reservation_reports_failures() {
        let limiter = limiter(60, 2);
        limiter.record_failure("S", at(0));
        limiter.record_failure("S", at(1));

        match limiter.reserve("S", at(2)) {
            Admission::Denied { failures } => assert_eq!(failures, 2),
            Admission::Admitted(_) => panic!("source over threshold was admitted"),
        }
        assert_eq!(limiter.failure_count("S", at(2)), 2);
    }

    #[test]
    fn test_concurrent_failures_all_retained() {
        let limiter = limiter(60, usize::MAX);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for i in 0..250 {
                        limiter.record_failure("S", at(i % 30));
                    }
                });
            }
        });

        assert_eq!(limiter.failure_count("S", at(30)), 2000);
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_threshold() {
        let limiter = limiter(60, 5);
        let admitted = std::sync::atomic::AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        if let Admission::Admitted(r) = limiter.reserve("S", at(0)) {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                            r.record_failure(at(0));
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.load(std::sync::atomic::Ordering::SeqCst), 5);
        assert_eq!(limiter.failure_count("S", at(1)), 5);
    }

    #[test]
    fn test_sweep_evicts_many_transient_sources() {
        let limiter = limiter(60, 3);
        for i in 0..10_000 {
            let source = format!("198.51.{}.{}", i / 256, i % 256);
            limiter.record_failure(&source, at(0));
            assert!(limiter.admit(&source, at(1)));
        }
        assert_eq!(limiter.tracked_sources(), 10_000);

        // Windows are empty at 60s but not yet idle for two windows.
        assert_eq!(limiter.sweep(at(90)), 0);
        assert_eq!(limiter.sweep(at(121)), 10_000);
        assert_eq!(limiter.tracked_sources(), 0);
    }

    #[test]
    fn test_sweep_keeps_active_and_reserved_sources() {
        let limiter = limiter(60, 3);
        limiter.record_failure("failing", at(100));
        let reservation = limiter.reserve("pending", at(0));
        limiter.record_failure("idle", at(0));

        assert_eq!(limiter.sweep(at(130)), 1);
        assert_eq!(limiter.tracked_sources(), 2);
        drop(reservation);
        assert_eq!(limiter.sweep(at(130)), 1);
    }

    #[test]
    fn test_set_policy_applies_to_existing_windows() {
        let limiter = limiter(60, 5);
        for t in 0..3 {
            limiter.record_failure("S", at(t));
        }
        assert!(limiter.admit("S", at(10)));

        limiter.set_policy(LimitPolicy::new(Duration::from_secs(60), 3).unwrap());
        assert!(!limiter.admit("S", at(10)));
        assert_eq!(limiter.policy().threshold(), 3);
    }

    #[test]
    fn test_policy_validation() {
        assert_eq!(
            LimitPolicy::new(Duration::ZERO, 1).unwrap_err(),
            PolicyError::ZeroWindow
        );
        assert_eq!(
            LimitPolicy::new(Duration::from_secs(1), 0).unwrap_err(),
            PolicyError::ZeroThreshold
        );
        assert_eq!(
            LimitPolicy::with_idle_multiplier(Duration::from_secs(1), 1, 0).unwrap_err(),
            PolicyError::IdleMultiplier(0)
        );

        let policy = LimitPolicy::new(Duration::from_secs(60), 1000).unwrap();
        assert_eq!(policy, LimitPolicy::default());
        assert_eq!(policy.idle_horizon(), TimeDelta::seconds(120));
    }
}
