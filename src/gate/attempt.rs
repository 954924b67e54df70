//! Per-attempt orchestration over the limiter, the authenticator, and the
//! journal.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, TimeDelta, Utc};

use crate::config::AdminConfig;
use crate::gate::authenticator::{AuthError, Authenticator, Credential};
use crate::journal::{EventJournal, EventRecord, Outcome};
use crate::observability::metrics;
use crate::security::rate_limit::{Admission, RateLimiter};

const UNKNOWN_SOURCE: &str = "unknown";
const UNKNOWN_CONTEXT: &str = "-";

/// Principal and agent stamped on injected failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationProfile {
    pub principal: String,
    pub context: String,
}

impl SimulationProfile {
    pub fn from_config(config: &AdminConfig) -> Self {
        Self {
            principal: config.simulated_principal.clone(),
            context: config.simulated_agent.clone(),
        }
    }
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self::from_config(&AdminConfig::default())
    }
}

/// The authentication gate.
///
/// Stateless per attempt: it holds shared handles to the journal and the
/// limiter and never keeps a lock on either while the authenticator runs.
pub struct AuthGate {
    journal: Arc<EventJournal>,
    limiter: Arc<RateLimiter>,
    authenticator: Arc<dyn Authenticator>,
    simulation: ArcSwap<SimulationProfile>,
}

impl AuthGate {
    pub fn new(
        journal: Arc<EventJournal>,
        limiter: Arc<RateLimiter>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            journal,
            limiter,
            authenticator,
            simulation: ArcSwap::from_pointee(SimulationProfile::default()),
        }
    }

    pub fn with_simulation(self, profile: SimulationProfile) -> Self {
        self.simulation.store(Arc::new(profile));
        self
    }

    pub fn set_simulation(&self, profile: SimulationProfile) {
        self.simulation.store(Arc::new(profile));
    }

    pub fn journal(&self) -> &Arc<EventJournal> {
        &self.journal
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one authentication attempt to completion.
    ///
    /// Exactly one record is appended to the journal whichever way the
    /// attempt ends. Only a `Failure` adds to the source's window.
    ///
    /// Blocks while every remaining slot of `source` is held by another
    /// unresolved attempt.
    pub fn attempt(
        &self,
        source: &str,
        principal: &str,
        credential: &Credential,
        context: &str,
        now: DateTime<Utc>,
    ) -> Outcome {
        let malformed = source.trim().is_empty() || principal.is_empty();
        let source = normalize(source, UNKNOWN_SOURCE);
        let context = normalize(context, UNKNOWN_CONTEXT);

        let reservation = match self.limiter.reserve(&source, now) {
            Admission::Admitted(reservation) => reservation,
            Admission::Denied { failures } => {
                tracing::warn!(source = %source, user = %principal, failures, "Attempt rate limited");
                self.journal.append(
                    EventRecord::new(now, source, principal, Outcome::RateLimited, context)
                        .with_failures(failures),
                );
                metrics::record_attempt(Outcome::RateLimited);
                return Outcome::RateLimited;
            }
        };

        let outcome = if !malformed && self.verify(&source, principal, credential) {
            Outcome::Success
        } else {
            Outcome::Failure
        };

        self.journal
            .append(EventRecord::new(now, source, principal, outcome, context));

        match outcome {
            Outcome::Failure => reservation.record_failure(now),
            _ => reservation.release(),
        }

        metrics::record_attempt(outcome);
        outcome
    }

    fn verify(&self, source: &str, principal: &str, credential: &Credential) -> bool {
        let verified = panic::catch_unwind(AssertUnwindSafe(|| {
            self.authenticator.verify(principal, credential)
        }))
        .unwrap_or_else(|payload| Err(AuthError::Internal(panic_message(payload.as_ref()))));

        match verified {
            Ok(verified) => verified,
            Err(e @ AuthError::Internal(_)) => {
                tracing::error!(
                    source = %source,
                    user = %principal,
                    error = %e,
                    "Authenticator malfunctioned, treating attempt as a failure"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    source = %source,
                    user = %principal,
                    error = %e,
                    "Authenticator failed, treating attempt as a failure"
                );
                false
            }
        }
    }

    /// Seed `count` synthetic failures for `source`, one second apart from
    /// `start`. Goes through the same journal and limiter paths as real
    /// attempts. Returns the number generated.
    pub fn inject_failures(&self, source: &str, count: usize, start: DateTime<Utc>) -> usize {
        let source = normalize(source, UNKNOWN_SOURCE);
        let profile = self.simulation.load_full();

        let mut at = start;
        for _ in 0..count {
            self.journal.append(EventRecord::new(
                at,
                source.clone(),
                profile.principal.clone(),
                Outcome::Failure,
                profile.context.clone(),
            ));
            self.limiter.record_failure(&source, at);
            at += TimeDelta::seconds(1);
        }

        metrics::record_simulated(count);
        tracing::info!(source = %source, count, "Injected simulated failures");
        count
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

fn normalize(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
