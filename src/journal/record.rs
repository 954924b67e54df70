//! Journal record types and their wire representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final outcome of a single authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "login_success")]
    Success,
    #[serde(rename = "login_failure")]
    Failure,
    #[serde(rename = "login_rate_limited")]
    RateLimited,
}

impl Outcome {
    /// Wire name of the outcome, as it appears in the `event` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "login_success",
            Outcome::Failure => "login_failure",
            Outcome::RateLimited => "login_rate_limited",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journal entry.
///
/// Built once by the gate and never mutated afterwards. Serializes to the
/// polling format `{t, ip, user, event, ua}` plus `n_fail` on rate-limited
/// entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "t")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "ip")]
    source: String,
    #[serde(rename = "user")]
    principal: String,
    #[serde(rename = "event")]
    outcome: Outcome,
    #[serde(rename = "ua")]
    context: String,
    #[serde(rename = "n_fail", default, skip_serializing_if = "Option::is_none")]
    failures: Option<usize>,
}

impl EventRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
        principal: impl Into<String>,
        outcome: Outcome,
        context: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            source: source.into(),
            principal: principal.into(),
            outcome,
            context: context.into(),
            failures: None,
        }
    }

    /// Attach the failure count observed when the attempt was denied.
    pub fn with_failures(mut self, failures: usize) -> Self {
        self.failures = Some(failures);
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn failures(&self) -> Option<usize> {
        self.failures
    }
}
