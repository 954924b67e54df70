//! Credential verification capability.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

/// Secret material presented with a login attempt.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self(secret.to_string())
    }
}

/// The authenticator could not reach a verdict.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    #[error("authenticator failure: {0}")]
    Internal(String),
}

/// Verifies a claimed principal against presented credentials.
///
/// `Ok(false)` is the ordinary answer for bad credentials. `Err` means the
/// check itself broke; the gate treats that as a failed attempt, and a panic
/// is handled the same way.
///
/// `verify` may block. The HTTP boundary runs attempts on the blocking pool,
/// and concurrent attempts from one saturated source wait there too.
pub trait Authenticator: Send + Sync {
    fn verify(&self, principal: &str, credential: &Credential) -> Result<bool, AuthError>;
}

/// In-memory user table, replaceable on config reload.
pub struct StaticAuthenticator {
    users: ArcSwap<BTreeMap<String, String>>,
}

impl StaticAuthenticator {
    pub fn new(users: BTreeMap<String, String>) -> Self {
        Self {
            users: ArcSwap::from_pointee(users),
        }
    }

    pub fn replace_users(&self, users: BTreeMap<String, String>) {
        let count = users.len();
        self.users.store(Arc::new(users));
        tracing::info!(users = count, "User table replaced");
    }

    pub fn user_count(&self) -> usize {
        self.users.load().len()
    }
}

impl Authenticator for StaticAuthenticator {
    fn verify(&self, principal: &str, credential: &Credential) -> Result<bool, AuthError> {
        let users = self.users.load();
        Ok(users
            .get(principal)
            .is_some_and(|expected| expected == credential.expose()))
    }
}
