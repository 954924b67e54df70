//! Authentication gate with a per-source sliding-window failure limiter and
//! a bounded, pollable event journal.

pub mod admin;
pub mod config;
pub mod gate;
pub mod http;
pub mod journal;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GateConfig;
pub use gate::{AuthGate, Authenticator, Credential};
pub use http::GateServer;
pub use journal::{EventJournal, EventRecord, Outcome};
pub use lifecycle::Shutdown;
pub use security::RateLimiter;
