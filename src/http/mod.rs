//! HTTP boundary subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, shared state)
//!     → request.rs (request ID, source identity, user agent)
//!     → handlers.rs (login → AuthGate::attempt, events → journal snapshot)
//!     → response.rs (outcome → status + JSON)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_DEMO_SECRET, X_FORWARDED_FOR, X_REQUEST_ID};
pub use server::{AppState, GateServer, ServerError};
