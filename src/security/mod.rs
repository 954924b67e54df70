//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Login attempt:
//!     → rate_limit.rs (reserve admission for the source)
//!     → gate verifies credentials
//!     → rate_limit.rs (reservation becomes a failure, or is released)
//!
//! Background:
//!     → sweep.rs (evict idle sources on an interval)
//! ```
//!
//! # Design Decisions
//! - Only genuine failures count; a denied attempt is never counted again
//! - Fail closed: an authenticator error is a failure
//! - Time is always passed in, never read inside the limiter

pub mod rate_limit;
pub mod sweep;

pub use rate_limit::{Admission, LimitPolicy, PolicyError, RateLimiter, Reservation};
pub use sweep::LimiterSweeper;
