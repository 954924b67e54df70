//! Authentication gate subsystem.
//!
//! # Data Flow
//! ```text
//! attempt(source, principal, credential, context, now)
//!     → RateLimiter::reserve        (denied → RateLimited record, done)
//!     → Authenticator::verify       (error → Failure, fail closed)
//!     → EventJournal::append        (exactly one record per attempt)
//!     → Reservation::record_failure (Failure only) or release
//!     → Outcome
//! ```
//!
//! # Design Decisions
//! - `now` is always an argument; clocks live at the boundary (clock.rs)
//! - No limiter or journal lock is held while the authenticator runs
//! - Injected failures use the same append/record paths as real ones

pub mod attempt;
pub mod authenticator;
pub mod clock;

pub use attempt::{AuthGate, SimulationProfile};
pub use authenticator::{AuthError, Authenticator, Credential, StaticAuthenticator};
pub use clock::{Clock, ManualClock, SystemClock};
