//! Event journal subsystem.
//!
//! # Data Flow
//! ```text
//! AuthGate (one record per attempt)
//!     → record.rs (EventRecord, Outcome)
//!     → ring.rs (bounded FIFO, evicts oldest at capacity)
//!     → structured log line per record (target auth_gate::journal)
//!
//! Readers:
//!     → /api/events (snapshot, oldest first)
//!     → admin status (length, capacity, total appended)
//! ```
//!
//! # Design Decisions
//! - Fixed capacity, memory never grows past it
//! - One lock guards append and snapshot; snapshots are copies
//! - Insertion order is the order of append calls, not timestamp order

pub mod record;
pub mod ring;

pub use record::{EventRecord, Outcome};
pub use ring::EventJournal;
