//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Open local resource:
//!     → StorageFile::open
//!     → Stall(n) / Started(n): backoff.rs picks the delay, Sleeper waits it out
//!     → retries.rs re-opens while the retry budget lasts
//! ```
//!
//! # Design Decisions
//! - Only the local open is retried; the remote exchange never is
//! - The retry bound comes from configuration (`transfer.stall_retries`)
//! - Sleeping goes through the `Sleeper` trait so tests never block

pub mod backoff;
pub mod retries;

pub use backoff::{stall_delay, Sleeper, ThreadSleeper};
pub use retries::{open_with_retry, OpenAttempt};
