//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! tpc, engine, storage, http:
//!     → logging.rs (structured log events, request id and direction as fields)
//!     → metrics.rs (transfer counters and durations)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every transfer span
//! - Metrics are cheap (atomic increments) and optional

pub mod logging;
pub mod metrics;
