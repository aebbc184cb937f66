//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → tls.rs (optional rustls handshake via axum-server)
//!     → Hand off to HTTP layer
//! ```
//!
//! Outbound connections to remote peers are made by the exchange engine.

pub mod tls;
