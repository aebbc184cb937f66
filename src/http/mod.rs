//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request id, trace layer)
//!     → request.rs (request id, COPY → CopyRequest)
//!     → tpc::CopyService on the blocking pool
//!     → response.rs (LocalResponse → status, Location, text body)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
