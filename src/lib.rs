//! HTTP third-party copy service library.

pub mod config;
pub mod engine;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod storage;
pub mod tpc;

#[cfg(test)]
pub(crate) mod testing;

pub use config::schema::TpcConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use tpc::CopyService;
