//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → TpcConfig (validated, immutable)
//!     → transfer section shared via ArcSwap with the copy service
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → changed [transfer] section sent to the server
//!     → atomic swap of Arc<TransferConfig>
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only transfer settings reload live; listener, storage and logging need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{ListenerConfig, ObservabilityConfig, StorageConfig, TlsConfig, TpcConfig, TransferConfig};
