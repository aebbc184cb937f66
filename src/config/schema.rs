//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the copy service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::LowSpeedLimit;

/// Root configuration for the third-party copy service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TpcConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Remote exchange settings. Hot-reloadable.
    pub transfer: TransferConfig,

    /// Local storage settings.
    pub storage: StorageConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Settings applied to every remote exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Redirect callers to `https://` instead of `http://`.
    pub dest_https: bool,

    /// Re-opens of the local resource after a stall or started answer.
    pub stall_retries: u32,

    /// Redirects the engine follows before giving up.
    pub max_redirects: u32,

    /// Minimum bytes per low-speed window; 0 disables the watchdog.
    pub low_speed_limit_bytes: u64,

    /// Length of the low-speed window in seconds.
    pub low_speed_time_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// How long an upload waits for `100 Continue`, in milliseconds.
    pub expect_continue_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            dest_https: false,
            stall_retries: 1,
            max_redirects: 10,
            low_speed_limit_bytes: 1024 * 1024,
            low_speed_time_secs: 120,
            connect_timeout_secs: 30,
            expect_continue_ms: 1000,
        }
    }
}

impl TransferConfig {
    pub fn low_speed(&self) -> LowSpeedLimit {
        LowSpeedLimit {
            limit_bytes: self.low_speed_limit_bytes,
            window: Duration::from_secs(self.low_speed_time_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn expect_continue(&self) -> Duration {
        Duration::from_millis(self.expect_continue_ms)
    }
}

/// Local storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory every request path is resolved below.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: "/var/lib/http-tpc".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
