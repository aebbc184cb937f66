//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TpcConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system, on startup and on reload

use std::net::SocketAddr;

use crate::config::schema::{TpcConfig, TransferConfig};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("observability.log_level: unknown level {0:?}")]
    LogLevel(String),
}

pub fn validate_config(config: &TpcConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::Empty { field: "listener.tls.cert_path" });
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::Empty { field: "listener.tls.key_path" });
        }
    }

    if config.storage.root.is_empty() {
        errors.push(ValidationError::Empty { field: "storage.root" });
    }

    errors.extend(validate_transfer(&config.transfer));

    let level = config.observability.log_level.to_ascii_lowercase();
    if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks for the hot-reloadable section.
pub fn validate_transfer(transfer: &TransferConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    // A zero limit disables the watchdog; a zero window with a limit is a typo.
    if transfer.low_speed_limit_bytes > 0 && transfer.low_speed_time_secs == 0 {
        errors.push(ValidationError::Zero { field: "transfer.low_speed_time_secs" });
    }
    if transfer.connect_timeout_secs == 0 {
        errors.push(ValidationError::Zero { field: "transfer.connect_timeout_secs" });
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&TpcConfig::default()).is_ok());
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = TpcConfig::default();
        config.listener.bind_address = "localhost".to_string();
        config.listener.tls = Some(TlsConfig {
            cert_path: String::new(),
            key_path: "key.pem".to_string(),
        });
        config.transfer.connect_timeout_secs = 0;
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::InvalidAddress {
                    field: "listener.bind_address",
                    value: "localhost".to_string(),
                },
                ValidationError::Empty { field: "listener.tls.cert_path" },
                ValidationError::Zero { field: "transfer.connect_timeout_secs" },
                ValidationError::LogLevel("loud".to_string()),
            ]
        );
    }

    #[test]
    fn test_low_speed_window_required_when_limited() {
        let mut transfer = TransferConfig::default();
        transfer.low_speed_time_secs = 0;
        assert_eq!(validate_transfer(&transfer).len(), 1);

        transfer.low_speed_limit_bytes = 0;
        assert!(validate_transfer(&transfer).is_empty());
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = TpcConfig::default();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = "bogus".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
