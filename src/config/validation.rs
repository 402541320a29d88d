//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject settings that would produce an unusable HAProxy file
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: LbaasConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{LbaasConfig, ReloadMechanism};
use crate::model::validate_name;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a loaded configuration.
pub fn validate_config(config: &LbaasConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.haproxy.config_path.file_name().is_none() {
        errors.push(ValidationError::new(
            "haproxy.config_path",
            "must name a file",
        ));
    }
    if validate_name("haproxy.group", &config.haproxy.group).is_err() {
        errors.push(ValidationError::new(
            "haproxy.group",
            "must be a non-empty identifier of [A-Za-z0-9_.:-]",
        ));
    }

    match config.reload.mechanism {
        ReloadMechanism::Command if config.reload.command.first().map_or(true, |p| p.is_empty()) => {
            errors.push(ValidationError::new("reload.command", "must not be empty"));
        }
        ReloadMechanism::MasterSocket if config.reload.master_socket.as_os_str().is_empty() => {
            errors.push(ValidationError::new("reload.master_socket", "must be set"));
        }
        _ => {}
    }
    if config.reload.timeout_secs == 0 {
        errors.push(ValidationError::new("reload.timeout_secs", "must be > 0"));
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address: {}", config.admin.bind_address),
            ));
        }
        if config.admin.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "admin.request_timeout_secs",
                "must be > 0",
            ));
        }
    }

    if config.reconcile.enabled && config.reconcile.interval_secs == 0 {
        errors.push(ValidationError::new("reconcile.interval_secs", "must be > 0"));
    }
    if config.reconcile.base_delay_ms > config.reconcile.max_delay_ms {
        errors.push(ValidationError::new(
            "reconcile.base_delay_ms",
            "must not exceed reconcile.max_delay_ms",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "invalid socket address: {}",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
