//! Configuration validation errors and semantic validation.

use std::path::Path;
use thiserror::Error;

use crate::harness::{HarnessConfig, RetryPolicySpec};

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::SemanticError(_) => 63,
            ValidationError::MissingField(_) => 64,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }

    /// Dotted path of the offending field, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingField(field) => Some(field),
            ValidationError::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Validate a harness configuration semantically.
pub fn validate_harness(config: &HarnessConfig) -> ValidationResult<()> {
    // Major version must match; minor additions are accepted
    let expected_major = major(crate::CONFIG_SCHEMA_VERSION);
    if major(&config.schema_version) != expected_major {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    if config.execution.shell.trim().is_empty() {
        return Err(ValidationError::MissingField("execution.shell".to_string()));
    }
    if config.execution.max_output_bytes == 0 {
        return Err(ValidationError::InvalidValue {
            field: "execution.max_output_bytes".to_string(),
            message: "Must be positive".to_string(),
        });
    }

    for (name, spec) in config.retry.entries() {
        validate_retry_policy(&format!("retry.{}", name), spec)?;
    }

    if config.timesync.servers.is_empty() {
        return Err(ValidationError::SemanticError(
            "timesync.servers must contain at least one server".to_string(),
        ));
    }
    for (i, server) in config.timesync.servers.iter().enumerate() {
        if server.trim().is_empty() || server.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidValue {
                field: format!("timesync.servers[{}]", i),
                message: format!("Must be a single host name, got {:?}", server),
            });
        }
    }
    validate_absolute("timesync.chrony_conf", &config.timesync.chrony_conf)?;
    validate_absolute("timesync.ntp_conf", &config.timesync.ntp_conf)?;

    validate_absolute("install.tool_dir", &config.install.tool_dir)?;
    if config.install.ntpstat_repo.trim().is_empty() {
        return Err(ValidationError::MissingField(
            "install.ntpstat_repo".to_string(),
        ));
    }

    if config.network.ring_buffer_rx == 0 || config.network.ring_buffer_tx == 0 {
        return Err(ValidationError::InvalidValue {
            field: "network".to_string(),
            message: "ring buffer sizes must be positive".to_string(),
        });
    }

    Ok(())
}

fn validate_retry_policy(field: &str, spec: &RetryPolicySpec) -> ValidationResult<()> {
    if spec.max_attempts < 1 {
        return Err(ValidationError::InvalidValue {
            field: format!("{}.max_attempts", field),
            message: format!("Must be at least 1, got {}", spec.max_attempts),
        });
    }
    Ok(())
}

fn validate_absolute(field: &str, path: &Path) -> ValidationResult<()> {
    if !path.is_absolute() {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            message: format!("Must be an absolute path, got {}", path.display()),
        });
    }
    Ok(())
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}
