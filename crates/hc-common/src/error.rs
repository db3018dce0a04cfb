//! Error types for hostcheck.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Errors that originate from a command on the target host carry the
//! [`CommandResult`] of the last command so exit code and output are never lost.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Convergence Timeout
//!   Reason: chrony tracking did not converge after 120 attempts: leap status is not Normal
//!   Fix: Check the time service status and its configured sources, then re-run the check.
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::os::OsFamily;
use crate::result::CommandResult;

/// Result type alias for hostcheck operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file errors.
    Config,
    /// Command execution on the target host.
    Execution,
    /// State did not settle within the retry budget.
    Convergence,
    /// Service manager failures.
    Service,
    /// Capability resolution failures.
    Capability,
    /// Local file I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Execution => write!(f, "execution"),
            ErrorCategory::Convergence => write!(f, "convergence"),
            ErrorCategory::Service => write!(f, "service"),
            ErrorCategory::Capability => write!(f, "capability"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Suggested actions for automation to take in response to errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    /// Retry the operation.
    Retry,
    /// Run the configuration validator.
    RunCheck,
    /// Install the missing tool or package.
    Install,
    /// Re-run with elevated privileges.
    Elevate,
    /// Skip this item and continue.
    Skip,
    /// Abort the scenario.
    Abort,
    /// Manual intervention required.
    ManualIntervention,
}

impl std::fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SuggestedAction::Retry => write!(f, "retry"),
            SuggestedAction::RunCheck => write!(f, "run_check"),
            SuggestedAction::Install => write!(f, "install"),
            SuggestedAction::Elevate => write!(f, "elevate"),
            SuggestedAction::Skip => write!(f, "skip"),
            SuggestedAction::Abort => write!(f, "abort"),
            SuggestedAction::ManualIntervention => write!(f, "manual_intervention"),
        }
    }
}

/// Unified error type for hostcheck.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration in {path}: {message}")]
    InvalidConfig { path: String, message: String },

    // Execution errors (20-29)
    #[error("command transport failed: {0}")]
    Transport(String),

    #[error("{message}: {result}")]
    CommandFailed {
        message: String,
        result: Box<CommandResult>,
    },

    #[error("operation not supported: {operation}: {result}")]
    Unsupported {
        operation: String,
        result: Box<CommandResult>,
    },

    #[error("cannot parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("did not find any {what}")]
    NotFound { what: String },

    #[error("{what}: expected {expected}, found {actual}")]
    Verification {
        what: String,
        expected: String,
        actual: String,
    },

    // Convergence errors (30-39)
    #[error("{check} did not converge after {attempts} attempts: {reason}{}", last_observed(.last))]
    ConvergenceTimeout {
        check: String,
        attempts: u32,
        reason: String,
        last: Option<Box<CommandResult>>,
    },

    // Service errors (40-49)
    #[error("failed to restart {service} (tried {}): {last}", .attempted.join(", "))]
    ServiceRestartFailure {
        service: String,
        attempted: Vec<String>,
        last: Box<CommandResult>,
    },

    // Capability errors (50-59)
    #[error("no {capability} implementation is available for {family} hosts")]
    CapabilityUnavailable {
        capability: String,
        family: OsFamily,
    },

    #[error("{capability} resolved to {actual}, not {expected}")]
    VariantMismatch {
        capability: String,
        expected: String,
        actual: String,
    },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

fn last_observed(last: &Option<Box<CommandResult>>) -> String {
    match last {
        Some(result) => format!("\nlast observation: {}", result),
        None => String::new(),
    }
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Execution errors
    /// - 30-39: Convergence errors
    /// - 40-49: Service errors
    /// - 50-59: Capability errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::Transport(_) => 20,
            Error::CommandFailed { .. } => 21,
            Error::Unsupported { .. } => 22,
            Error::Parse { .. } => 23,
            Error::NotFound { .. } => 24,
            Error::Verification { .. } => 25,
            Error::ConvergenceTimeout { .. } => 30,
            Error::ServiceRestartFailure { .. } => 40,
            Error::CapabilityUnavailable { .. } => 50,
            Error::VariantMismatch { .. } => 51,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,

            Error::Transport(_)
            | Error::CommandFailed { .. }
            | Error::Unsupported { .. }
            | Error::Parse { .. }
            | Error::NotFound { .. }
            | Error::Verification { .. } => ErrorCategory::Execution,

            Error::ConvergenceTimeout { .. } => ErrorCategory::Convergence,

            Error::ServiceRestartFailure { .. } => ErrorCategory::Service,

            Error::CapabilityUnavailable { .. } | Error::VariantMismatch { .. } => {
                ErrorCategory::Capability
            }

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => true,

            // The session is unusable once the transport is gone
            Error::Transport(_) => false,
            Error::CommandFailed { .. } => true,
            Error::Unsupported { .. } => false,
            Error::Parse { .. } => false,
            Error::NotFound { .. } => false,
            Error::Verification { .. } => false,

            // A longer budget may still converge
            Error::ConvergenceTimeout { .. } => true,
            Error::ServiceRestartFailure { .. } => true,

            Error::CapabilityUnavailable { .. } => false,
            Error::VariantMismatch { .. } => false,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns the suggested action for automation.
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => SuggestedAction::RunCheck,

            Error::Transport(_) => SuggestedAction::Abort,
            Error::CommandFailed { .. } => SuggestedAction::ManualIntervention,
            Error::Unsupported { .. } => SuggestedAction::Skip,
            Error::Parse { .. } => SuggestedAction::ManualIntervention,
            Error::NotFound { .. } => SuggestedAction::Skip,
            Error::Verification { .. } => SuggestedAction::ManualIntervention,

            Error::ConvergenceTimeout { .. } => SuggestedAction::Retry,
            Error::ServiceRestartFailure { .. } => SuggestedAction::Elevate,

            Error::CapabilityUnavailable { .. } => SuggestedAction::Install,
            Error::VariantMismatch { .. } => SuggestedAction::Skip,

            Error::Io(_) => SuggestedAction::Retry,
            Error::Json(_) => SuggestedAction::ManualIntervention,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => {
                "Run 'hc-core config validate' to check the configuration file."
            }
            Error::InvalidConfig { .. } => {
                "Fix the reported field in harness.json, or remove the file to use built-in defaults."
            }

            Error::Transport(_) => {
                "The target host is unreachable or the executor failed to spawn the command. Check connectivity and retry the run."
            }
            Error::CommandFailed { .. } => {
                "Inspect the captured stdout/stderr above; the command ran but reported failure."
            }
            Error::Unsupported { .. } => {
                "The device driver does not support this operation. Skip the device or use a different host image."
            }
            Error::Parse { .. } => {
                "The tool printed output in an unexpected format. Check the tool version on the target host."
            }
            Error::NotFound { .. } => {
                "The host has nothing for this check to act on. Run against a host with the expected devices."
            }
            Error::Verification { .. } => {
                "The host accepted the change but reports a different value. Check driver limits and kernel logs."
            }

            Error::ConvergenceTimeout { .. } => {
                "Check the service status and its configuration, then re-run the check or raise the retry budget in harness.json."
            }
            Error::ServiceRestartFailure { .. } => {
                "Verify the service is installed and that the session can elevate (sudo -n) on the target host."
            }

            Error::CapabilityUnavailable { .. } => {
                "No implementation is registered for this OS family. Register a variant or run against a supported distribution."
            }
            Error::VariantMismatch { .. } => {
                "This host uses a different implementation of the capability. Resolve the capability instead of a concrete tool."
            }

            Error::Io(_) => {
                "Check disk space, permissions, and that config directories exist. Retry the operation."
            }
            Error::Json(_) => {
                "Invalid JSON in file. Check syntax with 'jq . <file>' or restore from backup."
            }
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig { .. } => "Invalid Configuration",

            Error::Transport(_) => "Transport Error",
            Error::CommandFailed { .. } => "Command Failed",
            Error::Unsupported { .. } => "Operation Not Supported",
            Error::Parse { .. } => "Unexpected Tool Output",
            Error::NotFound { .. } => "Nothing Found",
            Error::Verification { .. } => "Verification Failed",

            Error::ConvergenceTimeout { .. } => "Convergence Timeout",
            Error::ServiceRestartFailure { .. } => "Service Restart Failed",

            Error::CapabilityUnavailable { .. } => "Capability Unavailable",
            Error::VariantMismatch { .. } => "Tool Variant Mismatch",

            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }

    /// The command result attached to this error, if any.
    pub fn command_result(&self) -> Option<&CommandResult> {
        match self {
            Error::CommandFailed { result, .. } | Error::Unsupported { result, .. } => {
                Some(result)
            }
            Error::ConvergenceTimeout { last, .. } => last.as_deref(),
            Error::ServiceRestartFailure { last, .. } => Some(last),
            _ => None,
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Suggested action for automation.
    pub suggested_action: SuggestedAction,

    /// Additional structured context (exit code, attempts, capability, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::ConvergenceTimeout { check, attempts, .. } => {
                context.insert("check".to_string(), serde_json::json!(check));
                context.insert("attempts".to_string(), serde_json::json!(attempts));
            }
            Error::ServiceRestartFailure {
                service, attempted, ..
            } => {
                context.insert("service".to_string(), serde_json::json!(service));
                context.insert("attempted".to_string(), serde_json::json!(attempted));
            }
            Error::CapabilityUnavailable { capability, family } => {
                context.insert("capability".to_string(), serde_json::json!(capability));
                context.insert("os_family".to_string(), serde_json::json!(family));
            }
            _ => {}
        }

        if let Some(result) = err.command_result() {
            context.insert("command".to_string(), serde_json::json!(result.command));
            context.insert("exit_code".to_string(), serde_json::json!(result.exit_code));
            context.insert("stdout".to_string(), serde_json::json!(result.stdout));
            context.insert("stderr".to_string(), serde_json::json!(result.stderr));
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action(),
            context,
        }
    }
}

impl StructuredError {
    /// Add additional context to the error.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }

    /// Serialize to pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| self.to_json())
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
