//! Process exit codes for the hc-core CLI.
//!
//! Codes are grouped so automation can branch on ranges:
//! - 0-9: operational outcomes (the check ran to a verdict)
//! - 10-19: user or environment errors
//! - 20-29: internal or host transport errors

use hc_common::Error;

/// Exit codes returned by `hc-core`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExitCode {
    /// Every requested check passed.
    Clean = 0,
    /// The check could not apply to this host (no device, unsupported driver).
    Skipped = 1,
    /// A polled condition never converged.
    NotConverged = 2,
    /// A check ran but its outcome was wrong (failed command, mismatched value).
    CheckFailed = 3,
    /// No service name could be restarted.
    RestartFailed = 4,

    /// Invalid command-line arguments.
    ArgsError = 10,
    /// Configuration file missing, malformed or semantically invalid.
    ConfigError = 11,
    /// A required tool is unavailable on this host family.
    CapabilityError = 12,
    /// Privilege elevation was refused.
    PermissionError = 13,

    /// Unexpected internal failure.
    InternalError = 20,
    /// Local I/O failure.
    IoError = 21,
    /// Commands could not be delivered to the host.
    TransportError = 22,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// The run reached a verdict about the host.
    pub fn is_operational(self) -> bool {
        (0..=9).contains(&self.as_i32())
    }

    pub fn is_user_error(self) -> bool {
        (10..=19).contains(&self.as_i32())
    }

    pub fn is_internal_error(self) -> bool {
        (20..=29).contains(&self.as_i32())
    }

    pub fn is_error(self) -> bool {
        self.is_user_error() || self.is_internal_error()
    }

    /// Map a library error to the exit code the CLI reports for it.
    pub fn from_error(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::InvalidConfig { .. } => ExitCode::ConfigError,
            Error::Transport(_) => ExitCode::TransportError,
            Error::CommandFailed { result, .. } if is_permission_denied(&result.stderr) => {
                ExitCode::PermissionError
            }
            Error::CommandFailed { .. } | Error::Parse { .. } | Error::Verification { .. } => {
                ExitCode::CheckFailed
            }
            Error::Unsupported { .. } | Error::NotFound { .. } => ExitCode::Skipped,
            Error::ConvergenceTimeout { .. } => ExitCode::NotConverged,
            Error::ServiceRestartFailure { .. } => ExitCode::RestartFailed,
            Error::CapabilityUnavailable { .. } | Error::VariantMismatch { .. } => {
                ExitCode::CapabilityError
            }
            Error::Io(_) => ExitCode::IoError,
            Error::Json(_) => ExitCode::InternalError,
        }
    }

    /// Stable machine-readable name.
    pub fn code_name(self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::Skipped => "OK_SKIPPED",
            ExitCode::NotConverged => "ERR_NOT_CONVERGED",
            ExitCode::CheckFailed => "ERR_CHECK_FAILED",
            ExitCode::RestartFailed => "ERR_RESTART",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::CapabilityError => "ERR_CAPABILITY",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::TransportError => "ERR_TRANSPORT",
        }
    }
}

fn is_permission_denied(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    lower.contains("a password is required")
        || lower.contains("is not in the sudoers file")
        || lower.contains("permission denied")
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hc_common::{CommandResult, OsFamily};

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::Skipped.is_operational());
        assert!(!ExitCode::Skipped.is_error());
        assert!(ExitCode::NotConverged.is_operational());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(ExitCode::TransportError.is_internal_error());
        assert!(ExitCode::TransportError.is_error());
    }

    #[test]
    fn test_from_error() {
        let unsupported = Error::Unsupported {
            operation: "ethtool -g eth0".into(),
            result: Box::new(CommandResult::new("ethtool -g eth0", 95, "", "Operation not supported")),
        };
        assert_eq!(ExitCode::from_error(&unsupported), ExitCode::Skipped);

        let unavailable = Error::CapabilityUnavailable {
            capability: "time-sync-client".into(),
            family: OsFamily::Other,
        };
        assert_eq!(ExitCode::from_error(&unavailable), ExitCode::CapabilityError);

        let timeout = Error::ConvergenceTimeout {
            check: "chrony tracking".into(),
            attempts: 3,
            reason: "leap status not normal".into(),
            last: None,
        };
        assert_eq!(ExitCode::from_error(&timeout), ExitCode::NotConverged);
    }

    #[test]
    fn test_sudo_refusal_is_permission_error() {
        let err = Error::CommandFailed {
            message: "cannot restart".into(),
            result: Box::new(CommandResult::new(
                "sudo service chrony restart",
                1,
                "",
                "sudo: a password is required",
            )),
        };
        assert_eq!(ExitCode::from_error(&err), ExitCode::PermissionError);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::Skipped.to_string(), "OK_SKIPPED (1)");
        assert_eq!(i32::from(ExitCode::ConfigError), 11);
    }
}
