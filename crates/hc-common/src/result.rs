//! Command execution results.
//!
//! A [`CommandResult`] is an immutable snapshot of one command execution on a
//! target host. Every fatal error that stems from a command carries the result
//! so the exit code and captured output survive into diagnostics.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Maximum number of characters of each stream included in summaries.
const SUMMARY_STREAM_LIMIT: usize = 2048;

/// Outcome of a single command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Command line as submitted to the executor.
    pub command: String,

    /// Exit code (-1 when the process was killed or never reported one).
    pub exit_code: i32,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Wall-clock execution time.
    #[serde(with = "duration_ms")]
    pub duration: Duration,

    /// Whether the executor gave up waiting for the command.
    pub timed_out: bool,
}

impl CommandResult {
    /// Create a result with zero duration.
    pub fn new(
        command: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
            timed_out: false,
        }
    }

    /// Set the measured duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Mark the result as timed out.
    pub fn with_timed_out(mut self, timed_out: bool) -> Self {
        self.timed_out = timed_out;
        self
    }

    /// Whether the command exited with status zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    /// Fail with [`Error::CommandFailed`] unless the exit code is zero.
    pub fn assert_exit_code(&self) -> Result<&Self> {
        self.assert_exit_code_with("command failed")
    }

    /// Like [`assert_exit_code`](Self::assert_exit_code) with a custom message.
    pub fn assert_exit_code_with(&self, message: &str) -> Result<&Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::CommandFailed {
                message: message.to_string(),
                result: Box::new(self.clone()),
            })
        }
    }

    /// Trimmed standard output.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

impl std::fmt::Display for CommandResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "`{}` exited with {}", self.command, self.exit_code)?;
        if self.timed_out {
            write!(f, " (timed out)")?;
        }
        let stdout = truncate(self.stdout.trim_end());
        let stderr = truncate(self.stderr.trim_end());
        if !stdout.is_empty() {
            write!(f, "\nstdout:\n{}", stdout)?;
        }
        if !stderr.is_empty() {
            write!(f, "\nstderr:\n{}", stderr)?;
        }
        Ok(())
    }
}

fn truncate(s: &str) -> &str {
    if s.len() <= SUMMARY_STREAM_LIMIT {
        return s;
    }
    let mut end = SUMMARY_STREAM_LIMIT;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
