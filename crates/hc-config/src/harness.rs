//! Harness configuration types.
//!
//! These types match the layout of `harness.json`. Every section and field
//! has a default so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub schema_version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub execution: ExecutionConfig,
    pub retry: RetryConfig,
    pub timesync: TimesyncConfig,
    pub install: InstallConfig,
    pub network: NetworkConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            schema_version: crate::CONFIG_SCHEMA_VERSION.to_string(),
            description: None,
            execution: ExecutionConfig::default(),
            retry: RetryConfig::default(),
            timesync: TimesyncConfig::default(),
            install: InstallConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

/// How commands are executed on the target host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Per-command timeout in seconds (0 disables the timeout).
    pub default_timeout_secs: u64,

    /// Command prefix used when elevation is requested.
    pub elevation_prefix: String,

    /// Shell used to interpret commands that request shell semantics.
    pub shell: String,

    /// Maximum bytes captured per output stream.
    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 600,
            elevation_prefix: "sudo -n".to_string(),
            shell: "sh".to_string(),
            max_output_bytes: 4 * 1024 * 1024,
        }
    }
}

impl ExecutionConfig {
    /// Default timeout, or `None` when disabled.
    pub fn default_timeout(&self) -> Option<Duration> {
        (self.default_timeout_secs > 0).then(|| Duration::from_secs(self.default_timeout_secs))
    }
}

/// Bounded retry budget for one convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicySpec {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicySpec {
    pub const fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Upper bound on time spent sleeping between attempts.
    pub fn worst_case_wait(&self) -> Duration {
        self.delay() * self.max_attempts.saturating_sub(1)
    }
}

/// Retry budgets, one per convergence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// `chronyc tracking` until leap status is Normal.
    pub chrony_tracking: RetryPolicySpec,

    /// `ntpq -c rv` until the leap indicator is `leap_none`.
    pub ntp_leap: RetryPolicySpec,

    /// `ntpstat` until the clock is synchronised.
    pub ntpstat_sync: RetryPolicySpec,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            chrony_tracking: RetryPolicySpec::new(120, 500),
            ntp_leap: RetryPolicySpec::new(300, 1000),
            ntpstat_sync: RetryPolicySpec::new(10, 2000),
        }
    }
}

impl RetryConfig {
    /// Named policies, for listing and validation.
    pub fn entries(&self) -> [(&'static str, &RetryPolicySpec); 3] {
        [
            ("chrony_tracking", &self.chrony_tracking),
            ("ntp_leap", &self.ntp_leap),
            ("ntpstat_sync", &self.ntpstat_sync),
        ]
    }
}

/// Time synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimesyncConfig {
    /// Servers appended when the client has no configured sources.
    pub servers: Vec<String>,

    /// chrony daemon configuration file.
    pub chrony_conf: PathBuf,

    /// ntpd configuration file.
    pub ntp_conf: PathBuf,
}

impl Default for TimesyncConfig {
    fn default() -> Self {
        Self {
            servers: (0..4).map(|i| format!("{}.pool.ntp.org", i)).collect(),
            chrony_conf: PathBuf::from("/etc/chrony.conf"),
            ntp_conf: PathBuf::from("/etc/ntp.conf"),
        }
    }
}

/// Settings for tools that may be built from source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Working directory for source builds on the target host.
    pub tool_dir: PathBuf,

    /// Repository used when no `ntpstat` package is available.
    pub ntpstat_repo: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            tool_dir: PathBuf::from("/var/tmp/hostcheck/tools"),
            ntpstat_repo: "https://github.com/darkhelmet/ntpstat".to_string(),
        }
    }
}

/// Values used by the ring buffer scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ring_buffer_rx: u32,
    pub ring_buffer_tx: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ring_buffer_rx: 10011,
            ring_buffer_tx: 190,
        }
    }
}
