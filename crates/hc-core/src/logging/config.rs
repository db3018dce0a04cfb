//! Where log verbosity and format come from.
//!
//! Lowest precedence first: built-in defaults, `RUST_LOG`, `HC_LOG` and
//! `HC_LOG_FORMAT`, then the `--log-level` and `--log-format` flags.
//! `NO_COLOR` turns off ANSI escapes in human output.

use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

const LEVEL_VAR: &str = "HC_LOG";
const FORMAT_VAR: &str = "HC_LOG_FORMAT";

/// Crates whose events are let through the filter.
const LOGGED_CRATES: [&str; 3] = ["hc_core", "hc_config", "hc_common"];

/// How records are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `tracing_subscriber::fmt` lines for a terminal.
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(LogFormat::Human),
            "jsonl" | "json" => Ok(LogFormat::Jsonl),
            other => Err(format!("log format must be human or jsonl, got {:?}", other)),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum severity. Ordered from most to least verbose.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Adds every command line and its captured output.
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Off => "off",
        }
    }

    pub fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }

    /// The most verbose level named in a `RUST_LOG` style directive list
    /// such as `warn,hc_core=debug`. Directives without a level are ignored.
    fn from_directives(raw: &str) -> Option<Self> {
        raw.split(',')
            .filter_map(|directive| directive.rsplit('=').next())
            .filter_map(|level| level.parse::<LogLevel>().ok())
            .min()
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "off" | "quiet" => LogLevel::Off,
            other => return Err(format!("unknown log level {:?}", other)),
        };
        Ok(level)
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settled logging options for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// ANSI colors in human output, when stderr is also a terminal.
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            format: LogFormat::Human,
            level: LogLevel::Info,
            color: true,
        }
    }
}

impl LogConfig {
    /// Settle options from the process environment and CLI flags.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// Settle options with `lookup` standing in for the environment.
    /// Unparseable values fall through to the next source.
    pub fn from_lookup<F>(lookup: F, cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = cli_level
            .or_else(|| lookup(LEVEL_VAR).and_then(|v| v.parse().ok()))
            .or_else(|| lookup("RUST_LOG").and_then(|v| LogLevel::from_directives(&v)))
            .unwrap_or_default();
        let format = cli_format
            .or_else(|| lookup(FORMAT_VAR).and_then(|v| v.parse().ok()))
            .unwrap_or_default();

        LogConfig {
            format,
            level,
            color: lookup("NO_COLOR").map_or(true, |v| v.is_empty()),
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = self.color && color;
        self
    }

    /// `EnvFilter` directives admitting our crates at the settled level.
    pub fn directives(&self) -> String {
        LOGGED_CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}
