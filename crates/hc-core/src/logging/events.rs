//! Event vocabulary shared by every log line.
//!
//! An event's name travels as the tracing `target`, so JSONL consumers can
//! filter on `event` without parsing messages.

use serde::{Deserialize, Serialize};

/// Severity as written to JSONL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        if level == tracing::Level::ERROR {
            Level::Error
        } else if level == tracing::Level::WARN {
            Level::Warn
        } else if level == tracing::Level::INFO {
            Level::Info
        } else if level == tracing::Level::DEBUG {
            Level::Debug
        } else {
            Level::Trace
        }
    }
}

/// Phase of a run an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    /// Capability to variant selection.
    Resolve,
    Install,
    /// A command on the host.
    Execute,
    /// Waiting for a check to converge.
    Poll,
    /// Walking service restart candidates.
    Restart,
    Scenario,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Resolve => "resolve",
            Stage::Install => "install",
            Stage::Execute => "execute",
            Stage::Poll => "poll",
            Stage::Restart => "restart",
            Stage::Scenario => "scenario",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event names, grouped by stage prefix.
pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    pub const RESOLVE_CACHED: &str = "resolve.cached";
    pub const RESOLVE_SELECTED: &str = "resolve.selected";
    pub const RESOLVE_UNAVAILABLE: &str = "resolve.unavailable";

    pub const INSTALL_PRESENT: &str = "install.present";
    pub const INSTALL_STRATEGY: &str = "install.strategy";
    pub const INSTALL_FINISHED: &str = "install.finished";
    pub const INSTALL_FAILED: &str = "install.failed";

    pub const EXEC_COMMAND: &str = "exec.command";
    pub const EXEC_TIMEOUT: &str = "exec.timeout";

    pub const POLL_ATTEMPT: &str = "poll.attempt";
    pub const POLL_CONVERGED: &str = "poll.converged";
    pub const POLL_EXHAUSTED: &str = "poll.exhausted";

    pub const RESTART_ATTEMPT: &str = "restart.attempt";
    pub const RESTART_SUCCEEDED: &str = "restart.succeeded";
    pub const RESTART_FAILED: &str = "restart.failed";

    pub const SCENARIO_STARTED: &str = "scenario.started";
    pub const SCENARIO_STEP: &str = "scenario.step";
    pub const SCENARIO_FINISHED: &str = "scenario.finished";
}

/// Correlation ids stamped on every event of one invocation.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            host_id: host_id.into(),
        }
    }

    /// A root span carrying the ids. Library events emitted while it is
    /// entered inherit them in JSONL output.
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("run", run_id = %self.run_id, host_id = %self.host_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_names_match_serde() {
        for stage in [Stage::Init, Stage::Resolve, Stage::Restart, Stage::Scenario] {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{}\"", stage));
        }
    }

    #[test]
    fn tracing_levels_map_one_to_one() {
        assert_eq!(Level::from(tracing::Level::TRACE), Level::Trace);
        assert_eq!(Level::from(tracing::Level::WARN), Level::Warn);
        assert_eq!(Level::from(tracing::Level::ERROR), Level::Error);
        assert_eq!(serde_json::to_string(&Level::Info).unwrap(), "\"info\"");
    }

    #[test]
    fn event_names_carry_their_stage() {
        for name in [
            event_names::RESOLVE_SELECTED,
            event_names::INSTALL_FAILED,
            event_names::POLL_EXHAUSTED,
            event_names::RESTART_FAILED,
        ] {
            let prefix = name.split('.').next().unwrap();
            assert!(
                ["resolve", "install", "poll", "restart"].contains(&prefix),
                "{name}"
            );
        }
    }
}
