//! Logging for hc-core.
//!
//! stdout carries command payloads only, so every log record goes to stderr,
//! either as `fmt` lines for a person or as JSONL for a pipeline.
//!
//! ```ignore
//! let ctx = LogContext::new(generate_run_id(), get_host_id());
//! init_logging(&LogConfig::from_env(None, None));
//! let _run = ctx.span().entered();
//! hc_core::log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "starting");
//! ```

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;

use sha2::{Digest, Sha256};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Later calls leave the first one in place.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::new(config.directives());

    let jsonl = (config.format == LogFormat::Jsonl).then(JsonlLayer::stderr);
    let human = (config.format == LogFormat::Human).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(config.color && std::io::stderr().is_terminal())
            .compact()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(jsonl)
        .with(human)
        .try_init();
}

/// `run-` followed by 12 hex digits.
pub fn generate_run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(12);
    format!("run-{}", id)
}

/// A stable, non-reversible id for this machine: `host-` and 8 hex digits.
///
/// Derived from `/etc/machine-id`, else the hostname, else random.
pub fn get_host_id() -> String {
    let seed = std::fs::read_to_string("/etc/machine-id")
        .ok()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()));

    let seed = seed.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut hex = hex::encode(Sha256::digest(seed.as_bytes()));
    hex.truncate(8);
    format!("host-{}", hex)
}

/// Emit a tracing event named `$event` stamped with the context's ids.
///
/// ```ignore
/// log_event!(ctx, WARN, event_names::RESTART_FAILED, Stage::Restart, "no candidate worked",
///     service = "chrony", exit_code = 5);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, $level:ident, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::event!(
            target: $event,
            tracing::Level::$level,
            run_id = %$ctx.run_id,
            host_id = %$ctx.host_id,
            stage = %$stage,
            $($key = $val,)*
            "{}",
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique_and_shaped() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), "run-".len() + 12);
        assert!(a["run-".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn host_id_is_stable_on_one_machine() {
        let id = get_host_id();
        assert_eq!(id.len(), "host-".len() + 8);
        if std::path::Path::new("/etc/machine-id").exists() {
            assert_eq!(id, get_host_id());
        }
    }

    #[test]
    fn log_event_accepts_every_level_and_fields() {
        let ctx = LogContext::new("run-test", "host-test");
        crate::log_event!(ctx, DEBUG, event_names::POLL_ATTEMPT, Stage::Poll, "attempt", attempt = 2u32, check = "ntpstat");
        crate::log_event!(ctx, INFO, event_names::RUN_STARTED, Stage::Init, "starting");
        crate::log_event!(ctx, WARN, event_names::RESTART_FAILED, Stage::Restart, "failed", exit_code = 5);
        crate::log_event!(ctx, ERROR, event_names::RUN_FINISHED, Stage::Init, "boom");
    }
}
