//! chrony client (`chronyc`).

use hc_common::{CommandResult, OsFamily, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument};

use super::append_time_servers;
use crate::exec::ExecOptions;
use crate::poll::{CheckError, RetryPolicy};
use crate::registry::HostSession;
use crate::service::RestartStrategy;
use crate::tool::{TimeSyncClient, Tool};

static LEAP_STATUS_NORMAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)Leap status.*:.*Normal\s*$").expect("static regex"));

/// `chronyc sources` output when no server is configured.
const NO_SOURCES: &str = "Number of sources = 0";

/// Whether `chronyc tracking` output reports a normal leap status.
pub fn leap_status_normal(tracking: &str) -> bool {
    LEAP_STATUS_NORMAL.is_match(tracking)
}

/// Whether `chronyc sources` output shows no configured source.
pub fn has_no_sources(sources: &str) -> bool {
    sources.contains(NO_SOURCES)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Chrony;

impl Chrony {
    pub fn new() -> Self {
        Chrony
    }

    /// Poll `chronyc tracking` until the leap status is Normal.
    ///
    /// A failing `chronyc` is fatal; an abnormal leap status is retried.
    #[instrument(skip_all)]
    pub fn check_tracking(&self, session: &HostSession) -> Result<CommandResult> {
        let policy = RetryPolicy::from_spec("chrony tracking", &session.config().retry.chrony_tracking);
        session.poll(&policy, || {
            let result = self.run(session, "tracking", &ExecOptions::new())?;
            result.assert_exit_code_with("chronyc tracking failed")?;
            if leap_status_normal(&result.stdout) {
                Ok(result)
            } else {
                Err(CheckError::observed(
                    "leap status is not Normal; check the chrony service",
                    &result,
                ))
            }
        })
    }

    /// List sources and source statistics; both must succeed.
    pub fn check_sources_and_stats(&self, session: &HostSession) -> Result<()> {
        for args in ["sources", "sourcestats"] {
            self.run(session, args, &ExecOptions::new())?
                .assert_exit_code_with(&format!("chronyc {} failed", args))?;
        }
        Ok(())
    }
}

impl Tool for Chrony {
    fn command(&self) -> &str {
        "chronyc"
    }

    fn can_install(&self) -> bool {
        true
    }

    fn packages(&self, _family: OsFamily) -> Vec<String> {
        vec!["chrony".to_string()]
    }
}

impl TimeSyncClient for Chrony {
    fn restart(&self, session: &HostSession) -> Result<CommandResult> {
        RestartStrategy::for_service("chrony").restart(session)
    }

    fn check_server_setting(&self, session: &HostSession) -> Result<bool> {
        let sources = self.run(session, "sources", &ExecOptions::new().elevated().with_shell())?;
        if !has_no_sources(&sources.stdout) {
            return Ok(false);
        }
        info!("chrony has no sources configured");
        append_time_servers(session, &session.config().timesync.chrony_conf)
    }

    fn check_time_locked(&self, session: &HostSession) -> Result<CommandResult> {
        self.check_tracking(session)
    }

    fn check_sources_configured(&self, session: &HostSession) -> Result<()> {
        self.check_sources_and_stats(session)
    }
}
