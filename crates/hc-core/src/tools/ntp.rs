//! ntpd client (`ntpq`).

use hc_common::{CommandResult, OsFamily, Result};
use tracing::{info, instrument};

use super::append_time_servers;
use crate::exec::ExecOptions;
use crate::poll::{CheckError, RetryPolicy};
use crate::registry::HostSession;
use crate::service::RestartStrategy;
use crate::tool::{TimeSyncClient, Tool};

/// `ntpq -np` output when ntpd has no peers.
const NO_ASSOCIATIONS: &str = "No association ID's returned";

/// Whether `ntpq -c rv` output reports the `leap_none` indicator.
pub fn leap_code_none(readvar: &str) -> bool {
    readvar.contains("leap_none")
}

/// Whether `ntpq -np` output shows no configured peer.
pub fn has_no_associations(peers: &str) -> bool {
    peers.contains(NO_ASSOCIATIONS)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ntp;

impl Ntp {
    pub fn new() -> Self {
        Ntp
    }

    /// Poll `ntpq -c rv` until the leap indicator is `leap_none`.
    #[instrument(skip_all)]
    pub fn check_leap_code(&self, session: &HostSession) -> Result<CommandResult> {
        let policy = RetryPolicy::from_spec("ntp leap code", &session.config().retry.ntp_leap);
        session.poll(&policy, || {
            let result = self.run(session, "-c rv", &ExecOptions::new().elevated().with_shell())?;
            // A missing ntpq or an unreachable ntpd will not fix itself.
            result.assert_exit_code_with("ntpq cannot read the system variables")?;
            if leap_code_none(&result.stdout) {
                Ok(result)
            } else {
                Err(CheckError::observed(
                    "leap code is not leap_none; check the ntp server setting and service",
                    &result,
                ))
            }
        })
    }

    fn peers(&self, session: &HostSession) -> Result<CommandResult> {
        self.run(session, "-np", &ExecOptions::new().elevated().with_shell())
    }
}

impl Tool for Ntp {
    fn command(&self) -> &str {
        "ntpq"
    }

    fn can_install(&self) -> bool {
        true
    }

    fn packages(&self, _family: OsFamily) -> Vec<String> {
        vec!["ntp".to_string()]
    }
}

impl TimeSyncClient for Ntp {
    fn restart(&self, session: &HostSession) -> Result<CommandResult> {
        RestartStrategy::for_service("ntp").restart(session)
    }

    fn check_server_setting(&self, session: &HostSession) -> Result<bool> {
        let peers = self.peers(session)?;
        if !has_no_associations(&peers.stdout) {
            return Ok(false);
        }
        info!("ntpd has no associations");
        append_time_servers(session, &session.config().timesync.ntp_conf)
    }

    fn check_time_locked(&self, session: &HostSession) -> Result<CommandResult> {
        self.check_leap_code(session)
    }

    fn check_sources_configured(&self, session: &HostSession) -> Result<()> {
        self.peers(session)?
            .assert_exit_code_with("ntpq cannot list peers")?;
        Ok(())
    }
}
