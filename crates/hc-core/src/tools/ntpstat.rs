//! Clock synchronisation status (`ntpstat`).
//!
//! Some distributions do not package ntpstat, so the tool falls back to
//! building it from source with git and gcc resolved through the session.

use std::sync::Arc;

use hc_common::{CommandResult, Error, OsFamily, Result};
use tracing::{debug, instrument, warn};

use super::{best_effort, Gcc, Git};
use crate::exec::{shell_quote, ExecOptions};
use crate::poll::{CheckError, RetryPolicy};
use crate::registry::HostSession;
use crate::tool::{InstallStrategy, Tool, ToolKind};

const NOT_SYNCHRONISED: &str = "unsynchronised";

/// Where a source-built ntpstat is installed.
const INSTALL_PATH: &str = "/usr/local/bin/ntpstat";

/// Whether ntpstat output reports a synchronised clock.
pub fn is_synchronised(output: &str) -> bool {
    !output.contains(NOT_SYNCHRONISED)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Ntpstat;

impl Ntpstat {
    pub fn new() -> Self {
        Ntpstat
    }

    /// Poll ntpstat until the local clock is synchronised.
    #[instrument(skip_all)]
    pub fn check_time_sync(&self, session: &HostSession) -> Result<CommandResult> {
        let policy = RetryPolicy::from_spec("ntpstat sync", &session.config().retry.ntpstat_sync);
        session.poll(&policy, || {
            let result = self.run(session, "", &ExecOptions::new().elevated().with_shell())?;
            judge_status(result)
        })
    }
}

/// Exit 0 means synchronised and exit 1 means not yet. Any other exit
/// (127 when the binary is missing, 2 when ntpd cannot be reached) is fatal.
fn judge_status(result: CommandResult) -> std::result::Result<CommandResult, CheckError> {
    if result.exit_code == 0 && is_synchronised(&result.stdout) {
        return Ok(result);
    }
    if result.exit_code == 1 || !is_synchronised(&result.stdout) {
        return Err(CheckError::observed(
            "local time is unsynchronised with the time server",
            &result,
        ));
    }
    result.assert_exit_code_with("ntpstat cannot report the clock state")?;
    Ok(result)
}

impl Tool for Ntpstat {
    fn command(&self) -> &str {
        "ntpstat"
    }

    fn can_install(&self) -> bool {
        true
    }

    fn packages(&self, _family: OsFamily) -> Vec<String> {
        vec!["ntpstat".to_string()]
    }

    fn install_strategies(&self) -> Vec<InstallStrategy> {
        vec![InstallStrategy::Package, InstallStrategy::FromSource]
    }

    fn build_from_source(&self, session: &HostSession) -> Result<bool> {
        let (git, gcc) = match (build_tool::<Git>(session)?, build_tool::<Gcc>(session)?) {
            (Some(git), Some(gcc)) => (git, gcc),
            _ => return Ok(false),
        };
        let install = &session.config().install;
        let tool_dir = &install.tool_dir;

        let mkdir = session.executor().execute(
            &format!("mkdir -p {}", shell_quote(&tool_dir.to_string_lossy())),
            &ExecOptions::new().with_shell(),
        )?;
        if !best_effort(mkdir.assert_exit_code_with("cannot create tool directory"))? {
            return Ok(false);
        }

        let checkout = match git.clone_repo(session, &install.ntpstat_repo, tool_dir) {
            Ok(dir) => dir,
            Err(err) => {
                best_effort::<()>(Err(err))?;
                return Ok(false);
            }
        };
        debug!(checkout = %checkout.display(), "ntpstat sources ready");

        let built = gcc.compile(session, &checkout.join("ntpstat.c"), "ntpstat", Some(&checkout));
        if !best_effort(built)? {
            return Ok(false);
        }

        let copy = session.executor().execute(
            &format!(
                "install -m 0755 {} {}",
                shell_quote(&checkout.join("ntpstat").to_string_lossy()),
                INSTALL_PATH
            ),
            &ExecOptions::new().elevated().with_shell(),
        )?;
        best_effort(copy.assert_exit_code_with("cannot install ntpstat binary"))
    }
}

/// A prerequisite for the source build, or `None` when this session has no
/// usable variant for it. Transport failures still propagate.
fn build_tool<T: ToolKind>(session: &HostSession) -> Result<Option<Arc<T>>> {
    match session.tool::<T>() {
        Ok(tool) => Ok(Some(tool)),
        Err(err @ Error::Transport(_)) => Err(err),
        Err(err) => {
            warn!(error = %err, "ntpstat cannot be built from source");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_marker() {
        assert!(is_synchronised(
            "synchronised to NTP server (169.254.169.123) at stratum 4\n   time correct to within 2 ms"
        ));
        assert!(!is_synchronised("unsynchronised\n  time server re-starting"));
    }

    #[test]
    fn test_status_exit_codes() {
        let synced = CommandResult::new("ntpstat", 0, "synchronised to NTP server (10.0.0.1) at stratum 3\n", "");
        assert!(judge_status(synced).is_ok());

        let waiting = CommandResult::new("ntpstat", 1, "unsynchronised\n  polling server every 8 s\n", "");
        assert!(matches!(judge_status(waiting), Err(CheckError::NotConverged { .. })));

        let missing = CommandResult::new("ntpstat", 127, "", "sh: 1: ntpstat: not found");
        match judge_status(missing) {
            Err(CheckError::Fatal(Error::CommandFailed { result, .. })) => assert_eq!(result.exit_code, 127),
            other => panic!("unexpected: {:?}", other.map(|r| r.exit_code)),
        }

        let no_daemon = CommandResult::new("ntpstat", 2, "Unable to talk to NTP daemon. Is it running?\n", "");
        assert!(matches!(judge_status(no_daemon), Err(CheckError::Fatal(_))));
    }

    #[test]
    fn test_strategies_fall_back_to_source() {
        assert_eq!(
            Ntpstat::new().install_strategies(),
            vec![InstallStrategy::Package, InstallStrategy::FromSource]
        );
    }
}
