//! systemd unit control with `systemctl`.

use hc_common::{CommandResult, Result};
use tracing::debug;

use crate::exec::{shell_quote, ExecOptions};
use crate::registry::HostSession;
use crate::service::ServiceManager;
use crate::tool::Tool;

#[derive(Debug, Clone, Copy, Default)]
pub struct Systemctl;

impl Systemctl {
    pub fn new() -> Self {
        Systemctl
    }

    /// Whether systemd knows a unit called `name`.
    pub fn check_service_exists(&self, session: &HostSession, name: &str) -> Result<bool> {
        Ok(self.service_status(session, name)?.success())
    }

    /// Stop `name` if it exists; an absent unit is left alone.
    pub fn stop_service(&self, session: &HostSession, name: &str) -> Result<()> {
        if !self.check_service_exists(session, name)? {
            debug!(unit = name, "unit not present, nothing to stop");
            return Ok(());
        }
        self.run(
            session,
            &format!("stop {}", shell_quote(name)),
            &ExecOptions::new().elevated().with_shell(),
        )?
        .assert_exit_code_with(&format!("cannot stop {}", name))?;
        Ok(())
    }

    fn unit_command(&self, session: &HostSession, verb: &str, name: &str) -> Result<CommandResult> {
        self.run(
            session,
            &format!("{} {}", verb, shell_quote(name)),
            &ExecOptions::new().elevated().with_shell(),
        )
    }
}

impl Tool for Systemctl {
    fn command(&self) -> &str {
        "systemctl"
    }

    /// systemd is running when its runtime directory exists.
    fn presence_check(&self, session: &HostSession) -> Result<bool> {
        let result = session.executor().execute(
            "ls -lt /run/systemd/system",
            &ExecOptions::new().elevated().with_shell(),
        )?;
        Ok(result.success())
    }
}

impl ServiceManager for Systemctl {
    fn restart_service(&self, session: &HostSession, name: &str) -> Result<CommandResult> {
        self.unit_command(session, "restart", name)
    }

    fn service_status(&self, session: &HostSession, name: &str) -> Result<CommandResult> {
        self.unit_command(session, "status", name)
    }
}
