//! SysV `service` front end.

use hc_common::{CommandResult, Result};

use crate::exec::{shell_quote, ExecOptions};
use crate::registry::HostSession;
use crate::service::ServiceManager;
use crate::tool::Tool;

#[derive(Debug, Clone, Copy, Default)]
pub struct Service;

impl Service {
    pub fn new() -> Self {
        Service
    }
}

impl Tool for Service {
    fn command(&self) -> &str {
        "service"
    }

    // Present on every supported distribution, directly or through systemd's shim.
    fn presence_check(&self, _session: &HostSession) -> Result<bool> {
        Ok(true)
    }
}

impl ServiceManager for Service {
    fn restart_service(&self, session: &HostSession, name: &str) -> Result<CommandResult> {
        self.run(
            session,
            &format!("{} restart", shell_quote(name)),
            &ExecOptions::new().elevated().with_shell(),
        )
    }

    fn service_status(&self, session: &HostSession, name: &str) -> Result<CommandResult> {
        self.run(
            session,
            &format!("{} status", shell_quote(name)),
            &ExecOptions::new().elevated().with_shell(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::{Reply, ScriptedExecutor};
    use hc_common::OsFamily;
    use std::sync::Arc;

    #[test]
    fn test_restart_and_status_commands() {
        let exec = Arc::new(
            ScriptedExecutor::new()
                .on("service chrony restart", Reply::ok(""))
                .on("service chrony status", Reply::fail(3, "inactive")),
        );
        let session = HostSession::scripted(OsFamily::DebianLike, exec.clone()).build();
        let service = Service::new();

        assert!(service.restart_service(&session, "chrony").unwrap().success());
        assert!(!service.is_service_running(&session, "chrony").unwrap());
        assert!(exec.recorded().iter().all(|r| r.opts.elevate));
    }
}
