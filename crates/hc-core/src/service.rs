//! Service restarts with name fallback.
//!
//! The same daemon ships under different unit names across distributions
//! (`chrony` on Debian, `chronyd` on Red Hat and SUSE). [`RestartStrategy`]
//! tries each candidate name in order through a service manager and stops at
//! the first one that restarts cleanly.

use hc_common::{CommandResult, Error, Result};
use tracing::{info, instrument, warn};

use crate::logging::event_names;
use crate::registry::HostSession;
use crate::tool::{Capability, Tool};

/// A tool that can restart and query system services.
pub trait ServiceManager: Tool {
    /// Restart `name`. A non-zero exit code is returned, not raised.
    fn restart_service(&self, session: &HostSession, name: &str) -> Result<CommandResult>;

    /// Query the status of `name`.
    fn service_status(&self, session: &HostSession, name: &str) -> Result<CommandResult>;

    /// Whether `name` is known to the manager and running.
    fn is_service_running(&self, session: &HostSession, name: &str) -> Result<bool> {
        Ok(self.service_status(session, name)?.success())
    }
}

/// Known candidate names for a logical service.
fn builtin_candidates(service: &str) -> Vec<String> {
    let names: &[&str] = match service {
        // Debian and Ubuntu first, then RHEL, CentOS and SLES.
        "chrony" => &["chrony", "chronyd"],
        "ntp" => &["ntp", "ntpd"],
        other => return vec![other.to_string()],
    };
    names.iter().map(|n| n.to_string()).collect()
}

/// Ordered list of service names to try for one logical service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartStrategy {
    service: String,
    candidates: Vec<String>,
    via: Capability,
}

impl RestartStrategy {
    /// Strategy for a logical service, using the built-in name table.
    pub fn for_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
            candidates: builtin_candidates(service),
            via: Capability::ServiceManager,
        }
    }

    /// Strategy with an explicit candidate list.
    pub fn with_candidates<I, S>(service: &str, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.to_string(),
            candidates: candidates.into_iter().map(Into::into).collect(),
            via: Capability::ServiceManager,
        }
    }

    /// Use the manager serving `capability` instead of `service`.
    pub fn via(mut self, capability: Capability) -> Self {
        self.via = capability;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Restart the first candidate that succeeds.
    ///
    /// Fails with [`Error::ServiceRestartFailure`] carrying the last attempt
    /// when every candidate exits non-zero.
    #[instrument(skip(self, session), fields(service = %self.service, via = %self.via))]
    pub fn restart(&self, session: &HostSession) -> Result<CommandResult> {
        if self.candidates.is_empty() {
            return Err(Error::Config(format!(
                "no service names to restart for {}",
                self.service
            )));
        }

        let handle = session.resolve(self.via)?;
        let manager = handle
            .as_service_manager()
            .ok_or_else(|| Error::VariantMismatch {
                capability: self.via.to_string(),
                expected: "service manager".to_string(),
                actual: handle.name().to_string(),
            })?;

        let mut last = None;
        for name in &self.candidates {
            info!(target: event_names::RESTART_ATTEMPT, name = %name, "restarting");
            let result = manager.restart_service(session, name)?;
            if result.success() {
                info!(target: event_names::RESTART_SUCCEEDED, name = %name, "restarted");
                return Ok(result);
            }
            warn!(
                target: event_names::RESTART_FAILED,
                name = %name,
                exit_code = result.exit_code,
                "restart failed, trying next name"
            );
            last = Some(result);
        }

        let last = last.ok_or_else(|| Error::Config("restart made no attempt".to_string()))?;
        Err(Error::ServiceRestartFailure {
            service: self.service.clone(),
            attempted: self.candidates.clone(),
            last: Box::new(last),
        })
    }
}
