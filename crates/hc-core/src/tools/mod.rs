//! Concrete tools.
//!
//! One module per command-line program. Each type implements [`Tool`] and is
//! registered as a variant of one capability in
//! [`CapabilityRegistry::with_defaults`](crate::registry::CapabilityRegistry::with_defaults).
//!
//! [`Tool`]: crate::tool::Tool

pub mod chrony;
pub mod echo;
pub mod ethtool;
pub mod find;
pub mod gcc;
pub mod git;
pub mod ntp;
pub mod ntpstat;
pub mod service;
pub mod systemctl;

pub use chrony::Chrony;
pub use echo::Echo;
pub use ethtool::Ethtool;
pub use find::{Find, FindQuery};
pub use gcc::Gcc;
pub use git::Git;
pub use ntp::Ntp;
pub use ntpstat::Ntpstat;
pub use service::Service;
pub use systemctl::Systemctl;

use std::path::Path;

use hc_common::{Error, Result};
use tracing::info;

use crate::logging::event_names;
use crate::registry::HostSession;

/// Turn an asserted command failure into `Ok(false)`.
///
/// Install and build steps are best-effort: a non-zero exit code means the
/// step failed, while transport and other errors still propagate.
pub(crate) fn best_effort<T>(result: Result<T>) -> Result<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(Error::CommandFailed { message, result }) => {
            tracing::warn!(
                command = %result.command,
                exit_code = result.exit_code,
                %message,
                "step failed"
            );
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Append the configured time servers to `conf`, skipping lines already there.
///
/// Returns whether anything was written.
pub(crate) fn append_time_servers(session: &HostSession, conf: &Path) -> Result<bool> {
    let echo = session.tool::<Echo>()?;
    let mut written = false;
    for server in &session.config().timesync.servers {
        let line = format!("server {}", server);
        if echo.append_line_once(session, conf, &line)? {
            info!(
                target: event_names::SCENARIO_STEP,
                conf = %conf.display(),
                %line,
                "added time server"
            );
            written = true;
        }
    }
    Ok(written)
}
