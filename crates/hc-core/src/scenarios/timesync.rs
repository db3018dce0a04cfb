//! Time synchronization check.
//!
//! Resolves the host's time-sync client (ntp on Debian-like hosts, chrony
//! elsewhere), makes sure it has upstream servers, restarts it, waits until
//! the clock locks and finally lists the configured sources.

use hc_common::{CommandResult, Error, OsFamily, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::logging::event_names;
use crate::registry::HostSession;
use crate::tool::Capability;
use crate::tools::Ntpstat;

/// Optional steps of the time sync check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeSyncOptions {
    /// Also wait for `ntpstat` to report synchronisation.
    pub check_status: bool,
}

/// What the time sync check did.
#[derive(Debug, Clone, Serialize)]
pub struct TimeSyncReport {
    pub family: OsFamily,

    /// Variant that served the time sync client capability.
    pub client: String,

    /// Whether servers were appended to the client configuration.
    pub servers_added: bool,

    pub restart: CommandResult,

    /// Output that showed the clock locked.
    pub locked: CommandResult,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<CommandResult>,
}

/// Run the time sync check with default options.
pub fn verify_time_sync(session: &HostSession) -> Result<TimeSyncReport> {
    verify_time_sync_with(session, TimeSyncOptions::default())
}

#[instrument(skip(session), fields(family = %session.family()))]
pub fn verify_time_sync_with(session: &HostSession, options: TimeSyncOptions) -> Result<TimeSyncReport> {
    info!(target: event_names::SCENARIO_STARTED, scenario = "timesync", "starting");

    let handle = session.resolve(Capability::TimeSyncClient)?;
    let client = handle.as_time_sync().ok_or_else(|| Error::VariantMismatch {
        capability: Capability::TimeSyncClient.to_string(),
        expected: "time sync client".to_string(),
        actual: handle.name().to_string(),
    })?;

    let servers_added = client.check_server_setting(session)?;
    info!(target: event_names::SCENARIO_STEP, servers_added, "server setting checked");

    let restart = client.restart(session)?;
    info!(target: event_names::SCENARIO_STEP, "client restarted");

    let locked = client.check_time_locked(session)?;
    info!(target: event_names::SCENARIO_STEP, "clock locked");

    client.check_sources_configured(session)?;

    let status = if options.check_status {
        Some(session.tool::<Ntpstat>()?.check_time_sync(session)?)
    } else {
        None
    };

    info!(
        target: event_names::SCENARIO_FINISHED,
        scenario = "timesync",
        client = handle.name(),
        "time sync verified"
    );
    Ok(TimeSyncReport {
        family: session.family(),
        client: handle.name().to_string(),
        servers_added,
        restart,
        locked,
        status,
    })
}
