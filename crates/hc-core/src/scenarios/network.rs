//! Ring buffer change check.
//!
//! For every synthetic network device: record the current RX/TX ring sizes,
//! set new ones, confirm the device reports them, then restore and confirm
//! the originals.

use hc_common::{Error, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::logging::event_names;
use crate::registry::HostSession;
use crate::tools::ethtool::DeviceRingBufferSettings;
use crate::tools::Ethtool;

/// Ring sizes seen on one device during the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RingBufferChange {
    pub device: String,
    pub original_rx: u32,
    pub original_tx: u32,
    pub modified_rx: u32,
    pub modified_tx: u32,
}

fn expect_rings(settings: &DeviceRingBufferSettings, rx: u32, tx: u32, stage: &str) -> Result<()> {
    for (key, expected) in [("RX", rx), ("TX", tx)] {
        let actual = settings.current_value(key)?;
        if actual != expected {
            return Err(Error::Verification {
                what: format!("{} {} ring size after {}", settings.device, key, stage),
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}

/// Change and restore ring sizes on every synthetic device.
///
/// Stops at the first device that fails; devices whose driver rejects ring
/// queries surface as [`Error::Unsupported`].
#[instrument(skip(session))]
pub fn validate_ring_buffer_change(session: &HostSession, rx: u32, tx: u32) -> Result<Vec<RingBufferChange>> {
    info!(target: event_names::SCENARIO_STARTED, scenario = "ring-buffer", "starting");
    let ethtool = session.tool::<Ethtool>()?;

    let mut changes = Vec::new();
    for settings in ethtool.get_all_device_ring_buffer_settings(session)? {
        let device = settings.device.clone();
        let original_rx = settings.current_rx()?;
        let original_tx = settings.current_tx()?;

        let modified = ethtool.change_device_ring_buffer_settings(session, &device, rx, tx)?;
        expect_rings(&modified, rx, tx, "change")?;
        info!(target: event_names::SCENARIO_STEP, device = %device, rx, tx, "ring sizes changed");

        let reverted =
            ethtool.change_device_ring_buffer_settings(session, &device, original_rx, original_tx)?;
        expect_rings(&reverted, original_rx, original_tx, "revert")?;
        info!(
            target: event_names::SCENARIO_STEP,
            device = %device,
            rx = original_rx,
            tx = original_tx,
            "ring sizes restored"
        );

        changes.push(RingBufferChange {
            device,
            original_rx,
            original_tx,
            modified_rx: rx,
            modified_tx: tx,
        });
    }

    info!(
        target: event_names::SCENARIO_FINISHED,
        scenario = "ring-buffer",
        devices = changes.len(),
        "ring buffer change verified"
    );
    Ok(changes)
}
