//! Network device settings with `ethtool`.
//!
//! Parsers for `ethtool -l`, `-k`, `-g` and plain `ethtool <dev>` output are
//! pure functions over the captured text. [`Ethtool`] caches parsed results
//! per device; the setters re-read the device after changing it.
//!
//! `-l` and `-g` print a "Pre-set maximums" block followed by a "Current
//! hardware settings" block:
//!
//! ```text
//! Ring parameters for eth0:
//! Pre-set maximums:
//! RX:             18811
//! RX Mini:        0
//! RX Jumbo:       0
//! TX:             2560
//! Current hardware settings:
//! RX:             9709
//! RX Mini:        0
//! RX Jumbo:       0
//! TX:             170
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use hc_common::{CommandResult, Error, OsFamily, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, instrument};

use super::{Find, FindQuery};
use crate::exec::{shell_quote, ExecOptions};
use crate::registry::HostSession;
use crate::tool::Tool;

static MAX_SETTINGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Pre-set maximums:\s+(?P<settings>.*?)Current hardware settings:")
        .expect("static regex")
});
static CURRENT_SETTINGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Current hardware settings:\s+(?P<settings>.*)$").expect("static regex")
});
static COMBINED_CHANNELS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*Combined:[ \t]*(?P<value>\S*)").expect("static regex")
});
static FEATURES_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Features for (?P<interface>\w*):\s*(?P<value>.*)$").expect("static regex")
});
static LINK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Settings for (?P<interface>\w*):\s*(?P<value>.*)$").expect("static regex")
});
static NAME_VALUE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]*(?P<name>[^:]*?)[ \t]*:[ \t]*(?P<value>.*?)[ \t]*$").expect("static regex")
});

const NOT_SUPPORTED: &str = "Operation not supported";

/// Channel counts of one device (`ethtool -l`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceChannel {
    pub device: String,
    pub current_channels: u32,
    pub max_channels: u32,
}

/// Offload features reported as on (`ethtool -k`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFeatures {
    pub device: String,
    pub enabled_features: Vec<String>,
}

impl DeviceFeatures {
    pub fn is_enabled(&self, feature: &str) -> bool {
        self.enabled_features.iter().any(|f| f == feature)
    }
}

/// Link settings (`ethtool <dev>`), keyed by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceLinkSettings {
    pub device: String,
    pub settings: BTreeMap<String, String>,
}

/// Ring buffer sizes (`ethtool -g`), keyed by label (`RX`, `RX Mini`, `TX`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRingBufferSettings {
    pub device: String,
    pub current: BTreeMap<String, String>,
    pub max: BTreeMap<String, String>,
}

impl DeviceRingBufferSettings {
    /// Current value of `key` as a number.
    pub fn current_value(&self, key: &str) -> Result<u32> {
        numeric(&self.device, "current", &self.current, key)
    }

    /// Pre-set maximum of `key` as a number.
    pub fn max_value(&self, key: &str) -> Result<u32> {
        numeric(&self.device, "maximum", &self.max, key)
    }

    pub fn current_rx(&self) -> Result<u32> {
        self.current_value("RX")
    }

    pub fn current_tx(&self) -> Result<u32> {
        self.current_value("TX")
    }
}

fn numeric(device: &str, block: &str, map: &BTreeMap<String, String>, key: &str) -> Result<u32> {
    let raw = map.get(key).ok_or_else(|| Error::Parse {
        what: format!("{} ring buffer settings", device),
        message: format!("no {} {} value", block, key),
    })?;
    raw.trim().parse().map_err(|_| Error::Parse {
        what: format!("{} ring buffer settings", device),
        message: format!("{} {} is not a number: {:?}", block, key, raw),
    })
}

fn parse_error(device: &str, what: &str, message: impl Into<String>) -> Error {
    Error::Parse {
        what: format!("{} {}", device, what),
        message: message.into(),
    }
}

/// Split `-l`/`-g` output into its maximums and current blocks.
fn settings_blocks<'a>(device: &str, what: &str, raw: &'a str) -> Result<(&'a str, &'a str)> {
    let max = MAX_SETTINGS.captures(raw).and_then(|c| c.name("settings"));
    let current = CURRENT_SETTINGS.captures(raw).and_then(|c| c.name("settings"));
    match (max, current) {
        (Some(max), Some(current)) => Ok((max.as_str(), current.as_str())),
        _ => Err(parse_error(
            device,
            what,
            "missing current and/or maximum settings block",
        )),
    }
}

fn name_value_map(block: &str) -> BTreeMap<String, String> {
    block
        .lines()
        .filter_map(|line| NAME_VALUE.captures(line))
        .filter_map(|c| {
            let name = c.name("name")?.as_str();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), c.name("value")?.as_str().to_string()))
        })
        .collect()
}

/// Parse `ethtool -l <device>` output.
pub fn parse_channels(device: &str, raw: &str) -> Result<DeviceChannel> {
    let (max, current) = settings_blocks(device, "channels", raw)?;
    let combined = |block: &str, which: &str| -> Result<u32> {
        let value = COMBINED_CHANNELS
            .captures(block)
            .and_then(|c| c.name("value"))
            .map(|m| m.as_str())
            .ok_or_else(|| parse_error(device, "channels", format!("no {} combined count", which)))?;
        value.parse().map_err(|_| {
            parse_error(
                device,
                "channels",
                format!("{} combined count is not a number: {:?}", which, value),
            )
        })
    };
    Ok(DeviceChannel {
        device: device.to_string(),
        current_channels: combined(current, "current")?,
        max_channels: combined(max, "maximum")?,
    })
}

/// Parse `ethtool -k <device>` output.
///
/// A feature counts as enabled when its state word is `on`; annotations such
/// as `[fixed]` or `[requested on]` are ignored.
pub fn parse_features(device: &str, raw: &str) -> Result<DeviceFeatures> {
    let body = FEATURES_HEADER
        .captures(raw)
        .and_then(|c| c.name("value"))
        .ok_or_else(|| parse_error(device, "features", "missing \"Features for\" header"))?;

    let mut enabled_features = Vec::new();
    for line in body.as_str().lines().filter(|l| !l.trim().is_empty()) {
        let (name, value) = line
            .rsplit_once(':')
            .ok_or_else(|| parse_error(device, "features", format!("malformed line: {:?}", line)))?;
        if value.split_whitespace().next() == Some("on") {
            enabled_features.push(name.trim().to_string());
        }
    }
    Ok(DeviceFeatures {
        device: device.to_string(),
        enabled_features,
    })
}

/// Parse `ethtool <device>` output.
///
/// Continuation lines without a label (extra link modes) are skipped.
pub fn parse_link_settings(device: &str, raw: &str) -> Result<DeviceLinkSettings> {
    let body = LINK_HEADER
        .captures(raw)
        .and_then(|c| c.name("value"))
        .ok_or_else(|| parse_error(device, "link settings", "missing \"Settings for\" header"))?;
    let settings = name_value_map(body.as_str());
    if settings.is_empty() {
        return Err(parse_error(device, "link settings", "no settings found"));
    }
    Ok(DeviceLinkSettings {
        device: device.to_string(),
        settings,
    })
}

/// Parse `ethtool -g <device>` output.
pub fn parse_ring_buffer(device: &str, raw: &str) -> Result<DeviceRingBufferSettings> {
    let (max_block, current_block) = settings_blocks(device, "ring buffer settings", raw)?;
    let current = name_value_map(current_block);
    if current.is_empty() {
        return Err(parse_error(device, "ring buffer settings", "no current settings found"));
    }
    let max = name_value_map(max_block);
    if max.is_empty() {
        return Err(parse_error(device, "ring buffer settings", "no maximum settings found"));
    }
    Ok(DeviceRingBufferSettings {
        device: device.to_string(),
        current,
        max,
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `ethtool` with per-device caches.
#[derive(Debug, Default)]
pub struct Ethtool {
    devices: Mutex<BTreeSet<String>>,
    channels: Mutex<HashMap<String, DeviceChannel>>,
    features: Mutex<HashMap<String, DeviceFeatures>>,
    link_settings: Mutex<HashMap<String, DeviceLinkSettings>>,
    ring_buffers: Mutex<HashMap<String, DeviceRingBufferSettings>>,
}

impl Ethtool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthetic (VMBus) network interfaces on the host.
    ///
    /// Found as entries of `net` directories below `/sys/devices` whose path
    /// contains `vmbus`. Cached after the first successful lookup.
    #[instrument(skip(self, session))]
    pub fn get_device_list(&self, session: &HostSession, force: bool) -> Result<Vec<String>> {
        if !force {
            let cached = lock(&self.devices);
            if !cached.is_empty() {
                return Ok(cached.iter().cloned().collect());
            }
        }

        let find = session.tool::<Find>()?;
        let query = FindQuery::new()
            .name("net")
            .path("*vmbus*")
            .ignore_case()
            .elevated();
        let mut found = BTreeSet::new();
        for netdir in find.find_files(session, "/sys/devices", &query)? {
            let listing = session
                .executor()
                .execute(&format!("ls {}", shell_quote(&netdir)), &ExecOptions::new())?;
            listing.assert_exit_code_with(&format!(
                "could not find the network device under path {}",
                netdir
            ))?;
            found.extend(listing.stdout.split_whitespace().map(str::to_string));
        }
        if found.is_empty() {
            return Err(Error::NotFound {
                what: "synthetic network interface".to_string(),
            });
        }
        debug!(devices = ?found, "network devices");

        let mut cached = lock(&self.devices);
        *cached = found;
        Ok(cached.iter().cloned().collect())
    }

    /// Run a query that drivers may reject, mapping the rejection to `Unsupported`.
    fn query(&self, session: &HostSession, args: &str, failure: &str) -> Result<CommandResult> {
        let result = self.run(session, args, &ExecOptions::new())?;
        if !result.success() && result.stderr.contains(NOT_SUPPORTED) {
            return Err(Error::Unsupported {
                operation: format!("ethtool {}", args),
                result: Box::new(result),
            });
        }
        result.assert_exit_code_with(failure)?;
        Ok(result)
    }

    pub fn get_device_channels_info(
        &self,
        session: &HostSession,
        device: &str,
        force: bool,
    ) -> Result<DeviceChannel> {
        if !force {
            if let Some(hit) = lock(&self.channels).get(device) {
                return Ok(hit.clone());
            }
        }
        let result = self.query(
            session,
            &format!("-l {}", shell_quote(device)),
            &format!("cannot get channels of {}", device),
        )?;
        let parsed = parse_channels(device, &result.stdout)?;
        lock(&self.channels).insert(device.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Set the combined channel count and return the re-read settings.
    pub fn change_device_channels_info(
        &self,
        session: &HostSession,
        device: &str,
        channel_count: u32,
    ) -> Result<DeviceChannel> {
        self.run(
            session,
            &format!("-L {} combined {}", shell_quote(device), channel_count),
            &ExecOptions::new().elevated(),
        )?
        .assert_exit_code_with(&format!("cannot change channel count of {}", device))?;
        self.get_device_channels_info(session, device, true)
    }

    pub fn get_device_enabled_features(&self, session: &HostSession, device: &str) -> Result<DeviceFeatures> {
        if let Some(hit) = lock(&self.features).get(device) {
            return Ok(hit.clone());
        }
        let result = self.run(session, &format!("-k {}", shell_quote(device)), &ExecOptions::new())?;
        result.assert_exit_code_with(&format!("cannot get features of {}", device))?;
        let parsed = parse_features(device, &result.stdout)?;
        lock(&self.features).insert(device.to_string(), parsed.clone());
        Ok(parsed)
    }

    pub fn get_device_link_settings(&self, session: &HostSession, device: &str) -> Result<DeviceLinkSettings> {
        if let Some(hit) = lock(&self.link_settings).get(device) {
            return Ok(hit.clone());
        }
        let result = self.run(session, &shell_quote(device), &ExecOptions::new())?;
        result.assert_exit_code_with(&format!("cannot get link settings of {}", device))?;
        let parsed = parse_link_settings(device, &result.stdout)?;
        lock(&self.link_settings).insert(device.to_string(), parsed.clone());
        Ok(parsed)
    }

    pub fn get_device_ring_buffer_settings(
        &self,
        session: &HostSession,
        device: &str,
        force: bool,
    ) -> Result<DeviceRingBufferSettings> {
        if !force {
            if let Some(hit) = lock(&self.ring_buffers).get(device) {
                return Ok(hit.clone());
            }
        }
        let result = self.query(
            session,
            &format!("-g {}", shell_quote(device)),
            &format!("cannot get ring buffer settings of {}", device),
        )?;
        let parsed = parse_ring_buffer(device, &result.stdout)?;
        lock(&self.ring_buffers).insert(device.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Set RX and TX ring sizes and return the re-read settings.
    pub fn change_device_ring_buffer_settings(
        &self,
        session: &HostSession,
        device: &str,
        rx: u32,
        tx: u32,
    ) -> Result<DeviceRingBufferSettings> {
        self.run(
            session,
            &format!("-G {} rx {} tx {}", shell_quote(device), rx, tx),
            &ExecOptions::new().elevated(),
        )?
        .assert_exit_code_with(&format!("cannot change ring buffer settings of {}", device))?;
        self.get_device_ring_buffer_settings(session, device, true)
    }

    pub fn get_all_device_channels_info(&self, session: &HostSession) -> Result<Vec<DeviceChannel>> {
        self.get_device_list(session, false)?
            .iter()
            .map(|d| self.get_device_channels_info(session, d, false))
            .collect()
    }

    pub fn get_all_device_enabled_features(&self, session: &HostSession) -> Result<Vec<DeviceFeatures>> {
        self.get_device_list(session, false)?
            .iter()
            .map(|d| self.get_device_enabled_features(session, d))
            .collect()
    }

    pub fn get_all_device_link_settings(&self, session: &HostSession) -> Result<Vec<DeviceLinkSettings>> {
        self.get_device_list(session, false)?
            .iter()
            .map(|d| self.get_device_link_settings(session, d))
            .collect()
    }

    pub fn get_all_device_ring_buffer_settings(
        &self,
        session: &HostSession,
    ) -> Result<Vec<DeviceRingBufferSettings>> {
        self.get_device_list(session, false)?
            .iter()
            .map(|d| self.get_device_ring_buffer_settings(session, d, false))
            .collect()
    }
}

impl Tool for Ethtool {
    fn command(&self) -> &str {
        "ethtool"
    }

    fn can_install(&self) -> bool {
        true
    }

    fn packages(&self, _family: OsFamily) -> Vec<String> {
        vec!["ethtool".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNELS: &str = "Channel parameters for eth0:
Pre-set maximums:
RX:             0
TX:             0
Other:          0
Combined:       8
Current hardware settings:
RX:             0
TX:             0
Other:          0
Combined:       4
";

    const RINGS: &str = "Ring parameters for eth0:
Pre-set maximums:
RX:             18811
RX Mini:        0
RX Jumbo:       0
TX:             2560
Current hardware settings:
RX:             9709
RX Mini:        0
RX Jumbo:       0
TX:             170
";

    #[test]
    fn test_parse_channels() {
        let parsed = parse_channels("eth0", CHANNELS).unwrap();
        assert_eq!(parsed.current_channels, 4);
        assert_eq!(parsed.max_channels, 8);
    }

    #[test]
    fn test_channels_without_combined() {
        let raw = CHANNELS.replace("Combined", "Merged");
        assert!(matches!(
            parse_channels("eth0", &raw),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_ring_buffer() {
        let parsed = parse_ring_buffer("eth0", RINGS).unwrap();
        assert_eq!(parsed.current_rx().unwrap(), 9709);
        assert_eq!(parsed.current_tx().unwrap(), 170);
        assert_eq!(parsed.max_value("RX").unwrap(), 18811);
        assert_eq!(parsed.current.get("RX Mini").map(String::as_str), Some("0"));
        assert!(!parsed.max.contains_key("Current hardware settings"));
    }

    #[test]
    fn test_ring_buffer_missing_block() {
        let raw = "Ring parameters for eth0:\nRX: 1\n";
        assert!(parse_ring_buffer("eth0", raw).is_err());
    }

    #[test]
    fn test_parse_features() {
        let raw = "Features for eth0:
rx-checksumming: on
tx-checksumming: on
\ttx-checksum-ipv4: on
\ttx-checksum-ip-generic: off [fixed]
scatter-gather: on
rx-vlan-filter: off [requested on]
tcp-segmentation-offload: on [fixed]
";
        let parsed = parse_features("eth0", raw).unwrap();
        assert!(parsed.is_enabled("tx-checksum-ipv4"));
        assert!(parsed.is_enabled("tcp-segmentation-offload"));
        assert!(!parsed.is_enabled("tx-checksum-ip-generic"));
        assert!(!parsed.is_enabled("rx-vlan-filter"));
        assert_eq!(parsed.enabled_features.len(), 5);
    }

    #[test]
    fn test_parse_link_settings() {
        let raw = "Settings for eth0:
\tSupported ports: [ ]
\tSupported link modes:   Not reported
\t                        1000baseT/Full
\tSpeed: 50000Mb/s
\tDuplex: Full
\tAuto-negotiation: off
";
        let parsed = parse_link_settings("eth0", raw).unwrap();
        assert_eq!(parsed.settings["Speed"], "50000Mb/s");
        assert_eq!(parsed.settings["Supported link modes"], "Not reported");
        assert_eq!(parsed.settings["Supported ports"], "[ ]");
        assert_eq!(parsed.settings.len(), 5);
    }

    #[test]
    fn test_link_settings_need_header() {
        assert!(parse_link_settings("eth0", "Speed: 10Mb/s").is_err());
    }
}
