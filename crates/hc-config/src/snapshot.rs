//! Provenance of the configuration a run used.
//!
//! Two runs with the same `effective_hash` polled with the same budgets and
//! wrote the same server lines, whichever file they were read from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::harness::HarnessConfig;
use crate::resolve::{ConfigLocation, ConfigSource};

/// Length of the identifier shown in human output.
const SHORT_ID_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub taken_at: DateTime<Utc>,
    #[serde(default)]
    pub host: Option<String>,
    pub source: ConfigSource,
    #[serde(default)]
    pub path: Option<String>,
    pub schema_version: String,
    /// Digest of the file bytes as read. Absent for built-in defaults.
    #[serde(default)]
    pub file_hash: Option<String>,
    /// Digest of the configuration after defaults were filled in.
    pub effective_hash: String,
    /// Attempt budget per polled check.
    pub budgets: BTreeMap<String, u32>,
    pub server_count: usize,
}

impl ConfigSnapshot {
    pub fn new(config: &HarnessConfig, location: &ConfigLocation, raw: Option<&str>) -> Self {
        // Struct field order is fixed, so the serialized form is stable.
        let effective = serde_json::to_vec(config).unwrap_or_default();

        let budgets = config
            .retry
            .entries()
            .into_iter()
            .map(|(check, spec)| (check.to_string(), spec.max_attempts))
            .collect();

        ConfigSnapshot {
            taken_at: Utc::now(),
            host: hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok()),
            source: location.source,
            path: location.path.as_deref().map(|p| p.display().to_string()),
            schema_version: config.schema_version.clone(),
            file_hash: raw.map(|text| digest(text.as_bytes())),
            effective_hash: digest(&effective),
            budgets,
            server_count: config.timesync.servers.len(),
        }
    }

    /// True when both snapshots describe the same effective configuration.
    pub fn same_effective(&self, other: &ConfigSnapshot) -> bool {
        self.effective_hash == other.effective_hash
    }

    pub fn short_id(&self) -> &str {
        let end = SHORT_ID_LEN.min(self.effective_hash.len());
        &self.effective_hash[..end]
    }
}

fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builtin() -> ConfigSnapshot {
        ConfigSnapshot::new(&HarnessConfig::default(), &ConfigLocation::default(), None)
    }

    #[test]
    fn builtin_defaults_have_no_file_hash() {
        let snap = builtin();
        assert_eq!(snap.source, ConfigSource::BuiltinDefault);
        assert!(snap.file_hash.is_none());
        assert!(snap.path.is_none());
        assert_eq!(snap.server_count, 4);
        assert_eq!(snap.budgets.len(), 3);
        assert!(snap.budgets.contains_key("chrony_tracking"));
    }

    #[test]
    fn short_id_is_a_hash_prefix() {
        let snap = builtin();
        assert_eq!(snap.effective_hash.len(), 64);
        assert!(snap.effective_hash.starts_with(snap.short_id()));
        assert_eq!(snap.short_id().len(), SHORT_ID_LEN);
    }

    #[test]
    fn changing_a_budget_changes_the_effective_hash() {
        let mut slower = HarnessConfig::default();
        slower.retry.ntp_leap.max_attempts = 3;
        let other = ConfigSnapshot::new(&slower, &ConfigLocation::default(), None);

        assert!(builtin().same_effective(&builtin()));
        assert!(!builtin().same_effective(&other));
        assert_eq!(other.budgets["ntp_leap"], 3);
    }

    #[test]
    fn file_hash_tracks_raw_text_not_meaning() {
        let config = HarnessConfig::default();
        let loc = ConfigLocation::default();
        let compact = ConfigSnapshot::new(&config, &loc, Some("{}"));
        let spaced = ConfigSnapshot::new(&config, &loc, Some("{ }"));

        assert_ne!(compact.file_hash, spaced.file_hash);
        assert!(compact.same_effective(&spaced));
    }
}
