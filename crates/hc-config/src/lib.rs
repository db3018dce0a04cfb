//! hostcheck harness configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for harness.json
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation
//! - Config snapshots for run provenance

pub mod harness;
pub mod resolve;
pub mod snapshot;
pub mod validate;

pub use harness::{
    ExecutionConfig, HarnessConfig, InstallConfig, NetworkConfig, RetryConfig, RetryPolicySpec,
    TimesyncConfig,
};
pub use resolve::{resolve_config, ConfigLocation, ConfigSource};
pub use snapshot::ConfigSnapshot;
pub use validate::{validate_harness, ValidationError, ValidationResult};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid JSON in config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Semantic validation failed for {path}: {source}")]
    Validation {
        path: String,
        #[source]
        source: ValidationError,
    },

    #[error("I/O error reading {path}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<ConfigError> for hc_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NotFound { .. } => hc_common::Error::Config(err.to_string()),
            ConfigError::ParseError { ref path, ref source } => hc_common::Error::InvalidConfig {
                path: path.display().to_string(),
                message: source.to_string(),
            },
            ConfigError::Validation { ref path, ref source } => hc_common::Error::InvalidConfig {
                path: path.clone(),
                message: source.to_string(),
            },
            ConfigError::IoError { source, .. } => hc_common::Error::Io(source),
        }
    }
}

/// Configuration together with its provenance.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: HarnessConfig,
    pub location: ConfigLocation,
    pub snapshot: ConfigSnapshot,
}

/// Resolve, read, parse and validate the harness configuration.
///
/// With no config file anywhere on the resolution path the built-in defaults
/// are used.
pub fn load_config(cli_path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let location = resolve_config(cli_path);
    load_from_location(location)
}

/// Load the configuration from an already-resolved location.
pub fn load_from_location(location: ConfigLocation) -> Result<LoadedConfig, ConfigError> {
    let Some(path) = location.path.clone() else {
        let config = HarnessConfig::default();
        let snapshot = ConfigSnapshot::new(&config, &location, None);
        return Ok(LoadedConfig {
            config,
            location,
            snapshot,
        });
    };

    if !path.exists() {
        return Err(ConfigError::NotFound { path });
    }

    let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::IoError {
        path: path.clone(),
        source,
    })?;
    let config = parse_config(&raw).map_err(|source| ConfigError::ParseError {
        path: path.clone(),
        source,
    })?;
    validate_harness(&config).map_err(|source| ConfigError::Validation {
        path: path.display().to_string(),
        source,
    })?;

    let snapshot = ConfigSnapshot::new(&config, &location, Some(&raw));
    Ok(LoadedConfig {
        config,
        location,
        snapshot,
    })
}

/// Parse harness.json content; missing fields take their defaults.
pub fn parse_config(raw: &str) -> Result<HarnessConfig, serde_json::Error> {
    serde_json::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("harness.json");
        std::fs::write(
            &path,
            r#"{"timesync": {"servers": ["time.example.org"]}, "retry": {"chrony_tracking": {"max_attempts": 3, "delay_ms": 0}}}"#,
        )
        .unwrap();

        let loaded = load_config(Some(&path)).unwrap();
        assert_eq!(loaded.location.source, ConfigSource::CliArgument);
        assert_eq!(loaded.config.timesync.servers, vec!["time.example.org"]);
        assert_eq!(loaded.config.retry.chrony_tracking.max_attempts, 3);
        assert!(loaded.snapshot.file_hash.is_some());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(Some(&tmp.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        let common: hc_common::Error = err.into();
        assert_eq!(common.code(), 10);
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("harness.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let common: hc_common::Error = err.into();
        assert_eq!(common.code(), 11);
    }

    #[test]
    fn test_semantic_error_reported_with_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("harness.json");
        std::fs::write(&path, r#"{"timesync": {"servers": []}}"#).unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("harness.json"));
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_defaults_location() {
        let loaded = load_from_location(ConfigLocation::default()).unwrap();
        assert_eq!(loaded.config, HarnessConfig::default());
        assert!(loaded.snapshot.file_hash.is_none());
    }
}
