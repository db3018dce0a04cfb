//! Finding `harness.json`.
//!
//! Candidates in order: `--config`, `$HOSTCHECK_CONFIG`,
//! `$HOSTCHECK_CONFIG_DIR/harness.json`, the user config directory,
//! `/etc/hostcheck/harness.json`. The first that exists wins; with none the
//! built-in defaults apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "HOSTCHECK_CONFIG";
pub const ENV_CONFIG_DIR: &str = "HOSTCHECK_CONFIG_DIR";
pub const CONFIG_FILENAME: &str = "harness.json";

const APP_DIR: &str = "hostcheck";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    CliArgument,
    /// One of the `HOSTCHECK_CONFIG*` variables.
    Environment,
    /// `~/.config/hostcheck` or the platform equivalent.
    XdgConfig,
    SystemConfig,
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ConfigSource::CliArgument => "--config",
            ConfigSource::Environment => "environment",
            ConfigSource::XdgConfig => "user config dir",
            ConfigSource::SystemConfig => "/etc",
            ConfigSource::BuiltinDefault => "built-in defaults",
        })
    }
}

/// The chosen file, or `path: None` for built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigLocation {
    pub path: Option<PathBuf>,
    pub source: ConfigSource,
}

/// Pick the configuration file for this run.
///
/// A `--config` path is taken as given, existing or not, so a typo surfaces
/// as a load error rather than a silent fall back to defaults.
pub fn resolve_config(cli_path: Option<&Path>) -> ConfigLocation {
    let env_path = std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from);
    let env_dir = std::env::var_os(ENV_CONFIG_DIR).map(PathBuf::from);
    let user_dir = dirs::config_dir().map(|d| d.join(APP_DIR));
    let system_dir = Path::new("/etc").join(APP_DIR);

    pick(cli_path, env_path, env_dir, user_dir, system_dir)
}

fn pick(
    cli_path: Option<&Path>,
    env_path: Option<PathBuf>,
    env_dir: Option<PathBuf>,
    user_dir: Option<PathBuf>,
    system_dir: PathBuf,
) -> ConfigLocation {
    if let Some(path) = cli_path {
        return ConfigLocation {
            path: Some(path.to_path_buf()),
            source: ConfigSource::CliArgument,
        };
    }

    let candidates = [
        (env_path, ConfigSource::Environment),
        (env_dir.map(|d| d.join(CONFIG_FILENAME)), ConfigSource::Environment),
        (user_dir.map(|d| d.join(CONFIG_FILENAME)), ConfigSource::XdgConfig),
        (Some(system_dir.join(CONFIG_FILENAME)), ConfigSource::SystemConfig),
    ];

    candidates
        .into_iter()
        .find_map(|(path, source)| {
            path.filter(|p| p.is_file()).map(|p| ConfigLocation {
                path: Some(p),
                source,
            })
        })
        .unwrap_or_default()
}
