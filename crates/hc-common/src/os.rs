//! Operating system family classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse OS family used to pick packages and tool variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    DebianLike,
    RedhatLike,
    SuseLike,
    #[default]
    Other,
}

impl OsFamily {
    /// All families, in declaration order.
    pub const ALL: [OsFamily; 4] = [
        OsFamily::DebianLike,
        OsFamily::RedhatLike,
        OsFamily::SuseLike,
        OsFamily::Other,
    ];

    /// Classify a host from the contents of `/etc/os-release`.
    ///
    /// `ID` is consulted first, then each token of `ID_LIKE` in order.
    pub fn from_os_release(content: &str) -> Self {
        let mut id = None;
        let mut id_like = None;
        for line in content.lines() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix("ID=") {
                id = Some(unquote(value).to_ascii_lowercase());
            } else if let Some(value) = line.strip_prefix("ID_LIKE=") {
                id_like = Some(unquote(value).to_ascii_lowercase());
            }
        }

        if let Some(family) = id.as_deref().and_then(Self::from_distro_id) {
            return family;
        }
        id_like
            .as_deref()
            .and_then(|like| like.split_whitespace().find_map(Self::from_distro_id))
            .unwrap_or(OsFamily::Other)
    }

    /// Map a single distribution identifier (`ubuntu`, `rhel`, ...) to a family.
    pub fn from_distro_id(id: &str) -> Option<Self> {
        match id {
            "debian" | "ubuntu" | "linuxmint" | "raspbian" => Some(OsFamily::DebianLike),
            "rhel" | "centos" | "fedora" | "ol" | "almalinux" | "rocky" | "amzn" => {
                Some(OsFamily::RedhatLike)
            }
            "sles" | "sled" | "suse" => Some(OsFamily::SuseLike),
            other if other.starts_with("opensuse") => Some(OsFamily::SuseLike),
            _ => None,
        }
    }
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"').trim_matches('\'')
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::DebianLike => write!(f, "debian_like"),
            OsFamily::RedhatLike => write!(f, "redhat_like"),
            OsFamily::SuseLike => write!(f, "suse_like"),
            OsFamily::Other => write!(f, "other"),
        }
    }
}

impl FromStr for OsFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "debian_like" | "debian" => Ok(OsFamily::DebianLike),
            "redhat_like" | "redhat" => Ok(OsFamily::RedhatLike),
            "suse_like" | "suse" => Ok(OsFamily::SuseLike),
            "other" => Ok(OsFamily::Other),
            _ => Err(format!("unknown OS family: {}", s)),
        }
    }
}
