//! OS family detection and package manager binding.
//!
//! The family decides which tool variant serves a capability and which
//! package names to install. The package binding turns "install these
//! packages" into the right package manager invocation for the host.

use std::sync::Arc;

use hc_common::{OsFamily, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::exec::{shell_quote, CommandExecutor, ExecOptions};
use crate::logging::event_names;

/// Installs packages on the target host.
pub trait PackageInstaller: Send + Sync {
    /// OS family of the host.
    fn family(&self) -> OsFamily;

    /// Install packages; `Ok(false)` when the package manager reported failure.
    fn install(&self, packages: &[String]) -> Result<bool>;
}

/// Read `/etc/os-release` on the target and classify the host.
///
/// Hosts without a readable os-release are [`OsFamily::Other`].
#[instrument(skip(executor))]
pub fn detect_os_family(executor: &dyn CommandExecutor) -> Result<OsFamily> {
    let result = executor.execute("cat /etc/os-release", &ExecOptions::new())?;
    if !result.success() {
        warn!(exit_code = result.exit_code, "cannot read /etc/os-release");
        return Ok(OsFamily::Other);
    }
    let family = OsFamily::from_os_release(&result.stdout);
    debug!(%family, "detected OS family");
    Ok(family)
}

/// Supported package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Unknown,
}

impl PackageManager {
    /// Default manager for a family.
    pub fn for_family(family: OsFamily) -> Self {
        match family {
            OsFamily::DebianLike => PackageManager::Apt,
            OsFamily::RedhatLike => PackageManager::Dnf,
            OsFamily::SuseLike => PackageManager::Zypper,
            OsFamily::Other => PackageManager::Unknown,
        }
    }

    /// Pick the manager for a family, probing for dnf vs yum on Red Hat hosts.
    pub fn detect(executor: &dyn CommandExecutor, family: OsFamily) -> Result<Self> {
        if family != OsFamily::RedhatLike {
            return Ok(Self::for_family(family));
        }
        let probe = executor.execute("command -v dnf", &ExecOptions::new().with_shell())?;
        Ok(if probe.success() {
            PackageManager::Dnf
        } else {
            PackageManager::Yum
        })
    }

    /// Full shell command that installs `packages`, or None for [`PackageManager::Unknown`].
    pub fn install_command(&self, packages: &[String]) -> Option<String> {
        let names = packages
            .iter()
            .map(|p| shell_quote(p))
            .collect::<Vec<_>>()
            .join(" ");
        match self {
            PackageManager::Apt => Some(format!(
                "DEBIAN_FRONTEND=noninteractive apt-get install -y -q {}",
                names
            )),
            PackageManager::Dnf => Some(format!("dnf install -y -q {}", names)),
            PackageManager::Yum => Some(format!("yum install -y -q {}", names)),
            PackageManager::Zypper => Some(format!("zypper --non-interactive in {}", names)),
            PackageManager::Unknown => None,
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PackageManager::Apt => write!(f, "apt"),
            PackageManager::Dnf => write!(f, "dnf"),
            PackageManager::Yum => write!(f, "yum"),
            PackageManager::Zypper => write!(f, "zypper"),
            PackageManager::Unknown => write!(f, "unknown"),
        }
    }
}

/// Package binding for one host: family plus manager plus executor.
pub struct HostPackages {
    family: OsFamily,
    manager: PackageManager,
    executor: Arc<dyn CommandExecutor>,
}

impl HostPackages {
    pub fn new(family: OsFamily, manager: PackageManager, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            family,
            manager,
            executor,
        }
    }

    /// Detect family and manager on the host behind `executor`.
    pub fn detect(executor: Arc<dyn CommandExecutor>) -> Result<Self> {
        let family = detect_os_family(executor.as_ref())?;
        let manager = PackageManager::detect(executor.as_ref(), family)?;
        Ok(Self::new(family, manager, executor))
    }

    pub fn manager(&self) -> PackageManager {
        self.manager
    }
}

impl std::fmt::Debug for HostPackages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPackages")
            .field("family", &self.family)
            .field("manager", &self.manager)
            .finish()
    }
}

impl PackageInstaller for HostPackages {
    fn family(&self) -> OsFamily {
        self.family
    }

    #[instrument(skip(self), fields(manager = %self.manager))]
    fn install(&self, packages: &[String]) -> Result<bool> {
        if packages.is_empty() {
            return Ok(true);
        }
        let Some(command) = self.manager.install_command(packages) else {
            warn!(
                target: event_names::INSTALL_FAILED,
                family = %self.family,
                "no package manager for this OS family"
            );
            return Ok(false);
        };

        let result = self
            .executor
            .execute(&command, &ExecOptions::new().elevated().with_shell())?;
        if result.success() {
            info!(target: event_names::INSTALL_FINISHED, ?packages, "packages installed");
            Ok(true)
        } else {
            warn!(
                target: event_names::INSTALL_FAILED,
                ?packages,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "package install failed"
            );
            Ok(false)
        }
    }
}
