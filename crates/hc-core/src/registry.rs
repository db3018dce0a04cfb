//! Capability resolution and host sessions.
//!
//! [`CapabilityRegistry`] is a table of tool variants per capability, each
//! applicable to one OS family or to any host. [`HostSession`] binds the
//! registry to one machine: it selects the variant for the host's family,
//! installs it once, and caches the handle for the rest of the run.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use hc_common::{Error, OsFamily, Result};
use hc_config::HarnessConfig;
use tracing::{debug, info, instrument, warn};

use crate::exec::{CommandExecutor, LocalExecutorBuilder};
use crate::logging::event_names;
use crate::os::{HostPackages, PackageInstaller};
use crate::poll::{poll_with, CheckError, RetryPolicy, Sleeper, ThreadSleeper};
use crate::tool::{Capability, ToolHandle, ToolKind, ToolVariant};
use crate::tools::{Chrony, Echo, Ethtool, Find, Gcc, Git, Ntp, Ntpstat, Service, Systemctl};

type Factory = Arc<dyn Fn() -> ToolVariant + Send + Sync>;

/// One registered implementation of a capability.
#[derive(Clone)]
pub struct VariantEntry {
    /// Variant name, for logs and listings.
    pub name: &'static str,

    /// OS family this variant serves; `None` marks the default variant.
    pub family: Option<OsFamily>,

    factory: Factory,
}

impl VariantEntry {
    /// A fresh instance of this variant.
    pub fn instantiate(&self) -> ToolVariant {
        (self.factory)()
    }
}

impl fmt::Debug for VariantEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantEntry")
            .field("name", &self.name)
            .field("family", &self.family)
            .finish()
    }
}

/// Variant table keyed by capability.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    variants: HashMap<Capability, Vec<VariantEntry>>,
}

impl CapabilityRegistry {
    /// A registry with no variants.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in variant table.
    ///
    /// Debian-like hosts get ntp for time sync; everything else gets chrony.
    pub fn with_defaults() -> Self {
        Self::empty()
            .with_variant(Capability::TimeSyncClient, Some(OsFamily::DebianLike), "ntp", || {
                Ntp::new().into()
            })
            .with_variant(Capability::TimeSyncClient, Some(OsFamily::RedhatLike), "chrony", || {
                Chrony::new().into()
            })
            .with_variant(Capability::TimeSyncClient, Some(OsFamily::SuseLike), "chrony", || {
                Chrony::new().into()
            })
            .with_variant(Capability::TimeSyncClient, None, "chrony", || Chrony::new().into())
            .with_variant(Capability::TimeSyncStatus, None, "ntpstat", || Ntpstat::new().into())
            .with_variant(Capability::ServiceManager, None, "service", || Service::new().into())
            .with_variant(Capability::UnitManager, None, "systemctl", || Systemctl::new().into())
            .with_variant(Capability::NetworkDeviceSettings, None, "ethtool", || {
                Ethtool::new().into()
            })
            .with_variant(Capability::SourceControl, None, "git", || Git::new().into())
            .with_variant(Capability::Compiler, None, "gcc", || Gcc::new().into())
            .with_variant(Capability::Shell, None, "echo", || Echo::new().into())
            .with_variant(Capability::FileFinder, None, "find", || Find::new().into())
    }

    /// Register a variant. A later registration for the same capability and
    /// family replaces the earlier one.
    pub fn register<F>(
        &mut self,
        capability: Capability,
        family: Option<OsFamily>,
        name: &'static str,
        factory: F,
    ) where
        F: Fn() -> ToolVariant + Send + Sync + 'static,
    {
        let entries = self.variants.entry(capability).or_default();
        entries.retain(|e| e.family != family);
        entries.push(VariantEntry {
            name,
            family,
            factory: Arc::new(factory),
        });
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_variant<F>(
        mut self,
        capability: Capability,
        family: Option<OsFamily>,
        name: &'static str,
        factory: F,
    ) -> Self
    where
        F: Fn() -> ToolVariant + Send + Sync + 'static,
    {
        self.register(capability, family, name, factory);
        self
    }

    /// Variant for `capability` on `family`: exact family match first, then
    /// the default variant.
    pub fn select(&self, capability: Capability, family: OsFamily) -> Option<&VariantEntry> {
        let entries = self.variants.get(&capability)?;
        entries
            .iter()
            .find(|e| e.family == Some(family))
            .or_else(|| entries.iter().find(|e| e.family.is_none()))
    }

    /// All variants registered for `capability`.
    pub fn variants(&self, capability: Capability) -> &[VariantEntry] {
        self.variants
            .get(&capability)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Execution context for one host.
///
/// Owns the executor, the package binding, the harness configuration and
/// every tool resolved during the run.
pub struct HostSession {
    executor: Arc<dyn CommandExecutor>,
    installer: Arc<dyn PackageInstaller>,
    config: HarnessConfig,
    registry: CapabilityRegistry,
    sleeper: Arc<dyn Sleeper>,
    resolved: Mutex<HashMap<Capability, ToolHandle>>,
}

impl HostSession {
    pub fn builder(
        executor: Arc<dyn CommandExecutor>,
        installer: Arc<dyn PackageInstaller>,
    ) -> HostSessionBuilder {
        HostSessionBuilder::new(executor, installer)
    }

    /// Session on the local machine, detecting its OS family and package manager.
    pub fn local(config: HarnessConfig) -> Result<Self> {
        let executor: Arc<dyn CommandExecutor> =
            Arc::new(LocalExecutorBuilder::from_config(&config.execution).build());
        Self::detect(executor, config)
    }

    /// Session on the host behind `executor`, detecting its package binding.
    pub fn detect(executor: Arc<dyn CommandExecutor>, config: HarnessConfig) -> Result<Self> {
        let installer = Arc::new(HostPackages::detect(executor.clone())?);
        info!(
            family = %installer.family(),
            manager = %installer.manager(),
            host = %executor.describe(),
            "host session ready"
        );
        Ok(Self::builder(executor, installer).config(config).build())
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    pub fn installer(&self) -> &dyn PackageInstaller {
        self.installer.as_ref()
    }

    pub fn family(&self) -> OsFamily {
        self.installer.family()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Poll `check` with this session's sleeper.
    pub fn poll<T, F>(&self, policy: &RetryPolicy, check: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, CheckError>,
    {
        poll_with(policy, self.sleeper.as_ref(), check)
    }

    /// Resolve `capability` to a tool for this host.
    ///
    /// The first call selects a variant, instantiates it and runs its
    /// installation; later calls return the cached handle. A variant that
    /// fails to install is still cached and returned, so its commands report
    /// the failure where they are used.
    #[instrument(skip(self), fields(capability = %capability, family = %self.family()))]
    pub fn resolve(&self, capability: Capability) -> Result<ToolHandle> {
        if let Some(handle) = self.lock_resolved().get(&capability) {
            debug!(target: event_names::RESOLVE_CACHED, variant = handle.name(), "cached");
            return Ok(handle.clone());
        }

        let family = self.family();
        let Some(entry) = self.registry.select(capability, family) else {
            warn!(target: event_names::RESOLVE_UNAVAILABLE, "no variant for this host");
            return Err(Error::CapabilityUnavailable {
                capability: capability.to_string(),
                family,
            });
        };
        info!(target: event_names::RESOLVE_SELECTED, variant = entry.name, "selected");
        let handle = ToolHandle::new(capability, entry.instantiate());

        // Installation may resolve other capabilities, so the cache is not
        // locked while it runs.
        if !handle.ensure_installed(self)? {
            warn!(
                target: event_names::INSTALL_FAILED,
                variant = handle.name(),
                "tool unavailable after install attempts"
            );
        }

        let mut resolved = self.lock_resolved();
        Ok(resolved.entry(capability).or_insert(handle).clone())
    }

    /// Resolve `T`'s capability and return the concrete tool.
    ///
    /// Fails with [`Error::VariantMismatch`] when another variant serves the
    /// capability on this host.
    pub fn tool<T: ToolKind>(&self) -> Result<Arc<T>> {
        let handle = self.resolve(T::CAPABILITY)?;
        handle.downcast::<T>().ok_or_else(|| Error::VariantMismatch {
            capability: T::CAPABILITY.to_string(),
            expected: T::NAME.to_string(),
            actual: handle.name().to_string(),
        })
    }

    /// Whether `capability` has been resolved in this session.
    pub fn is_resolved(&self, capability: Capability) -> bool {
        self.lock_resolved().contains_key(&capability)
    }

    fn lock_resolved(&self) -> MutexGuard<'_, HashMap<Capability, ToolHandle>> {
        self.resolved.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl HostSession {
    /// Builder for a session driven by a scripted executor.
    ///
    /// Packages go through the family's default manager on the same executor
    /// and poll delays are recorded instead of slept.
    pub fn scripted(
        family: OsFamily,
        executor: Arc<crate::exec::mock::ScriptedExecutor>,
    ) -> HostSessionBuilder {
        let manager = crate::os::PackageManager::for_family(family);
        let installer = Arc::new(HostPackages::new(family, manager, executor.clone()));
        HostSessionBuilder::new(executor, installer)
            .sleeper(Arc::new(crate::poll::RecordingSleeper::new()))
    }
}

impl fmt::Debug for HostSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostSession")
            .field("target", &self.executor.describe())
            .field("family", &self.family())
            .finish()
    }
}

/// Builder for [`HostSession`].
pub struct HostSessionBuilder {
    executor: Arc<dyn CommandExecutor>,
    installer: Arc<dyn PackageInstaller>,
    config: HarnessConfig,
    registry: CapabilityRegistry,
    sleeper: Arc<dyn Sleeper>,
}

impl HostSessionBuilder {
    pub fn new(executor: Arc<dyn CommandExecutor>, installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            executor,
            installer,
            config: HarnessConfig::default(),
            registry: CapabilityRegistry::with_defaults(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sleeper used between poll attempts.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn build(self) -> HostSession {
        HostSession {
            executor: self.executor,
            installer: self.installer,
            config: self.config,
            registry: self.registry,
            sleeper: self.sleeper,
            resolved: Mutex::new(HashMap::new()),
        }
    }
}
