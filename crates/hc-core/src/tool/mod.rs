//! Tool abstraction.
//!
//! A [`Tool`] wraps one command-line program on the target host. It knows its
//! command name, how to tell whether it is present, and how to get it
//! installed when it is not. Tools are stateless with respect to the host:
//! every operation takes the [`HostSession`] it runs against.
//!
//! Concrete tools are grouped by [`Capability`]. The registry picks one
//! concrete variant per capability for the host's OS family and hands it out
//! as a [`ToolHandle`]; typed access goes through [`ToolKind`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hc_common::{CommandResult, OsFamily, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::exec::{shell_quote, ExecOptions};
use crate::logging::event_names;
use crate::registry::HostSession;
use crate::service::ServiceManager;
use crate::tools::{Chrony, Echo, Ethtool, Find, Gcc, Git, Ntp, Ntpstat, Service, Systemctl};

/// Logical capability a scenario can ask a host session for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Client for a time synchronization daemon (chrony or ntp).
    TimeSyncClient,
    /// Reports whether the clock is synchronised.
    TimeSyncStatus,
    /// SysV-style `service` front end.
    ServiceManager,
    /// systemd unit control.
    UnitManager,
    /// Network device driver settings.
    NetworkDeviceSettings,
    SourceControl,
    Compiler,
    /// Shell builtins used for file edits.
    Shell,
    FileFinder,
}

impl Capability {
    pub const ALL: [Capability; 9] = [
        Capability::TimeSyncClient,
        Capability::TimeSyncStatus,
        Capability::ServiceManager,
        Capability::UnitManager,
        Capability::NetworkDeviceSettings,
        Capability::SourceControl,
        Capability::Compiler,
        Capability::Shell,
        Capability::FileFinder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TimeSyncClient => "time-sync-client",
            Capability::TimeSyncStatus => "time-sync-status",
            Capability::ServiceManager => "service-manager",
            Capability::UnitManager => "unit-manager",
            Capability::NetworkDeviceSettings => "network-device-settings",
            Capability::SourceControl => "source-control",
            Capability::Compiler => "compiler",
            Capability::Shell => "shell",
            Capability::FileFinder => "file-finder",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| format!("unknown capability: {}", s))
    }
}

/// One way of getting a tool onto a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallStrategy {
    /// Install the tool's packages through the host package manager.
    Package,
    /// Clone and compile the tool's sources.
    FromSource,
}

impl fmt::Display for InstallStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStrategy::Package => write!(f, "package"),
            InstallStrategy::FromSource => write!(f, "from_source"),
        }
    }
}

/// A command-line program on the target host.
pub trait Tool: Send + Sync + 'static {
    /// Executable invoked by [`run`](Tool::run).
    fn command(&self) -> &str;

    /// Whether hostcheck may install this tool when it is missing.
    fn can_install(&self) -> bool {
        false
    }

    /// Packages providing the tool on `family`.
    fn packages(&self, _family: OsFamily) -> Vec<String> {
        Vec::new()
    }

    /// Install strategies, tried in order.
    fn install_strategies(&self) -> Vec<InstallStrategy> {
        if self.can_install() {
            vec![InstallStrategy::Package]
        } else {
            Vec::new()
        }
    }

    /// Whether the tool is usable on the host. Must not change host state.
    fn presence_check(&self, session: &HostSession) -> Result<bool> {
        let probe = format!("command -v {}", shell_quote(self.command()));
        let result = session
            .executor()
            .execute(&probe, &ExecOptions::new().with_shell())?;
        Ok(result.success())
    }

    /// Build the tool from source. Failures are `Ok(false)`.
    fn build_from_source(&self, _session: &HostSession) -> Result<bool> {
        Ok(false)
    }

    /// Run the tool with `args` appended to its command.
    fn run(&self, session: &HostSession, args: &str, opts: &ExecOptions) -> Result<CommandResult> {
        let command = if args.is_empty() {
            self.command().to_string()
        } else {
            format!("{} {}", self.command(), args)
        };
        debug!(
            target: event_names::EXEC_COMMAND,
            command = %command,
            elevate = opts.elevate,
            shell = opts.shell,
            "running tool"
        );
        session.executor().execute(&command, opts)
    }

    /// Make sure the tool is present, installing it if allowed.
    ///
    /// Returns the final presence result. Strategies are tried in order and
    /// the first one after which the tool is present wins. A failed install
    /// is `Ok(false)`; only transport errors propagate.
    fn ensure_installed(&self, session: &HostSession) -> Result<bool> {
        if self.presence_check(session)? {
            debug!(target: event_names::INSTALL_PRESENT, tool = self.command(), "already present");
            return Ok(true);
        }
        if !self.can_install() {
            warn!(
                target: event_names::INSTALL_FAILED,
                tool = self.command(),
                "tool is missing and cannot be installed"
            );
            return Ok(false);
        }

        for strategy in self.install_strategies() {
            let attempted = match strategy {
                InstallStrategy::Package => {
                    let packages = self.packages(session.family());
                    if packages.is_empty() {
                        continue;
                    }
                    info!(
                        target: event_names::INSTALL_STRATEGY,
                        tool = self.command(),
                        %strategy,
                        ?packages,
                        "installing"
                    );
                    session.installer().install(&packages)?
                }
                InstallStrategy::FromSource => {
                    info!(
                        target: event_names::INSTALL_STRATEGY,
                        tool = self.command(),
                        %strategy,
                        "building"
                    );
                    self.build_from_source(session)?
                }
            };
            if !attempted {
                debug!(tool = self.command(), %strategy, "install strategy reported failure");
            }
            if self.presence_check(session)? {
                info!(
                    target: event_names::INSTALL_FINISHED,
                    tool = self.command(),
                    %strategy,
                    "tool installed"
                );
                return Ok(true);
            }
        }

        warn!(
            target: event_names::INSTALL_FAILED,
            tool = self.command(),
            "all install strategies failed"
        );
        Ok(false)
    }
}

/// Client for a time synchronization daemon.
pub trait TimeSyncClient: Tool {
    /// Restart the daemon, falling back across its known service names.
    fn restart(&self, session: &HostSession) -> Result<CommandResult>;

    /// Append upstream servers when none are configured.
    ///
    /// Returns whether any line was written.
    fn check_server_setting(&self, session: &HostSession) -> Result<bool>;

    /// Wait until the daemon reports the clock locked to a source.
    fn check_time_locked(&self, session: &HostSession) -> Result<CommandResult>;

    /// Verify the daemon can list its sources.
    fn check_sources_configured(&self, session: &HostSession) -> Result<()>;
}

/// Compile-time link between a concrete tool type and its capability.
pub trait ToolKind: Tool + Sized {
    const CAPABILITY: Capability;

    /// Variant name, as reported by [`ToolVariant::name`].
    const NAME: &'static str;

    /// The concrete tool if `variant` holds one of this type.
    fn extract(variant: &ToolVariant) -> Option<Arc<Self>>;
}

macro_rules! tool_variants {
    ($($variant:ident => $capability:ident, $name:literal;)+) => {
        /// A concrete tool instance, one arm per known tool.
        #[derive(Clone)]
        pub enum ToolVariant {
            $($variant(Arc<$variant>),)+
        }

        impl ToolVariant {
            pub fn as_tool(&self) -> &dyn Tool {
                match self {
                    $(ToolVariant::$variant(tool) => tool.as_ref(),)+
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(ToolVariant::$variant(_) => $name,)+
                }
            }

            /// Capability this variant natively serves.
            pub fn capability(&self) -> Capability {
                match self {
                    $(ToolVariant::$variant(_) => Capability::$capability,)+
                }
            }

            /// Whether both hold the very same instance.
            pub fn ptr_eq(&self, other: &ToolVariant) -> bool {
                match (self, other) {
                    $((ToolVariant::$variant(a), ToolVariant::$variant(b)) => Arc::ptr_eq(a, b),)+
                    _ => false,
                }
            }
        }

        $(
            impl ToolKind for $variant {
                const CAPABILITY: Capability = Capability::$capability;
                const NAME: &'static str = $name;

                fn extract(variant: &ToolVariant) -> Option<Arc<Self>> {
                    match variant {
                        ToolVariant::$variant(tool) => Some(Arc::clone(tool)),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }

            impl From<$variant> for ToolVariant {
                fn from(tool: $variant) -> Self {
                    ToolVariant::$variant(Arc::new(tool))
                }
            }
        )+
    };
}

tool_variants! {
    Chrony => TimeSyncClient, "chrony";
    Ntp => TimeSyncClient, "ntp";
    Ntpstat => TimeSyncStatus, "ntpstat";
    Service => ServiceManager, "service";
    Systemctl => UnitManager, "systemctl";
    Ethtool => NetworkDeviceSettings, "ethtool";
    Git => SourceControl, "git";
    Gcc => Compiler, "gcc";
    Echo => Shell, "echo";
    Find => FileFinder, "find";
}

impl ToolVariant {
    /// The variant as a time synchronization client, if it is one.
    pub fn as_time_sync(&self) -> Option<Arc<dyn TimeSyncClient>> {
        match self {
            ToolVariant::Chrony(tool) => Some(tool.clone()),
            ToolVariant::Ntp(tool) => Some(tool.clone()),
            _ => None,
        }
    }

    /// The variant as a service manager, if it is one.
    pub fn as_service_manager(&self) -> Option<Arc<dyn ServiceManager>> {
        match self {
            ToolVariant::Service(tool) => Some(tool.clone()),
            ToolVariant::Systemctl(tool) => Some(tool.clone()),
            _ => None,
        }
    }
}

impl fmt::Debug for ToolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ToolVariant").field(&self.name()).finish()
    }
}

/// A resolved tool, cached by the host session.
#[derive(Debug, Clone)]
pub struct ToolHandle {
    capability: Capability,
    variant: ToolVariant,
}

impl ToolHandle {
    pub fn new(capability: Capability, variant: ToolVariant) -> Self {
        Self {
            capability,
            variant,
        }
    }

    /// Capability this handle was resolved for.
    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn variant(&self) -> &ToolVariant {
        &self.variant
    }

    pub fn name(&self) -> &'static str {
        self.variant.name()
    }

    pub fn command(&self) -> &str {
        self.variant.as_tool().command()
    }

    pub fn run(&self, session: &HostSession, args: &str, opts: &ExecOptions) -> Result<CommandResult> {
        self.variant.as_tool().run(session, args, opts)
    }

    pub fn ensure_installed(&self, session: &HostSession) -> Result<bool> {
        self.variant.as_tool().ensure_installed(session)
    }

    pub fn presence_check(&self, session: &HostSession) -> Result<bool> {
        self.variant.as_tool().presence_check(session)
    }

    pub fn as_time_sync(&self) -> Option<Arc<dyn TimeSyncClient>> {
        self.variant.as_time_sync()
    }

    pub fn as_service_manager(&self) -> Option<Arc<dyn ServiceManager>> {
        self.variant.as_service_manager()
    }

    /// The concrete tool, if this handle holds a `T`.
    pub fn downcast<T: ToolKind>(&self) -> Option<Arc<T>> {
        T::extract(&self.variant)
    }

    pub fn ptr_eq(&self, other: &ToolHandle) -> bool {
        self.variant.ptr_eq(&other.variant)
    }
}
