//! hostcheck core library
//!
//! Drives a POSIX host through a command executor, installs the tools a
//! check needs on demand, and waits for asynchronous system state to settle:
//! - Command execution (local backend plus a scripted test double)
//! - OS family detection and package installation
//! - Capability resolution: one concrete tool variant per capability and host
//! - Convergence polling with bounded retry budgets
//! - Service restart fallback chains
//! - Time synchronization and network device scenarios
//!
//! The binary entry point is in `main.rs`.

pub mod exec;
pub mod exit_codes;
pub mod logging;
pub mod os;
pub mod poll;
pub mod registry;
pub mod scenarios;
pub mod service;
pub mod tool;
pub mod tools;

pub use exec::{CommandExecutor, ExecOptions, LocalExecutor};
pub use poll::{poll, poll_with, CheckError, RetryPolicy, Sleeper, ThreadSleeper};
pub use registry::{CapabilityRegistry, HostSession};
pub use service::{RestartStrategy, ServiceManager};
pub use tool::{Capability, InstallStrategy, TimeSyncClient, Tool, ToolHandle, ToolKind, ToolVariant};
