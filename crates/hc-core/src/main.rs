//! hostcheck core CLI
//!
//! Entry point for the `hc-core` binary:
//! - Host checks (time synchronization, NIC ring buffers)
//! - Capability resolution and tool installation
//! - Network device inspection
//! - Configuration inspection and validation

use clap::{Args, Parser, Subcommand, ValueEnum};
use hc_common::error::format_error_human;
use hc_common::{Error, OutputFormat, StructuredError};
use hc_config::{load_config, LoadedConfig, CONFIG_SCHEMA_VERSION};
use hc_core::exit_codes::ExitCode;
use hc_core::logging::{
    event_names, generate_run_id, get_host_id, init_logging, LogConfig, LogContext, LogFormat,
    LogLevel, Stage,
};
use hc_core::scenarios::{validate_ring_buffer_change, verify_time_sync_with, TimeSyncOptions};
use hc_core::tools::Ethtool;
use hc_core::{Capability, HostSession, ToolHandle};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;

/// hostcheck - verify time sync and network device behavior on a Linux host
#[derive(Parser)]
#[command(name = "hc-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to harness.json (overrides HOSTCHECK_CONFIG and the search path)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format for stdout
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Log level for stderr (overrides HC_LOG)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Log format for stderr (overrides HC_LOG_FORMAT)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a host check
    Check(CheckArgs),

    /// Resolve or install the tool serving a capability
    Tool(ToolArgs),

    /// Inspect synthetic network devices
    Device(DeviceArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print version information
    Version,
}

#[derive(Args, Debug)]
struct CheckArgs {
    #[command(subcommand)]
    command: CheckCommands,
}

#[derive(Subcommand, Debug)]
enum CheckCommands {
    /// Configure, restart and wait for the time sync client to lock
    Timesync {
        /// Also wait for ntpstat to report synchronisation
        #[arg(long)]
        with_status: bool,
    },

    /// Change and restore RX/TX ring sizes on every synthetic device
    RingBuffer {
        /// RX ring size to apply (default from config)
        #[arg(long)]
        rx: Option<u32>,

        /// TX ring size to apply (default from config)
        #[arg(long)]
        tx: Option<u32>,
    },
}

#[derive(Args, Debug)]
struct ToolArgs {
    #[command(subcommand)]
    command: ToolCommands,
}

#[derive(Subcommand, Debug)]
enum ToolCommands {
    /// Show which variant serves a capability here and whether it is present
    Resolve {
        #[arg(value_enum)]
        capability: Capability,
    },

    /// Resolve a capability and install its tool if missing
    Install {
        #[arg(value_enum)]
        capability: Capability,
    },
}

#[derive(Args, Debug)]
struct DeviceArgs {
    #[command(subcommand)]
    command: DeviceCommands,
}

#[derive(Subcommand, Debug)]
enum DeviceCommands {
    /// Report settings of every synthetic network device
    Show {
        /// Only this group of settings (default: all)
        #[arg(long, value_enum)]
        kind: Option<DeviceKind>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DeviceKind {
    Channels,
    Features,
    Link,
    RingBuffer,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration and where it came from
    Show,

    /// Validate a configuration file
    Validate {
        /// File to validate (default: the resolved config)
        path: Option<PathBuf>,
    },
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format)
        .with_color(!cli.global.no_color);
    init_logging(&log_config);

    let ctx = LogContext::new(generate_run_id(), get_host_id());
    let run_span = ctx.span().entered();
    hc_core::log_event!(ctx, DEBUG, event_names::RUN_STARTED, Stage::Init, "starting");

    let exit_code = match &cli.command {
        Commands::Check(args) => run_check(&cli.global, &ctx, args),
        Commands::Tool(args) => run_tool(&cli.global, &ctx, args),
        Commands::Device(args) => run_device(&cli.global, &ctx, args),
        Commands::Config(args) => run_config(&cli.global, &ctx, args),
        Commands::Version => {
            print_version(&cli.global);
            ExitCode::Clean
        }
    };

    hc_core::log_event!(
        ctx,
        DEBUG,
        event_names::RUN_FINISHED,
        Stage::Init,
        "finished",
        exit_code = exit_code.as_i32()
    );
    drop(run_span);
    std::process::exit(exit_code.as_i32());
}

// ============================================================================
// Output helpers
// ============================================================================

/// Print a successful command payload on stdout.
fn emit<T: Serialize>(global: &GlobalOpts, ctx: &LogContext, command: &str, payload: &T, human: impl FnOnce()) {
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "command": command,
                "run_id": ctx.run_id,
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "status": "ok",
                "result": payload,
            });
            match serde_json::to_string_pretty(&response) {
                Ok(text) => println!("{}", text),
                Err(err) => eprintln!("cannot serialize {} output: {}", command, err),
            }
        }
        OutputFormat::Human => human(),
    }
}

/// Report `err` on stderr and return its exit code.
fn report_error(global: &GlobalOpts, ctx: &LogContext, command: &str, err: &Error) -> ExitCode {
    let code = ExitCode::from_error(err);
    hc_core::log_event!(
        ctx,
        WARN,
        event_names::RUN_FINISHED,
        Stage::Init,
        "command failed",
        command = command,
        error_code = err.code()
    );

    match global.format {
        OutputFormat::Json => {
            let structured = StructuredError::from(err)
                .with_context("command_name", command)
                .with_context("exit_code_name", code.code_name())
                .with_context("run_id", &ctx.run_id);
            eprintln!("{}", structured.to_json_pretty());
        }
        OutputFormat::Human => {
            let use_color = !global.no_color && std::io::stderr().is_terminal();
            eprintln!("{}", format_error_human(err, use_color));
        }
    }
    code
}

fn load(global: &GlobalOpts, ctx: &LogContext, command: &str) -> Result<LoadedConfig, ExitCode> {
    load_config(global.config.as_deref()).map_err(|err| {
        let err: Error = err.into();
        report_error(global, ctx, command, &err)
    })
}

fn open_session(global: &GlobalOpts, ctx: &LogContext, command: &str) -> Result<HostSession, ExitCode> {
    let loaded = load(global, ctx, command)?;
    HostSession::local(loaded.config).map_err(|err| report_error(global, ctx, command, &err))
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_check(global: &GlobalOpts, ctx: &LogContext, args: &CheckArgs) -> ExitCode {
    match &args.command {
        CheckCommands::Timesync { with_status } => run_check_timesync(global, ctx, *with_status),
        CheckCommands::RingBuffer { rx, tx } => run_check_ring_buffer(global, ctx, *rx, *tx),
    }
}

fn run_check_timesync(global: &GlobalOpts, ctx: &LogContext, with_status: bool) -> ExitCode {
    const COMMAND: &str = "check timesync";
    let session = match open_session(global, ctx, COMMAND) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let options = TimeSyncOptions {
        check_status: with_status,
    };
    match verify_time_sync_with(&session, options) {
        Ok(report) => {
            emit(global, ctx, COMMAND, &report, || {
                println!("# Time sync");
                println!();
                println!("Host family: {}", report.family);
                println!("Client: {}", report.client);
                if report.servers_added {
                    println!("Servers: appended to client configuration");
                } else {
                    println!("Servers: already configured");
                }
                println!("Lock: {}", report.locked.stdout_trimmed());
                if let Some(status) = &report.status {
                    println!("Status: {}", status.stdout_trimmed());
                }
                println!();
                println!("Status: ✓ Synchronized");
            });
            ExitCode::Clean
        }
        Err(err) => report_error(global, ctx, COMMAND, &err),
    }
}

fn run_check_ring_buffer(global: &GlobalOpts, ctx: &LogContext, rx: Option<u32>, tx: Option<u32>) -> ExitCode {
    const COMMAND: &str = "check ring-buffer";
    let session = match open_session(global, ctx, COMMAND) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let network = &session.config().network;
    let rx = rx.unwrap_or(network.ring_buffer_rx);
    let tx = tx.unwrap_or(network.ring_buffer_tx);
    match validate_ring_buffer_change(&session, rx, tx) {
        Ok(changes) => {
            emit(global, ctx, COMMAND, &changes, || {
                println!("# Ring buffer change");
                println!();
                for change in &changes {
                    println!(
                        "{}: rx {} -> {} -> {}, tx {} -> {} -> {}",
                        change.device,
                        change.original_rx,
                        change.modified_rx,
                        change.original_rx,
                        change.original_tx,
                        change.modified_tx,
                        change.original_tx
                    );
                }
                println!();
                println!("Status: ✓ {} device(s) verified", changes.len());
            });
            ExitCode::Clean
        }
        Err(err) => report_error(global, ctx, COMMAND, &err),
    }
}

#[derive(Serialize)]
struct ToolReport {
    capability: Capability,
    family: hc_common::OsFamily,
    variant: &'static str,
    command: String,
    present: bool,
}

impl ToolReport {
    fn probe(session: &HostSession, handle: &ToolHandle) -> hc_common::Result<Self> {
        Ok(ToolReport {
            capability: handle.capability(),
            family: session.family(),
            variant: handle.name(),
            command: handle.command().to_string(),
            present: handle.presence_check(session)?,
        })
    }

    fn print_human(&self) {
        println!("Capability: {}", self.capability);
        println!("Host family: {}", self.family);
        println!("Variant: {} ({})", self.variant, self.command);
        println!("Present: {}", if self.present { "yes" } else { "no" });
    }
}

fn run_tool(global: &GlobalOpts, ctx: &LogContext, args: &ToolArgs) -> ExitCode {
    let (command, capability, install) = match &args.command {
        ToolCommands::Resolve { capability } => ("tool resolve", *capability, false),
        ToolCommands::Install { capability } => ("tool install", *capability, true),
    };
    let session = match open_session(global, ctx, command) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let handle = if install {
        session.resolve(capability)
    } else {
        // Selection only; nothing is installed.
        session
            .registry()
            .select(capability, session.family())
            .map(|entry| ToolHandle::new(capability, entry.instantiate()))
            .ok_or_else(|| Error::CapabilityUnavailable {
                capability: capability.to_string(),
                family: session.family(),
            })
    };

    match handle.and_then(|h| ToolReport::probe(&session, &h)) {
        Ok(report) => {
            emit(global, ctx, command, &report, || report.print_human());
            if install && !report.present {
                ExitCode::CapabilityError
            } else {
                ExitCode::Clean
            }
        }
        Err(err) => report_error(global, ctx, command, &err),
    }
}

fn run_device(global: &GlobalOpts, ctx: &LogContext, args: &DeviceArgs) -> ExitCode {
    const COMMAND: &str = "device show";
    let DeviceCommands::Show { kind } = &args.command;
    let session = match open_session(global, ctx, COMMAND) {
        Ok(s) => s,
        Err(code) => return code,
    };

    match collect_devices(&session, *kind) {
        Ok(report) => {
            emit(global, ctx, COMMAND, &report, || {
                let pretty = serde_json::to_string_pretty(&report).unwrap_or_default();
                println!("# Network devices");
                println!();
                println!("{}", pretty);
            });
            ExitCode::Clean
        }
        Err(err) => report_error(global, ctx, COMMAND, &err),
    }
}

fn collect_devices(session: &HostSession, kind: Option<DeviceKind>) -> hc_common::Result<serde_json::Value> {
    let ethtool = session.tool::<Ethtool>()?;
    let wanted = |k: DeviceKind| kind.is_none() || kind == Some(k);

    let mut report = serde_json::Map::new();
    report.insert(
        "devices".to_string(),
        serde_json::json!(ethtool.get_device_list(session, false)?),
    );
    if wanted(DeviceKind::Channels) {
        let value = serde_json::to_value(ethtool.get_all_device_channels_info(session)?)?;
        report.insert("channels".to_string(), value);
    }
    if wanted(DeviceKind::Features) {
        let value = serde_json::to_value(ethtool.get_all_device_enabled_features(session)?)?;
        report.insert("features".to_string(), value);
    }
    if wanted(DeviceKind::Link) {
        let value = serde_json::to_value(ethtool.get_all_device_link_settings(session)?)?;
        report.insert("link_settings".to_string(), value);
    }
    if wanted(DeviceKind::RingBuffer) {
        let value = serde_json::to_value(ethtool.get_all_device_ring_buffer_settings(session)?)?;
        report.insert("ring_buffers".to_string(), value);
    }
    Ok(serde_json::Value::Object(report))
}

fn run_config(global: &GlobalOpts, ctx: &LogContext, args: &ConfigArgs) -> ExitCode {
    match &args.command {
        ConfigCommands::Show => run_config_show(global, ctx),
        ConfigCommands::Validate { path } => run_config_validate(global, ctx, path.as_ref()),
    }
}

/// Display the effective configuration (defaults when no file is found).
fn run_config_show(global: &GlobalOpts, ctx: &LogContext) -> ExitCode {
    const COMMAND: &str = "config show";
    let loaded = match load(global, ctx, COMMAND) {
        Ok(l) => l,
        Err(code) => return code,
    };

    let payload = serde_json::json!({
        "schema_version": CONFIG_SCHEMA_VERSION,
        "source": loaded.location.source,
        "path": loaded.location.path.as_ref().map(|p| p.display().to_string()),
        "snapshot": &loaded.snapshot,
        "config": &loaded.config,
    });
    emit(global, ctx, COMMAND, &payload, || {
        println!("# hc-core config show");
        println!();
        match &loaded.location.path {
            Some(path) => println!("Source: {} ({})", path.display(), loaded.location.source),
            None => println!("Source: **built-in defaults** (no harness.json found)"),
        }
        println!("Effective hash: {}", loaded.snapshot.short_id());
        println!();
        println!("Time servers: {}", loaded.config.timesync.servers.join(", "));
        println!("Chrony config: {}", loaded.config.timesync.chrony_conf.display());
        println!("NTP config: {}", loaded.config.timesync.ntp_conf.display());
        for (name, spec) in loaded.config.retry.entries() {
            println!(
                "Retry {}: {} attempts, {} ms apart",
                name, spec.max_attempts, spec.delay_ms
            );
        }
        println!(
            "Ring buffer target: rx {} tx {}",
            loaded.config.network.ring_buffer_rx, loaded.config.network.ring_buffer_tx
        );
    });
    ExitCode::Clean
}

fn run_config_validate(global: &GlobalOpts, ctx: &LogContext, path: Option<&PathBuf>) -> ExitCode {
    const COMMAND: &str = "config validate";
    let explicit = path.or(global.config.as_ref());
    let loaded = match load_config(explicit.map(PathBuf::as_path)) {
        Ok(l) => l,
        Err(err) => {
            let err: Error = err.into();
            return report_error(global, ctx, COMMAND, &err);
        }
    };

    let payload = serde_json::json!({
        "valid": true,
        "source": loaded.location.source,
        "path": loaded.location.path.as_ref().map(|p| p.display().to_string()),
        "schema_version": loaded.config.schema_version,
        "file_hash": loaded.snapshot.file_hash,
    });
    emit(global, ctx, COMMAND, &payload, || {
        println!("# Configuration Validation");
        println!();
        println!("Status: ✓ Valid");
        match &loaded.location.path {
            Some(path) => println!("File: {}", path.display()),
            None => println!("File: using built-in defaults"),
        }
    });
    ExitCode::Clean
}

fn print_version(global: &GlobalOpts) {
    let version = env!("CARGO_PKG_VERSION");
    match global.format {
        OutputFormat::Json => {
            let response = serde_json::json!({
                "name": "hc-core",
                "version": version,
                "config_schema_version": CONFIG_SCHEMA_VERSION,
            });
            println!("{}", response);
        }
        OutputFormat::Human => println!("hc-core {}", version),
    }
}
