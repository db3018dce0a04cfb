//! Local command executor with timeout and output caps.
//!
//! Runs commands on the machine hostcheck itself runs on:
//!
//! - `sh -c` interpretation when shell semantics are requested, argv split otherwise
//! - Elevation through a configurable prefix (`sudo -n` by default), skipped when already root
//! - Per-command timeout with SIGTERM → SIGKILL escalation
//! - Output size caps to prevent memory exhaustion
//!
//! # Example
//!
//! ```ignore
//! use hc_core::exec::{CommandExecutor, ExecOptions, LocalExecutor};
//!
//! let executor = LocalExecutor::builder().build();
//! let result = executor.execute("chronyc tracking", &ExecOptions::new())?;
//! println!("{}", result.stdout);
//! ```

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use hc_common::{CommandResult, Error, Result};
use hc_config::ExecutionConfig;
use tracing::{debug, error, instrument, trace, warn};

use super::{split_command_line, CommandExecutor, ExecOptions};
use crate::logging::event_names;

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const SIGTERM_GRACE_MS: u64 = 500;

/// Read chunk size.
const CHUNK_SIZE: usize = 8192;

/// Configuration for the local executor.
#[derive(Debug, Clone)]
pub struct LocalExecutorConfig {
    /// Timeout applied when a call does not set one (None = wait forever).
    pub default_timeout: Option<Duration>,

    /// Maximum bytes captured per stream.
    pub max_output_bytes: usize,

    /// Words prepended when elevation is requested.
    pub elevation_prefix: Vec<String>,

    /// Shell used for shell-interpreted commands.
    pub shell: String,
}

impl Default for LocalExecutorConfig {
    fn default() -> Self {
        Self::from(&ExecutionConfig::default())
    }
}

impl From<&ExecutionConfig> for LocalExecutorConfig {
    fn from(exec: &ExecutionConfig) -> Self {
        Self {
            default_timeout: exec.default_timeout(),
            max_output_bytes: exec.max_output_bytes,
            elevation_prefix: split_command_line(&exec.elevation_prefix).unwrap_or_default(),
            shell: exec.shell.clone(),
        }
    }
}

/// Executes commands on the local host.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    config: LocalExecutorConfig,
}

impl LocalExecutor {
    /// Create an executor with the given configuration.
    pub fn new(config: LocalExecutorConfig) -> Self {
        Self { config }
    }

    /// Start building an executor from defaults.
    pub fn builder() -> LocalExecutorBuilder {
        LocalExecutorBuilder::default()
    }

    pub fn config(&self) -> &LocalExecutorConfig {
        &self.config
    }

    /// Build the argv for a command line.
    fn build_argv(&self, command: &str, opts: &ExecOptions) -> Result<Vec<String>> {
        let mut argv = if opts.shell {
            vec![self.config.shell.clone(), "-c".to_string(), command.to_string()]
        } else {
            split_command_line(command).ok_or_else(|| {
                Error::Transport(format!("unterminated quote in command: {}", command))
            })?
        };

        if argv.is_empty() {
            return Err(Error::Transport("empty command".to_string()));
        }

        if opts.elevate && !self.config.elevation_prefix.is_empty() && !is_root() {
            let mut elevated = self.config.elevation_prefix.clone();
            elevated.append(&mut argv);
            argv = elevated;
        }

        Ok(argv)
    }

    /// Execute a child process with timeout and output capture.
    #[allow(clippy::type_complexity)]
    fn wait_with_timeout(
        &self,
        child: &mut Child,
        timeout: Option<Duration>,
    ) -> Result<(Vec<u8>, Vec<u8>, Option<i32>, bool)> {
        let max_output = self.config.max_output_bytes;
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut stdout_buf = Vec::with_capacity(max_output.min(65536));
        let mut stderr_buf = Vec::with_capacity(max_output.min(65536));
        let mut truncated = false;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut chunk = vec![0u8; CHUNK_SIZE];

        loop {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(target: event_names::EXEC_TIMEOUT, "command timed out, sending SIGTERM");
                kill_with_grace(child);
                let exit_code = child.wait().ok().and_then(|s| s.code());
                return Ok((stdout_buf, stderr_buf, exit_code, true));
            }

            let mut did_read = false;

            if let Some(ref mut out) = stdout {
                if let Ok(n) = try_read_nonblocking(out, &mut chunk) {
                    if n > 0 {
                        did_read = true;
                        append_capped(&mut stdout_buf, &chunk[..n], max_output, &mut truncated);
                    }
                }
            }

            if let Some(ref mut err) = stderr {
                if let Ok(n) = try_read_nonblocking(err, &mut chunk) {
                    if n > 0 {
                        did_read = true;
                        append_capped(&mut stderr_buf, &chunk[..n], max_output, &mut truncated);
                    }
                }
            }

            match child.try_wait() {
                Ok(Some(status)) => {
                    if let Some(ref mut out) = stdout {
                        drain_to_limit(out, &mut stdout_buf, max_output, &mut truncated);
                    }
                    if let Some(ref mut err) = stderr {
                        drain_to_limit(err, &mut stderr_buf, max_output, &mut truncated);
                    }
                    if truncated {
                        debug!(limit = max_output, "command output truncated");
                    }
                    let exit_code = status.code();
                    trace!(exit_code = ?exit_code, "process exited");
                    return Ok((stdout_buf, stderr_buf, exit_code, false));
                }
                Ok(None) => {
                    if !did_read {
                        thread::sleep(Duration::from_millis(10));
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to wait for child");
                    return Err(Error::Transport(format!("failed to wait for command: {}", e)));
                }
            }
        }
    }
}

impl CommandExecutor for LocalExecutor {
    #[instrument(skip(self, opts), fields(elevate = opts.elevate, shell = opts.shell))]
    fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandResult> {
        let argv = self.build_argv(command, opts)?;
        let timeout = opts.timeout.or(self.config.default_timeout);

        debug!(
            target: event_names::EXEC_COMMAND,
            argv = ?argv,
            cwd = ?opts.cwd,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "running command"
        );

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]);
        if let Some(ref cwd) = opts.cwd {
            cmd.current_dir(cwd);
        }
        // Parsers expect untranslated tool output
        cmd.env("LC_ALL", "C").env("LANG", "C");

        let start = Instant::now();
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                error!(program = %argv[0], error = %e, "failed to spawn");
                Error::Transport(format!("failed to spawn {}: {}", argv[0], e))
            })?;

        let (stdout, stderr, exit_code, timed_out) = self.wait_with_timeout(&mut child, timeout)?;
        let duration = start.elapsed();

        let result = CommandResult::new(
            command,
            exit_code.unwrap_or(-1),
            String::from_utf8_lossy(&stdout),
            String::from_utf8_lossy(&stderr),
        )
        .with_duration(duration)
        .with_timed_out(timed_out);

        debug!(
            target: event_names::EXEC_COMMAND,
            exit_code = result.exit_code,
            duration_ms = duration.as_millis() as u64,
            timed_out,
            "command finished"
        );

        Ok(result)
    }

    fn describe(&self) -> String {
        "localhost".to_string()
    }
}

fn append_capped(buf: &mut Vec<u8>, data: &[u8], max: usize, truncated: &mut bool) {
    let space = max.saturating_sub(buf.len());
    if space > 0 {
        let to_copy = data.len().min(space);
        buf.extend_from_slice(&data[..to_copy]);
        if data.len() > space {
            *truncated = true;
        }
    } else {
        *truncated = true;
    }
}

/// Drain what is immediately available from a stream up to the limit.
///
/// Non-blocking so a grandchild still holding the pipe open cannot hang us.
fn drain_to_limit<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) {
    let mut chunk = vec![0u8; CHUNK_SIZE];
    while !*truncated {
        match try_read_nonblocking(stream, &mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => append_capped(buf, &chunk[..n], max, truncated),
        }
    }
}

/// Kill a process with SIGTERM, then SIGKILL after grace period.
fn kill_with_grace(child: &mut Child) {
    let pid = child.id() as i32;

    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }
    debug!(pid, "sent SIGTERM");

    thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));

    match child.try_wait() {
        Ok(Some(_)) => {
            trace!(pid, "process exited after SIGTERM");
        }
        Ok(None) => {
            warn!(pid, "process did not exit after SIGTERM, sending SIGKILL");
            unsafe {
                libc::kill(pid, libc::SIGKILL);
            }
            let _ = child.wait();
        }
        Err(e) => {
            error!(pid, error = %e, "failed to check process status");
        }
    }
}

/// Try to read from a stream without blocking.
///
/// Sets O_NONBLOCK for the duration of one read, then restores the flags.
/// Returns Ok(0) if no data is available (EAGAIN/EWOULDBLOCK).
fn try_read_nonblocking<R: Read + std::os::unix::io::AsRawFd>(
    stream: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let fd = stream.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let was_nonblocking = (flags & libc::O_NONBLOCK) != 0;
    if !was_nonblocking {
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    let result = stream.read(buf);

    if !was_nonblocking {
        unsafe {
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }

    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Builder for a local executor.
#[derive(Debug, Default)]
pub struct LocalExecutorBuilder {
    config: LocalExecutorConfig,
}

impl LocalExecutorBuilder {
    /// Start from the execution section of a harness config.
    pub fn from_config(exec: &ExecutionConfig) -> Self {
        Self {
            config: LocalExecutorConfig::from(exec),
        }
    }

    /// Set the default timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Disable the default timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.default_timeout = None;
        self
    }

    /// Set the maximum output size per stream.
    pub fn max_output(mut self, max_bytes: usize) -> Self {
        self.config.max_output_bytes = max_bytes;
        self
    }

    /// Set the elevation prefix (empty disables elevation).
    pub fn elevation_prefix<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.elevation_prefix = words.into_iter().map(Into::into).collect();
        self
    }

    /// Set the shell used for shell-interpreted commands.
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.config.shell = shell.into();
        self
    }

    pub fn build(self) -> LocalExecutor {
        LocalExecutor::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_executor() -> LocalExecutor {
        LocalExecutor::builder()
            .timeout(Duration::from_secs(10))
            .elevation_prefix(["env", "HC_ELEVATED=1"])
            .build()
    }

    #[test]
    fn test_argv_split_without_shell() {
        let exec = test_executor();
        let argv = exec
            .build_argv("ethtool -g 'eth 0'", &ExecOptions::new())
            .unwrap();
        assert_eq!(argv, vec!["ethtool", "-g", "eth 0"]);
    }

    #[test]
    fn test_argv_with_shell() {
        let exec = test_executor();
        let argv = exec
            .build_argv("echo a | tr a b", &ExecOptions::new().with_shell())
            .unwrap();
        assert_eq!(argv, vec!["sh", "-c", "echo a | tr a b"]);
    }

    #[test]
    fn test_argv_elevation_prefix() {
        let exec = test_executor();
        let argv = exec
            .build_argv("service chrony restart", &ExecOptions::new().elevated())
            .unwrap();
        if is_root() {
            assert_eq!(argv[0], "service");
        } else {
            assert_eq!(&argv[..2], &["env", "HC_ELEVATED=1"]);
            assert_eq!(&argv[2..], &["service", "chrony", "restart"]);
        }
    }

    #[test]
    fn test_empty_command_is_transport_error() {
        let exec = test_executor();
        let err = exec.execute("   ", &ExecOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_run_echo() {
        let exec = test_executor();
        let result = exec.execute("echo hello world", &ExecOptions::new()).unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello world");
        assert!(!result.timed_out);
    }

    #[test]
    fn test_shell_stderr_and_exit_code() {
        let exec = test_executor();
        let result = exec
            .execute("echo oops >&2; exit 42", &ExecOptions::new().with_shell())
            .unwrap();
        assert_eq!(result.exit_code, 42);
        assert_eq!(result.stderr.trim(), "oops");
        assert!(result.assert_exit_code().is_err());
    }

    #[test]
    fn test_cwd_is_honored() {
        let exec = test_executor();
        let result = exec
            .execute("pwd", &ExecOptions::new().in_dir("/"))
            .unwrap();
        assert_eq!(result.stdout_trimmed(), "/");
    }

    #[test]
    fn test_missing_program_is_transport_error() {
        let exec = test_executor();
        let err = exec
            .execute("/nonexistent/hostcheck-binary", &ExecOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_timeout() {
        let exec = test_executor();
        let result = exec
            .execute(
                "sleep 10",
                &ExecOptions::new().with_timeout(Duration::from_millis(100)),
            )
            .unwrap();
        assert!(result.timed_out);
        assert!(!result.success());
        assert!(result.duration < Duration::from_secs(3));
    }

    #[test]
    fn test_output_truncation() {
        let exec = LocalExecutor::builder().max_output(100).build();
        let result = exec
            .execute("yes | head -n 1000", &ExecOptions::new().with_shell())
            .unwrap();
        assert!(result.stdout.len() <= 100);
    }

    #[test]
    fn test_config_from_execution_section() {
        let config = LocalExecutorConfig::from(&ExecutionConfig::default());
        assert_eq!(config.elevation_prefix, vec!["sudo", "-n"]);
        assert_eq!(config.shell, "sh");
        assert_eq!(config.default_timeout, Some(Duration::from_secs(600)));
    }
}
