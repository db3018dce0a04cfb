//! Command execution on a target host.
//!
//! [`CommandExecutor`] is the only way hostcheck touches a host. Everything
//! above it (tools, the poller, scenarios) is written against the trait, so
//! the same code drives the local machine ([`LocalExecutor`]) or a scripted
//! double in tests ([`mock::ScriptedExecutor`]).
//!
//! A non-zero exit code is not an error at this layer: it comes back inside
//! the [`CommandResult`]. Only a failure to run the command at all is an
//! [`Error::Transport`](hc_common::Error::Transport).

pub mod local;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use local::{LocalExecutor, LocalExecutorBuilder};

use hc_common::{CommandResult, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Options for a single command execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// Run with elevated privilege.
    pub elevate: bool,

    /// Interpret the command line with a shell (pipes, redirects, `||`).
    pub shell: bool,

    /// Working directory on the target host.
    pub cwd: Option<PathBuf>,

    /// Override the executor's default timeout.
    pub timeout: Option<Duration>,
}

impl ExecOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request elevated privilege.
    pub fn elevated(mut self) -> Self {
        self.elevate = true;
        self
    }

    /// Request shell interpretation.
    pub fn with_shell(mut self) -> Self {
        self.shell = true;
        self
    }

    /// Set the working directory.
    pub fn in_dir(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set a per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Runs command lines on one target host.
pub trait CommandExecutor: Send + Sync {
    /// Execute `command` and capture its exit code and output.
    fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandResult>;

    /// Short description of the target, for logs.
    fn describe(&self) -> String {
        "host".to_string()
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for std::sync::Arc<E> {
    fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandResult> {
        (**self).execute(command, opts)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Split a command line into argv words.
///
/// Supports single quotes, double quotes and backslash escapes. Returns
/// `None` when a quote is left open.
pub fn split_command_line(line: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '\'' => break,
                        other => current.push(other),
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next()? {
                        '"' => break,
                        '\\' => match chars.next()? {
                            escaped @ ('"' | '\\' | '$' | '`') => current.push(escaped),
                            other => {
                                current.push('\\');
                                current.push(other);
                            }
                        },
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}

/// Quote a word for safe inclusion in a shell command line.
pub fn shell_quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r"'\''"))
}
