//! Scripted command executor for testing.
//!
//! [`ScriptedExecutor`] answers commands from ordered substring rules and
//! records every command it is asked to run, so tests can assert both on
//! the outcome of an operation and on the exact commands it issued.
//!
//! # Example
//!
//! ```ignore
//! use hc_core::exec::mock::{Reply, ScriptedExecutor};
//!
//! let exec = ScriptedExecutor::new()
//!     .on("command -v chronyc", Reply::ok(""))
//!     .on_sequence("chronyc tracking", vec![
//!         Reply::ok("Leap status     : Not synchronised"),
//!         Reply::ok("Leap status     : Normal"),
//!     ]);
//! ```
//!
//! The first rule whose pattern occurs in the command line wins. A rule with
//! several replies hands them out in order and then keeps repeating the last
//! one. Unmatched commands get the default reply (exit 127).

use std::collections::VecDeque;
use std::sync::Mutex;

use hc_common::{CommandResult, Error, Result};

use super::{CommandExecutor, ExecOptions};

/// A canned answer to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The command ran with this exit code and output.
    Output {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
    /// The transport failed.
    Transport(String),
}

impl Reply {
    /// Exit code zero with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Reply::Output {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Non-zero exit code with the given stderr.
    pub fn fail(exit_code: i32, stderr: impl Into<String>) -> Self {
        Reply::Output {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Arbitrary exit code and streams.
    pub fn output(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Reply::Output {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Transport failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Reply::Transport(message.into())
    }

    fn to_result(&self, command: &str) -> Result<CommandResult> {
        match self {
            Reply::Output {
                exit_code,
                stdout,
                stderr,
            } => Ok(CommandResult::new(
                command,
                *exit_code,
                stdout.clone(),
                stderr.clone(),
            )),
            Reply::Transport(message) => Err(Error::Transport(message.clone())),
        }
    }
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    replies: VecDeque<Reply>,
}

impl Rule {
    fn next_reply(&mut self) -> Reply {
        if self.replies.len() > 1 {
            self.replies.pop_front().unwrap_or_else(|| Reply::fail(127, ""))
        } else {
            self.replies
                .front()
                .cloned()
                .unwrap_or_else(|| Reply::fail(127, ""))
        }
    }
}

/// A command the executor was asked to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    pub command: String,
    pub opts: ExecOptions,
}

/// Executor double driven by substring rules.
#[derive(Debug)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    default_reply: Reply,
    recorded: Mutex<Vec<RecordedCommand>>,
}

impl Default for ScriptedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            default_reply: Reply::fail(127, "command not found"),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Reply to commands containing `pattern`.
    pub fn on(self, pattern: impl Into<String>, reply: Reply) -> Self {
        self.on_sequence(pattern, vec![reply])
    }

    /// Reply to successive commands containing `pattern` in order.
    pub fn on_sequence(self, pattern: impl Into<String>, replies: Vec<Reply>) -> Self {
        self.push_rule(pattern, replies);
        self
    }

    /// Reply used when no rule matches.
    pub fn with_default(mut self, reply: Reply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Add a rule after construction; it is checked after existing rules.
    pub fn push_rule(&self, pattern: impl Into<String>, replies: Vec<Reply>) {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                pattern: pattern.into(),
                replies: replies.into(),
            });
        }
    }

    /// Every command executed so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.recorded()
            .into_iter()
            .map(|r| r.command)
            .collect()
    }

    /// Every command executed so far with its options.
    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of executed commands containing `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    /// Whether any executed command contains `pattern`.
    pub fn executed(&self, pattern: &str) -> bool {
        self.count_matching(pattern) > 0
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, command: &str, opts: &ExecOptions) -> Result<CommandResult> {
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(RecordedCommand {
                command: command.to_string(),
                opts: opts.clone(),
            });
        }

        let reply = self
            .rules
            .lock()
            .ok()
            .and_then(|mut rules| {
                rules
                    .iter_mut()
                    .find(|rule| command.contains(&rule.pattern))
                    .map(Rule::next_reply)
            })
            .unwrap_or_else(|| self.default_reply.clone());

        reply.to_result(command)
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_matching_rule_wins() {
        let exec = ScriptedExecutor::new()
            .on("chronyc tracking", Reply::ok("tracking"))
            .on("chronyc", Reply::ok("generic"));

        let r = exec.execute("chronyc tracking", &ExecOptions::new()).unwrap();
        assert_eq!(r.stdout, "tracking");
        let r = exec.execute("chronyc sources", &ExecOptions::new()).unwrap();
        assert_eq!(r.stdout, "generic");
    }

    #[test]
    fn test_sequence_repeats_last() {
        let exec = ScriptedExecutor::new().on_sequence(
            "ntpstat",
            vec![Reply::fail(1, "unsynchronised"), Reply::ok("synchronised")],
        );
        let opts = ExecOptions::new();
        assert_eq!(exec.execute("ntpstat", &opts).unwrap().exit_code, 1);
        assert_eq!(exec.execute("ntpstat", &opts).unwrap().exit_code, 0);
        assert_eq!(exec.execute("ntpstat", &opts).unwrap().exit_code, 0);
    }

    #[test]
    fn test_unmatched_gets_default() {
        let exec = ScriptedExecutor::new();
        let r = exec.execute("command -v gcc", &ExecOptions::new()).unwrap();
        assert_eq!(r.exit_code, 127);
    }

    #[test]
    fn test_transport_reply() {
        let exec = ScriptedExecutor::new().on("ls", Reply::transport("connection reset"));
        let err = exec.execute("ls /", &ExecOptions::new()).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[test]
    fn test_records_commands_and_options() {
        let exec = ScriptedExecutor::new().with_default(Reply::ok(""));
        exec.execute("service chrony restart", &ExecOptions::new().elevated().with_shell())
            .unwrap();
        exec.execute("chronyc sources", &ExecOptions::new()).unwrap();

        assert_eq!(
            exec.commands(),
            vec!["service chrony restart", "chronyc sources"]
        );
        assert!(exec.recorded()[0].opts.elevate);
        assert_eq!(exec.count_matching("chrony"), 2);
        assert!(!exec.executed("ntpq"));
    }
}
