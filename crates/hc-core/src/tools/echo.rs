//! Appending lines to files with `echo`.

use std::path::Path;

use hc_common::{CommandResult, Result};

use crate::exec::{shell_quote, ExecOptions};
use crate::registry::HostSession;
use crate::tool::Tool;

/// Shell `echo`, used to append configuration lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Echo;

impl Echo {
    pub fn new() -> Self {
        Echo
    }

    /// Append `line` to `path` with elevated privilege.
    pub fn append_line(&self, session: &HostSession, path: &Path, line: &str) -> Result<CommandResult> {
        let args = format!(
            "{} >> {}",
            shell_quote(line),
            shell_quote(&path.to_string_lossy())
        );
        let result = self.run(session, &args, &ExecOptions::new().elevated().with_shell())?;
        result.assert_exit_code_with(&format!("cannot append to {}", path.display()))?;
        Ok(result)
    }

    /// Append `line` unless `path` already contains it verbatim.
    ///
    /// Returns whether the line was written.
    pub fn append_line_once(&self, session: &HostSession, path: &Path, line: &str) -> Result<bool> {
        let probe = format!(
            "grep -qxF -- {} {}",
            shell_quote(line),
            shell_quote(&path.to_string_lossy())
        );
        let found = session
            .executor()
            .execute(&probe, &ExecOptions::new().elevated().with_shell())?;
        if found.success() {
            return Ok(false);
        }
        self.append_line(session, path, line)?;
        Ok(true)
    }
}

impl Tool for Echo {
    fn command(&self) -> &str {
        "echo"
    }

    // Shell builtin.
    fn presence_check(&self, _session: &HostSession) -> Result<bool> {
        Ok(true)
    }
}
