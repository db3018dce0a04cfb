//! C compilation with `gcc`.

use std::path::Path;

use hc_common::{CommandResult, OsFamily, Result};

use crate::exec::{shell_quote, ExecOptions};
use crate::registry::HostSession;
use crate::tool::Tool;

#[derive(Debug, Clone, Copy, Default)]
pub struct Gcc;

impl Gcc {
    pub fn new() -> Self {
        Gcc
    }

    /// Compile `source` into `output`, relative to `cwd` when given.
    pub fn compile(
        &self,
        session: &HostSession,
        source: &Path,
        output: &str,
        cwd: Option<&Path>,
    ) -> Result<CommandResult> {
        let args = format!(
            "{} -o {}",
            shell_quote(&source.to_string_lossy()),
            shell_quote(output)
        );
        let mut opts = ExecOptions::new().with_shell();
        if let Some(dir) = cwd {
            opts = opts.in_dir(dir);
        }
        let result = self.run(session, &args, &opts)?;
        result.assert_exit_code_with(&format!("cannot compile {}", source.display()))?;
        Ok(result)
    }
}

impl Tool for Gcc {
    fn command(&self) -> &str {
        "gcc"
    }

    fn can_install(&self) -> bool {
        true
    }

    fn packages(&self, _family: OsFamily) -> Vec<String> {
        vec!["gcc".to_string()]
    }
}
