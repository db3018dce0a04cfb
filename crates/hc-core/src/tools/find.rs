//! File search with `find`.

use hc_common::{Error, Result};

use crate::exec::{shell_quote, ExecOptions};
use crate::registry::HostSession;
use crate::tool::Tool;

/// Filters for one `find` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindQuery {
    name: Option<String>,
    path: Option<String>,
    ignore_case: bool,
    elevate: bool,
}

impl FindQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the base name against a glob.
    pub fn name(mut self, pattern: impl Into<String>) -> Self {
        self.name = Some(pattern.into());
        self
    }

    /// Match the whole path against a glob.
    pub fn path(mut self, pattern: impl Into<String>) -> Self {
        self.path = Some(pattern.into());
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevate = true;
        self
    }

    fn args(&self, root: &str) -> String {
        let mut args = vec![shell_quote(root)];
        if let Some(name) = &self.name {
            args.push(if self.ignore_case { "-iname" } else { "-name" }.to_string());
            args.push(shell_quote(name));
        }
        if let Some(path) = &self.path {
            args.push(if self.ignore_case { "-ipath" } else { "-path" }.to_string());
            args.push(shell_quote(path));
        }
        args.join(" ")
    }
}

/// POSIX `find`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Find;

impl Find {
    pub fn new() -> Self {
        Find
    }

    /// Paths under `root` matching `query`.
    ///
    /// `find` exits non-zero when some directories are unreadable; that only
    /// counts as a failure when nothing was found at all.
    pub fn find_files(&self, session: &HostSession, root: &str, query: &FindQuery) -> Result<Vec<String>> {
        let mut opts = ExecOptions::new().with_shell();
        if query.elevate {
            opts = opts.elevated();
        }
        let result = self.run(session, &query.args(root), &opts)?;
        let paths: Vec<String> = result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if paths.is_empty() && !result.success() {
            return Err(Error::CommandFailed {
                message: format!("find under {} failed", root),
                result: Box::new(result),
            });
        }
        Ok(paths)
    }
}

impl Tool for Find {
    fn command(&self) -> &str {
        "find"
    }
}
