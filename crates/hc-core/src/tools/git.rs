//! Source checkout with `git`.

use std::path::{Path, PathBuf};

use hc_common::{OsFamily, Result};

use crate::exec::{shell_quote, ExecOptions};
use crate::registry::HostSession;
use crate::tool::Tool;

#[derive(Debug, Clone, Copy, Default)]
pub struct Git;

impl Git {
    pub fn new() -> Self {
        Git
    }

    /// Clone `repo` into `parent`, returning the checkout directory.
    ///
    /// An existing checkout is reused.
    pub fn clone_repo(&self, session: &HostSession, repo: &str, parent: &Path) -> Result<PathBuf> {
        let checkout = parent.join(repo_dir_name(repo));
        let existing = session.executor().execute(
            &format!("test -d {}", shell_quote(&checkout.join(".git").to_string_lossy())),
            &ExecOptions::new().with_shell(),
        )?;
        if existing.success() {
            return Ok(checkout);
        }

        let args = format!(
            "clone -q -- {} {}",
            shell_quote(repo),
            shell_quote(&checkout.to_string_lossy())
        );
        self.run(session, &args, &ExecOptions::new().with_shell())?
            .assert_exit_code_with(&format!("cannot clone {}", repo))?;
        Ok(checkout)
    }
}

/// Directory name `git clone` would pick for `repo`.
pub fn repo_dir_name(repo: &str) -> &str {
    let trimmed = repo.trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last)
}

impl Tool for Git {
    fn command(&self) -> &str {
        "git"
    }

    fn can_install(&self) -> bool {
        true
    }

    fn packages(&self, _family: OsFamily) -> Vec<String> {
        vec!["git".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::mock::{Reply, ScriptedExecutor};
    use std::sync::Arc;

    #[test]
    fn test_repo_dir_name() {
        assert_eq!(repo_dir_name("https://github.com/darkhelmet/ntpstat"), "ntpstat");
        assert_eq!(repo_dir_name("https://example.org/x/tool.git/"), "tool");
        assert_eq!(repo_dir_name("git@github.com:org/thing.git"), "thing");
    }

    #[test]
    fn test_clone_into_parent() {
        let exec = Arc::new(
            ScriptedExecutor::new()
                .on("test -d", Reply::fail(1, ""))
                .on("git clone", Reply::ok("")),
        );
        let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();
        let dir = Git::new()
            .clone_repo(&session, "https://github.com/darkhelmet/ntpstat", Path::new("/var/tmp/t"))
            .unwrap();
        assert_eq!(dir, PathBuf::from("/var/tmp/t/ntpstat"));
        assert!(exec.executed("git clone -q -- https://github.com/darkhelmet/ntpstat /var/tmp/t/ntpstat"));
    }

    #[test]
    fn test_existing_checkout_is_reused() {
        let exec = Arc::new(ScriptedExecutor::new().on("test -d", Reply::ok("")));
        let session = HostSession::scripted(OsFamily::Other, exec.clone()).build();
        Git::new()
            .clone_repo(&session, "https://github.com/darkhelmet/ntpstat", Path::new("/opt"))
            .unwrap();
        assert!(!exec.executed("git clone"));
    }
}
