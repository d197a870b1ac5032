//! Git plumbing for the delegate branch.
//!
//! Every call goes through [`GitExec`], one `git` invocation at a time, so
//! the branch and commit logic can be exercised with scripted exit codes.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{DelegateError, Result};
use crate::reporter::Reporter;

pub const BOT_NAME: &str = "github-actions[bot]";
pub const BOT_EMAIL: &str = "github-actions[bot]@users.noreply.github.com";

/// Exit status and captured output of one `git` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs a single `git` command with the given arguments.
pub trait GitExec {
    fn exec(&self, args: &[&str]) -> std::io::Result<GitOutput>;
}

// ---------------------------------------------------------------------------
// SystemGit
// ---------------------------------------------------------------------------

/// The real `git` binary, run in a fixed working directory.
#[derive(Debug, Clone)]
pub struct SystemGit {
    workdir: PathBuf,
}

impl SystemGit {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }
}

impl GitExec for SystemGit {
    fn exec(&self, args: &[&str]) -> std::io::Result<GitOutput> {
        debug!(?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()?;
        Ok(GitOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// GitOps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    Committed,
    NoChanges,
    /// The failure was logged and reported as a warning.
    Failed,
}

/// Branch, commit and push operations on top of a [`GitExec`].
#[derive(Debug, Clone)]
pub struct GitOps<E> {
    exec: E,
}

impl<E: GitExec> GitOps<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    pub fn exec(&self) -> &E {
        &self.exec
    }

    /// Create and switch to `name`, or switch to it if it already exists.
    ///
    /// The fallback checkout's exit status is ignored.
    #[instrument(skip_all, fields(branch = %name))]
    pub fn create_branch(&self, name: &str) {
        match self.exec.exec(&["checkout", "-b", name]) {
            Ok(out) if out.success() => {
                info!("created branch");
                return;
            }
            Ok(out) => debug!(stderr = %out.stderr, "checkout -b failed, trying existing branch"),
            Err(e) => debug!(error = %e, "checkout -b failed, trying existing branch"),
        }
        match self.exec.exec(&["checkout", name]) {
            Ok(out) if !out.success() => warn!(stderr = %out.stderr, "fallback checkout failed"),
            Ok(_) => info!("checked out existing branch"),
            Err(e) => warn!(error = %e, "fallback checkout failed"),
        }
    }

    /// Stage everything and, if anything changed, commit and push `branch`.
    ///
    /// Failures never propagate: they are logged, reported as a warning and
    /// returned as [`CommitOutcome::Failed`].
    #[instrument(skip_all, fields(branch = %branch))]
    pub fn commit_and_push(
        &self,
        message: &str,
        branch: &str,
        reporter: &dyn Reporter,
    ) -> CommitOutcome {
        match self.try_commit_and_push(message, branch) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "commit and push failed");
                reporter.warning(&format!("Failed to commit and push changes: {e}"));
                CommitOutcome::Failed
            }
        }
    }

    fn try_commit_and_push(&self, message: &str, branch: &str) -> Result<CommitOutcome> {
        self.run_checked(&["config", "user.name", BOT_NAME])?;
        self.run_checked(&["config", "user.email", BOT_EMAIL])?;
        self.run_checked(&["add", "-A"])?;

        if !self.has_staged_changes()? {
            info!("no changes to commit");
            return Ok(CommitOutcome::NoChanges);
        }

        self.run_checked(&["commit", "-m", message])?;
        self.run_checked(&["push", "origin", branch])?;
        info!(message, "committed and pushed changes");
        Ok(CommitOutcome::Committed)
    }

    /// `git diff-index --quiet HEAD --` exits 0 when the tree matches HEAD
    /// and 1 when it differs, so a non-zero code here means "dirty".
    fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff-index", "--quiet", "HEAD", "--"])?;
        match out.code {
            Some(0) => Ok(false),
            Some(_) => Ok(true),
            None => Err(DelegateError::Git {
                command: "diff-index".into(),
                message: "terminated by signal".into(),
            }),
        }
    }

    fn run(&self, args: &[&str]) -> Result<GitOutput> {
        self.exec.exec(args).map_err(|e| DelegateError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            message: e.to_string(),
        })
    }

    fn run_checked(&self, args: &[&str]) -> Result<GitOutput> {
        let out = self.run(args)?;
        if out.success() {
            return Ok(out);
        }
        let message = if out.stderr.is_empty() {
            match out.code {
                Some(code) => format!("exited with code {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            out.stderr.clone()
        };
        Err(DelegateError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            message,
        })
    }
}

// ---------------------------------------------------------------------------
// ScriptedGit (tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) use scripted::ScriptedGit;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;

    #[test]
    fn dirty_tree_commits_and_pushes() {
        // diff-index exit 1 means the tree differs from HEAD.
        let git = GitOps::new(ScriptedGit::with_codes(&[("diff-index", 1)]));
        let reporter = RecordingReporter::default();

        let outcome = git.commit_and_push("feat: x", "copilot/delegate-1", &reporter);

        assert_eq!(outcome, CommitOutcome::Committed);
        let calls = git.exec().calls();
        assert_eq!(calls[0], ["config", "user.name", BOT_NAME]);
        assert_eq!(calls[1], ["config", "user.email", BOT_EMAIL]);
        assert_eq!(calls[2], ["add", "-A"]);
        assert_eq!(calls[3], ["diff-index", "--quiet", "HEAD", "--"]);
        assert_eq!(calls[4], ["commit", "-m", "feat: x"]);
        assert_eq!(calls[5], ["push", "origin", "copilot/delegate-1"]);
        assert!(reporter.warnings().is_empty());
    }

    #[test]
    fn clean_tree_skips_commit_and_push() {
        // diff-index exit 0 means nothing changed.
        let git = GitOps::new(ScriptedGit::with_codes(&[("diff-index", 0)]));
        let reporter = RecordingReporter::default();

        let outcome = git.commit_and_push("feat: x", "b", &reporter);

        assert_eq!(outcome, CommitOutcome::NoChanges);
        assert!(!git.exec().ran("commit"));
        assert!(!git.exec().ran("push"));
    }

    #[test]
    fn push_failure_is_a_warning_not_an_error() {
        let git = GitOps::new(ScriptedGit::with_codes(&[("diff-index", 1), ("push", 128)]));
        let reporter = RecordingReporter::default();

        let outcome = git.commit_and_push("feat: x", "b", &reporter);

        assert_eq!(outcome, CommitOutcome::Failed);
        let warnings = reporter.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("push failed"), "{}", warnings[0]);
    }

    #[test]
    fn add_failure_stops_before_diff_check() {
        let git = GitOps::new(ScriptedGit::with_codes(&[("add", 1)]));
        let reporter = RecordingReporter::default();

        assert_eq!(
            git.commit_and_push("m", "b", &reporter),
            CommitOutcome::Failed
        );
        assert!(!git.exec().ran("diff-index"));
    }

    #[test]
    fn create_branch_uses_checkout_b() {
        let git = GitOps::new(ScriptedGit::default());
        git.create_branch("copilot/delegate-1");
        assert_eq!(
            git.exec().calls(),
            [["checkout", "-b", "copilot/delegate-1"]]
        );
    }

    #[test]
    fn create_branch_falls_back_to_plain_checkout() {
        let git = GitOps::new(ScriptedGit::with_codes(&[("checkout -b", 128)]));
        git.create_branch("copilot/delegate-1");
        let calls = git.exec().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], ["checkout", "copilot/delegate-1"]);
    }

    #[test]
    fn create_branch_ignores_fallback_failure() {
        let git = GitOps::new(ScriptedGit::with_codes(&[("checkout -b", 128), ("checkout", 1)]));
        // Must not panic or error.
        git.create_branch("b");
        assert_eq!(git.exec().calls().len(), 2);
    }

    #[test]
    fn system_git_reports_exit_code() {
        let dir = tempfile::TempDir::new().unwrap();
        let git = SystemGit::new(dir.path());
        match git.exec(&["no-such-subcommand"]) {
            Ok(out) => assert!(!out.success()),
            // git not installed on this machine
            Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
        }
    }
}
