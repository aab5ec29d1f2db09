//! Shell-based git/gh wrapper.
//!
//! Every command runs through `tokio::process::Command` under a
//! five-second deadline and maps failures to typed [`GitError`]s.
//! The driver never panics; callers decide which failures are fatal.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use super::errors::GitError;

/// Per-command deadline.
const COMMAND_DEADLINE: Duration = Duration::from_secs(5);

/// Maximum slug length used in branch names.
const SLUG_MAX_LEN: usize = 50;

/// Result of preparing the git workspace for a plan.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub branch: String,
    pub default_branch: String,
    pub was_stashed: bool,
    pub previous_branch: String,
}

/// Outcome of a best-effort commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    NothingToCommit,
}

/// A created pull request.
#[derive(Debug, Clone)]
pub struct PrInfo {
    pub url: String,
    pub title: String,
}

/// Shell-based git/gh wrapper rooted at one working tree.
pub struct GitDriver {
    repo_root: PathBuf,
    remote: String,
}

impl GitDriver {
    pub fn new(repo_root: impl AsRef<Path>, remote: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            remote: remote.into(),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<std::process::Output, GitError> {
        let command_line = format!("{program} {}", args.join(" "));
        debug!(command = %command_line, "running");
        let future = Command::new(program)
            .current_dir(&self.repo_root)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        timeout(COMMAND_DEADLINE, future)
            .await
            .map_err(|_| GitError::Timeout {
                command: command_line,
            })?
            .map_err(GitError::Io)
    }

    /// Run a git command, failing on a non-zero exit status.
    async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        let output = self.run("git", args).await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            })
        }
    }

    /// Run a git command, reporting only whether it succeeded.
    async fn git_ok(&self, args: &[&str]) -> Result<bool, GitError> {
        Ok(self.run("git", args).await?.status.success())
    }

    // ---- Introspection ----

    pub async fn is_git_installed(&self) -> bool {
        self.run("git", &["--version"])
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub async fn is_gh_installed(&self) -> bool {
        self.run("gh", &["--version"])
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub async fn is_repo(&self) -> Result<bool, GitError> {
        self.git_ok(&["rev-parse", "--git-dir"]).await
    }

    pub async fn current_branch(&self) -> Result<String, GitError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Default branch: the `origin/HEAD` symbolic ref when available,
    /// else `main`, else `master`.
    pub async fn default_branch(&self) -> Result<String, GitError> {
        if let Ok(symref) = self
            .git(&["symbolic-ref", "--short", &format!("refs/remotes/{}/HEAD", self.remote)])
            .await
        {
            if let Some(branch) = symref.strip_prefix(&format!("{}/", self.remote)) {
                return Ok(branch.to_string());
            }
        }

        for candidate in ["main", "master"] {
            if self
                .git_ok(&["show-ref", "--verify", "--quiet", &format!("refs/heads/{candidate}")])
                .await?
            {
                return Ok(candidate.to_string());
            }
        }

        Err(GitError::NoDefaultBranch)
    }

    pub async fn is_dirty(&self) -> Result<bool, GitError> {
        Ok(!self.status_porcelain().await?.is_empty())
    }

    pub async fn status_porcelain(&self) -> Result<String, GitError> {
        self.git(&["status", "--porcelain"]).await
    }

    /// Files touched by the most recent commit.
    pub async fn diff_name_only_last_commit(&self) -> Result<String, GitError> {
        self.git(&["diff", "--name-only", "HEAD~1", "HEAD"]).await
    }

    /// Whether any local branch carries commits missing from every remote.
    pub async fn has_unpushed_commits(&self) -> Result<bool, GitError> {
        if !self.has_remote(&self.remote).await? {
            return Ok(false);
        }
        let out = self
            .git(&["log", "--branches", "--not", "--remotes", "--oneline"])
            .await?;
        Ok(!out.is_empty())
    }

    pub async fn has_remote(&self, name: &str) -> Result<bool, GitError> {
        let remotes = self.git(&["remote"]).await?;
        Ok(remotes.lines().any(|r| r.trim() == name))
    }

    // ---- Actions ----

    pub async fn stash(&self, message: &str) -> Result<(), GitError> {
        self.git(&["stash", "push", "-m", message]).await?;
        Ok(())
    }

    pub async fn stash_pop(&self) -> Result<(), GitError> {
        self.git(&["stash", "pop"]).await?;
        Ok(())
    }

    pub async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        self.git(&["checkout", branch]).await?;
        Ok(())
    }

    pub async fn create_branch(&self, name: &str) -> Result<(), GitError> {
        match self.git(&["checkout", "-b", name]).await {
            Ok(_) => Ok(()),
            Err(GitError::CommandFailed { stderr, .. }) if stderr.contains("already exists") => {
                Err(GitError::BranchExists(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn pull(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.git(&["pull", remote, branch]).await?;
        Ok(())
    }

    pub async fn add_all(&self) -> Result<(), GitError> {
        self.git(&["add", "-A"]).await?;
        Ok(())
    }

    pub async fn commit(&self, message: &str) -> Result<CommitOutcome, GitError> {
        let output = self.run("git", &["commit", "-m", message]).await?;
        if output.status.success() {
            return Ok(CommitOutcome::Committed);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stdout.contains("nothing to commit") || stderr.contains("nothing to commit") {
            return Ok(CommitOutcome::NothingToCommit);
        }
        Err(GitError::CommandFailed {
            command: "git commit".to_string(),
            stderr: stderr.trim_end().to_string(),
        })
    }

    pub async fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.git(&["push", remote, branch]).await?;
        Ok(())
    }

    pub async fn push_with_upstream(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.git(&["push", "-u", remote, branch]).await?;
        Ok(())
    }

    pub async fn create_pr(
        &self,
        title: &str,
        body: &str,
        base: &str,
        head: &str,
    ) -> Result<PrInfo, GitError> {
        if !self.is_gh_installed().await {
            return Err(GitError::GhNotInstalled);
        }
        let output = self
            .run(
                "gh",
                &[
                    "pr", "create", "--title", title, "--body", body, "--base", base, "--head",
                    head,
                ],
            )
            .await?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: "gh pr create".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }
        Ok(PrInfo {
            url: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            title: title.to_string(),
        })
    }

    // ---- Orchestration ----

    /// Prepare the working tree for a plan: stash local changes, enforce
    /// the unpushed-commit precondition, move to the default branch, and
    /// create (or reuse) the plan's feature branch.
    ///
    /// Each failing step restores the stash before returning, so the
    /// caller observes the tree as it was.
    #[instrument(skip(self, plan_title))]
    pub async fn start_plan_workflow(
        &self,
        plan_id: &str,
        plan_title: &str,
        skip_unpushed_check: bool,
    ) -> Result<WorkflowResult, GitError> {
        if !self.is_git_installed().await {
            return Err(GitError::GitNotInstalled);
        }
        if !self.is_repo().await? {
            return Err(GitError::NotARepository);
        }

        let previous_branch = self.current_branch().await?;
        let branch = plan_branch_name(plan_id, plan_title);

        // Refuse to silently stash in-flight work belonging to another plan.
        if previous_branch.starts_with("feat/plan-")
            && previous_branch != branch
            && self.is_dirty().await?
        {
            return Err(GitError::UnrelatedBranch {
                branch: previous_branch,
            });
        }

        let mut was_stashed = false;
        if self.is_dirty().await? {
            self.stash(&format!("Auto-stash for plan {plan_id}")).await?;
            was_stashed = true;
        }

        if !skip_unpushed_check && self.has_unpushed_commits().await? {
            self.restore_stash(was_stashed).await;
            return Err(GitError::UnpushedCommits {
                branch: previous_branch,
            });
        }

        let default_branch = match self.default_branch().await {
            Ok(b) => b,
            Err(e) => {
                self.restore_stash(was_stashed).await;
                return Err(e);
            }
        };

        if default_branch != previous_branch {
            if let Err(e) = self.checkout(&default_branch).await {
                self.restore_stash(was_stashed).await;
                return Err(e);
            }
        }

        // Best effort: a failed pull leaves us on local state, which is fine.
        if self.has_remote(&self.remote).await? {
            if let Err(e) = self.pull(&self.remote, &default_branch).await {
                warn!(error = %e, "pull failed, continuing with local state");
            }
        }

        match self.create_branch(&branch).await {
            Ok(()) => {}
            Err(GitError::BranchExists(_)) => {
                info!(branch = %branch, "plan branch already exists, reusing");
                if let Err(e) = self.checkout(&branch).await {
                    self.restore_stash(was_stashed).await;
                    return Err(e);
                }
            }
            Err(e) => {
                self.restore_stash(was_stashed).await;
                return Err(e);
            }
        }

        Ok(WorkflowResult {
            branch,
            default_branch,
            was_stashed,
            previous_branch,
        })
    }

    async fn restore_stash(&self, was_stashed: bool) {
        if was_stashed {
            if let Err(e) = self.stash_pop().await {
                warn!(error = %e, "failed to restore stash");
            }
        }
    }

    /// Stage everything and commit with a conventional message.
    #[instrument(skip(self))]
    pub async fn commit_task_progress(
        &self,
        task_title: &str,
        task_type: &str,
    ) -> Result<CommitOutcome, GitError> {
        self.add_all().await?;
        let commit_type = infer_commit_type(task_type, task_title);
        self.commit(&format!("{commit_type}: {task_title}")).await
    }

    /// Push the plan branch, setting the upstream on first push.
    #[instrument(skip(self))]
    pub async fn push_task_progress(&self, branch: &str) -> Result<(), GitError> {
        if !self.has_remote(&self.remote).await? {
            return Err(GitError::RemoteNotFound(self.remote.clone()));
        }
        self.push_with_upstream(&self.remote, branch).await
    }

    /// Open a PR for a finished plan.
    ///
    /// `tasks` pairs each completed task title with its optional
    /// completion summary.
    pub async fn create_plan_pr(
        &self,
        goal: &str,
        tasks: &[(String, String)],
        base: &str,
    ) -> Result<PrInfo, GitError> {
        let head = self.current_branch().await?;
        let body = pr_body(goal, tasks);
        let title = format!("feat: {goal}");
        self.create_pr(&title, &body, base, &head).await
    }
}

/// Branch name for a plan: `feat/plan-<8-char-suffix>-<slug>`.
pub fn plan_branch_name(plan_id: &str, plan_title: &str) -> String {
    let short_id: String = if plan_id.len() > 8 {
        plan_id.chars().skip(plan_id.chars().count().saturating_sub(8)).collect()
    } else {
        plan_id.to_string()
    };
    let slug = slugify(plan_title, SLUG_MAX_LEN);
    if slug.is_empty() {
        format!("feat/plan-{short_id}")
    } else {
        format!("feat/plan-{short_id}-{slug}")
    }
}

/// Lowercase, non-alphanumerics to hyphens, runs collapsed, trimmed,
/// truncated at the last non-hyphen boundary.
pub fn slugify(input: &str, max_len: usize) -> String {
    let mut out = String::new();
    let mut prev_hyphen = false;
    for c in input.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_hyphen = false;
        } else if !prev_hyphen && !out.is_empty() {
            out.push('-');
            prev_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.len() > max_len {
        out.truncate(max_len);
        while out.ends_with('-') {
            out.pop();
        }
    }
    out
}

/// Conventional-commit type: exact task type match first, then title
/// keywords, defaulting to `feat`.
pub fn infer_commit_type(task_type: &str, title: &str) -> &'static str {
    match task_type.to_lowercase().as_str() {
        "feat" => return "feat",
        "fix" => return "fix",
        "docs" => return "docs",
        "test" => return "test",
        "refactor" => return "refactor",
        "chore" => return "chore",
        _ => {}
    }

    let title = title.to_lowercase();
    if title.contains("fix") || title.contains("bug") {
        "fix"
    } else if title.contains("test") {
        "test"
    } else if title.contains("refactor") {
        "refactor"
    } else if title.contains("doc") {
        "docs"
    } else if title.contains("chore") {
        "chore"
    } else {
        "feat"
    }
}

/// Markdown body for a plan PR.
fn pr_body(goal: &str, tasks: &[(String, String)]) -> String {
    let mut body = String::new();
    body.push_str("## Summary\n\n");
    body.push_str(goal);
    body.push_str("\n\n## Completed Tasks\n\n");
    for (title, summary) in tasks {
        if summary.is_empty() {
            body.push_str(&format!("- [x] {title}\n"));
        } else {
            body.push_str(&format!("- [x] {title} — {summary}\n"));
        }
    }
    body.push_str("\n---\nOpened by TaskWing\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Add OAuth!", 50), "add-oauth");
        assert_eq!(slugify("  Fix -- the   bug ", 50), "fix-the-bug");
        assert_eq!(slugify("CamelCase Title", 50), "camelcase-title");
    }

    #[test]
    fn slugify_collapses_hyphen_runs() {
        assert_eq!(slugify("a---b___c", 50), "a-b-c");
    }

    #[test]
    fn slugify_truncates_at_non_hyphen_boundary() {
        let long = "aaaa bbbb cccc dddd eeee ffff gggg hhhh iiii jjjj kkkk";
        let slug = slugify(long, 50);
        assert!(slug.len() <= 50);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn slugify_is_idempotent() {
        for input in ["Add OAuth!", "weird__Input--here", "ALL CAPS TITLE", "123 456"] {
            let once = slugify(input, 50);
            assert_eq!(slugify(&once, 50), once);
        }
    }

    #[test]
    fn slugify_empty_input() {
        assert_eq!(slugify("", 50), "");
        assert_eq!(slugify("!!!", 50), "");
    }

    #[test]
    fn branch_name_uses_last_eight_of_id() {
        let name = plan_branch_name("plan-ABCDEFGH", "Add OAuth!");
        assert_eq!(name, "feat/plan-ABCDEFGH-add-oauth");
    }

    #[test]
    fn commit_type_exact_match_wins() {
        assert_eq!(infer_commit_type("refactor", "fix the thing"), "refactor");
        assert_eq!(infer_commit_type("docs", "anything"), "docs");
    }

    #[test]
    fn commit_type_title_keywords() {
        assert_eq!(infer_commit_type("general", "Fix login bug"), "fix");
        assert_eq!(infer_commit_type("general", "Add tests for parser"), "test");
        assert_eq!(infer_commit_type("general", "Refactor module"), "refactor");
        assert_eq!(infer_commit_type("general", "Update docs"), "docs");
        assert_eq!(infer_commit_type("general", "Chore work"), "chore");
        assert_eq!(infer_commit_type("general", "Add caching layer"), "feat");
    }

    #[test]
    fn pr_body_format() {
        let body = pr_body(
            "Add OAuth",
            &[
                ("Implement flow".to_string(), "done with PKCE".to_string()),
                ("Write tests".to_string(), String::new()),
            ],
        );
        assert!(body.starts_with("## Summary\n\nAdd OAuth\n\n## Completed Tasks\n"));
        assert!(body.contains("- [x] Implement flow — done with PKCE"));
        assert!(body.contains("- [x] Write tests\n"));
        assert!(body.trim_end().ends_with("Opened by TaskWing"));
    }
}
