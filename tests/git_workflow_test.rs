//! Plan branch workflow against a real repository: branch naming,
//! idempotent re-entry, and auto-stash of local changes.

mod common;

use std::path::Path;
use std::process::Command;

use taskwing::infrastructure::git::GitDriver;

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn init_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    git(root, &["init"]);
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "user.name", "Test"]);
    git(root, &["checkout", "-b", "main"]);
    std::fs::write(root.join("README.md"), "readme\n").expect("write");
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "init"]);
    dir
}

#[tokio::test]
async fn workflow_creates_plan_branch_from_clean_main() {
    let dir = init_repo();
    let driver = GitDriver::new(dir.path(), "origin");

    let result = driver
        .start_plan_workflow("plan-ABCDEFGH", "Add OAuth!", false)
        .await
        .expect("workflow");

    assert_eq!(result.branch, "feat/plan-ABCDEFGH-add-oauth");
    assert_eq!(result.default_branch, "main");
    assert_eq!(result.previous_branch, "main");
    assert!(!result.was_stashed);

    let head = git(dir.path(), &["rev-parse", "--abbrev-ref", "HEAD"]);
    assert_eq!(head, "feat/plan-ABCDEFGH-add-oauth");
}

#[tokio::test]
async fn workflow_is_idempotent_on_existing_branch() {
    let dir = init_repo();
    let driver = GitDriver::new(dir.path(), "origin");

    let first = driver
        .start_plan_workflow("plan-ABCDEFGH", "Add OAuth!", false)
        .await
        .expect("first run");
    let second = driver
        .start_plan_workflow("plan-ABCDEFGH", "Add OAuth!", false)
        .await
        .expect("second run");

    assert_eq!(first.branch, second.branch);
    let head = git(dir.path(), &["rev-parse", "--abbrev-ref", "HEAD"]);
    assert_eq!(head, first.branch);
}

#[tokio::test]
async fn workflow_stashes_dirty_tracked_changes() {
    let dir = init_repo();
    std::fs::write(dir.path().join("README.md"), "local edit\n").expect("write");

    let driver = GitDriver::new(dir.path(), "origin");
    let result = driver
        .start_plan_workflow("plan-12345678", "Tidy docs", false)
        .await
        .expect("workflow");

    assert!(result.was_stashed);
    // The working tree on the new branch is clean; the edit sits in the stash.
    let status = git(dir.path(), &["status", "--porcelain"]);
    assert!(status.is_empty(), "unexpected dirt: {status}");
    let stashes = git(dir.path(), &["stash", "list"]);
    assert!(stashes.contains("Auto-stash for plan plan-12345678"));
}

#[tokio::test]
async fn commit_task_progress_uses_conventional_type() {
    let dir = init_repo();
    let driver = GitDriver::new(dir.path(), "origin");

    std::fs::write(dir.path().join("parser.rs"), "content\n").expect("write");
    let outcome = driver
        .commit_task_progress("Fix tokenizer bug", "general")
        .await
        .expect("commit");
    assert_eq!(outcome, taskwing::infrastructure::git::CommitOutcome::Committed);

    let subject = git(dir.path(), &["log", "-1", "--pretty=%s"]);
    assert_eq!(subject, "fix: Fix tokenizer bug");
}

#[tokio::test]
async fn commit_with_clean_tree_reports_nothing_to_commit() {
    let dir = init_repo();
    let driver = GitDriver::new(dir.path(), "origin");

    let outcome = driver
        .commit_task_progress("No changes here", "general")
        .await
        .expect("commit call");
    assert_eq!(
        outcome,
        taskwing::infrastructure::git::CommitOutcome::NothingToCommit
    );
}

#[tokio::test]
async fn default_branch_falls_back_to_main() {
    let dir = init_repo();
    let driver = GitDriver::new(dir.path(), "origin");
    assert_eq!(driver.default_branch().await.expect("default"), "main");
}
