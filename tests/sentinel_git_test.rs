//! Sentinel verification against a real git repository: baseline
//! exclusion and detection of modifications the agent never reported.

mod common;

use std::path::Path;
use std::process::Command;

use uuid::Uuid;

use taskwing::domain::models::{DeviationType, Severity, Task, VerificationStatus};
use taskwing::services::{GitVerifier, Sentinel};

fn git(dir: &Path, args: &[&str]) {
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
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).expect("write file");
}

/// A repository with one commit containing the given files.
fn init_repo(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    git(root, &["init"]);
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "user.name", "Test"]);
    git(root, &["checkout", "-b", "main"]);
    for name in files {
        write(root, name, "original\n");
    }
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "init"]);
    dir
}

#[tokio::test]
async fn unreported_modification_is_flagged_as_critical() {
    let dir = init_repo(&["a.go", "pre.go", "sneaky.go"]);
    let root = dir.path();

    // pre.go was already dirty when the task was claimed; a.go and
    // sneaky.go changed during the task, but only a.go was reported.
    write(root, "pre.go", "dirty before the task\n");
    write(root, "a.go", "task work\n");
    write(root, "sneaky.go", "unreported work\n");

    let mut task = Task::new(Uuid::new_v4(), "touch a.go", "description");
    task.expected_files = vec!["a.go".to_string()];
    task.files_modified = vec!["a.go".to_string()];
    task.git_baseline = vec!["pre.go".to_string()];

    let report = Sentinel::new()
        .analyze_with_verification(&task, Some(root))
        .await;

    assert_eq!(report.verification_status, VerificationStatus::Verified);
    assert!(report.summary.contains("[git verified]"));

    let unreported: Vec<_> = report
        .deviations
        .iter()
        .filter(|d| d.deviation_type == DeviationType::Unreported)
        .collect();
    assert_eq!(unreported.len(), 1);
    assert_eq!(unreported[0].file_path, "sneaky.go");
    assert_eq!(unreported[0].severity, Severity::Error);
    assert!(report.has_critical_deviations());

    // The baseline file is excluded from deviation analysis entirely.
    assert!(report.deviations.iter().all(|d| d.file_path != "pre.go"));
}

#[tokio::test]
async fn matching_report_verifies_clean() {
    let dir = init_repo(&["a.rs"]);
    let root = dir.path();
    write(root, "a.rs", "changed\n");

    let mut task = Task::new(Uuid::new_v4(), "touch a.rs", "description");
    task.expected_files = vec!["a.rs".to_string()];
    task.files_modified = vec!["a.rs".to_string()];

    let report = Sentinel::new()
        .analyze_with_verification(&task, Some(root))
        .await;

    assert_eq!(report.verification_status, VerificationStatus::Verified);
    assert_eq!(
        report.count_of(DeviationType::Unreported),
        0,
        "{:?}",
        report.deviations
    );
    assert!(!report.has_critical_deviations());
}

#[tokio::test]
async fn over_reported_file_is_a_warning() {
    let dir = init_repo(&["a.rs"]);
    let root = dir.path();
    // Nothing actually changes in the working tree.

    let mut task = Task::new(Uuid::new_v4(), "claimed work", "description");
    task.expected_files = vec!["ghost.rs".to_string()];
    task.files_modified = vec!["ghost.rs".to_string()];

    let report = Sentinel::new()
        .analyze_with_verification(&task, Some(root))
        .await;

    assert_eq!(report.verification_status, VerificationStatus::Verified);
    let over: Vec<_> = report
        .deviations
        .iter()
        .filter(|d| d.deviation_type == DeviationType::OverReported)
        .collect();
    assert_eq!(over.len(), 1);
    assert_eq!(over[0].file_path, "ghost.rs");
    assert_eq!(over[0].severity, Severity::Warning);
}

#[tokio::test]
async fn non_repo_directory_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");

    let mut task = Task::new(Uuid::new_v4(), "task", "description");
    task.files_modified = vec!["a.rs".to_string()];

    let report = Sentinel::new()
        .analyze_with_verification(&task, Some(dir.path()))
        .await;
    assert_eq!(report.verification_status, VerificationStatus::Unavailable);
}

#[tokio::test]
async fn verifier_unions_working_tree_and_last_commit() {
    let dir = init_repo(&["committed.rs", "tree.rs"]);
    let root = dir.path();

    // Second commit so HEAD~1 exists, then a working tree change on top.
    write(root, "committed.rs", "second version\n");
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "update committed.rs"]);
    write(root, "tree.rs", "working tree change\n");

    let verifier = GitVerifier::new(root, "origin");
    let actual = verifier
        .get_actual_modifications()
        .await
        .expect("modifications");

    assert!(actual.contains(&"committed.rs".to_string()), "{actual:?}");
    assert!(actual.contains(&"tree.rs".to_string()), "{actual:?}");
}
