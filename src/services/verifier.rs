//! Git verifier: computes the actual-modified file set from git and
//! diffs it against the set the agent reported.
//!
//! Two sources are unioned: `git status --porcelain` for working-tree
//! changes, and the last commit's diff. The second source is allowed to
//! fail silently because fresh repositories have no `HEAD~1`.

use std::path::Path;

use tracing::{debug, warn};

use crate::domain::models::VerificationResult;
use crate::infrastructure::git::{GitDriver, GitError};

/// Paths under this prefix belong to the engine itself and are never
/// counted as task modifications.
const INTERNAL_PREFIX: &str = ".taskwing/";

/// Normalise a path: forward slashes, `.` segments dropped, `..`
/// segments collapsed, no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn normalize_all(paths: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    paths
        .iter()
        .map(|p| normalize_path(p))
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Computes git ground truth for deviation analysis.
pub struct GitVerifier {
    driver: GitDriver,
}

impl GitVerifier {
    pub fn new(repo_root: impl AsRef<Path>, remote: impl Into<String>) -> Self {
        Self {
            driver: GitDriver::new(repo_root, remote),
        }
    }

    pub fn driver(&self) -> &GitDriver {
        &self.driver
    }

    /// Union of working-tree modifications and the last commit's files,
    /// normalised and with engine-internal paths excluded.
    pub async fn get_actual_modifications(&self) -> Result<Vec<String>, GitError> {
        let status = self.driver.status_porcelain().await?;
        let mut files: Vec<String> = Vec::new();
        for line in status.lines() {
            if line.len() <= 3 {
                continue;
            }
            let path = line[3..].trim();
            // Renames are reported as "old -> new"; the new path is the
            // one that exists.
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            let path = path.trim_matches('"');
            if !path.is_empty() {
                files.push(path.to_string());
            }
        }

        // Fresh repositories have no HEAD~1; ignore that failure.
        match self.driver.diff_name_only_last_commit().await {
            Ok(diff) => {
                for line in diff.lines() {
                    let path = line.trim();
                    if !path.is_empty() {
                        files.push(path.to_string());
                    }
                }
            }
            Err(e) => {
                debug!(error = %e, "last-commit diff unavailable, using working tree only");
            }
        }

        Ok(normalize_all(&files)
            .into_iter()
            .filter(|p| !p.starts_with(INTERNAL_PREFIX))
            .collect())
    }

    /// Diff reported modifications against git ground truth.
    pub async fn verify(&self, reported: &[String]) -> VerificationResult {
        self.verify_with_baseline(reported, &[]).await
    }

    /// Diff reported modifications against git ground truth, excluding
    /// files that were already dirty when the task was claimed.
    pub async fn verify_with_baseline(
        &self,
        reported: &[String],
        baseline: &[String],
    ) -> VerificationResult {
        let reported = normalize_all(reported);
        let baseline: std::collections::HashSet<String> =
            normalize_all(baseline).into_iter().collect();

        let actual = match self.get_actual_modifications().await {
            Ok(actual) => actual,
            Err(e) => {
                warn!(error = %e, "git verification failed");
                return VerificationResult {
                    reported,
                    actual: Vec::new(),
                    unreported: Vec::new(),
                    over_reported: Vec::new(),
                    is_verified: false,
                    verify_error: Some(e.to_string()),
                };
            }
        };

        let reported_set: std::collections::HashSet<&String> = reported.iter().collect();
        let actual_set: std::collections::HashSet<&String> = actual.iter().collect();

        let unreported = actual
            .iter()
            .filter(|f| !reported_set.contains(f) && !baseline.contains(f.as_str()))
            .cloned()
            .collect();
        let over_reported = reported
            .iter()
            .filter(|f| !actual_set.contains(f))
            .cloned()
            .collect();

        VerificationResult {
            reported,
            actual,
            unreported,
            over_reported,
            is_verified: true,
            verify_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_dot_slash() {
        assert_eq!(normalize_path("./a/b"), "a/b");
        assert_eq!(normalize_path("a/b"), "a/b");
        assert_eq!(normalize_path("a//b"), "a/b");
    }

    #[test]
    fn normalize_collapses_parent_segments() {
        assert_eq!(normalize_path("a/x/../b"), "a/b");
        assert_eq!(normalize_path("a/./b/./c"), "a/b/c");
    }

    #[test]
    fn normalize_converts_backslashes() {
        assert_eq!(normalize_path("a\\b\\c"), "a/b/c");
    }

    #[test]
    fn normalize_all_dedupes_preserving_order() {
        let input = vec![
            "./a.rs".to_string(),
            "a.rs".to_string(),
            "b//c.rs".to_string(),
        ];
        assert_eq!(
            normalize_all(&input),
            vec!["a.rs".to_string(), "b/c.rs".to_string()]
        );
    }
}
