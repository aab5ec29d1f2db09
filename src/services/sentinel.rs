//! Deviation sentinel.
//!
//! Classifies mismatches between the files a plan expected a task to
//! touch, the files the agent reported, and the files git actually
//! observed. Reported-vs-expected analysis is pure; git ground truth is
//! merged in by `analyze_with_verification`.

use std::collections::HashSet;
use std::path::Path;

use tracing::{info, instrument};

use crate::domain::models::{
    Deviation, DeviationType, SentinelReport, Severity, Task, VerificationStatus,
};
use crate::services::verifier::{normalize_path, GitVerifier};

/// Substrings marking a path as high risk.
const HIGH_RISK_MARKERS: &[&str] = &[
    "config",
    ".env",
    "secret",
    "credential",
    "auth",
    "security",
    "password",
    "token",
    "migration",
    "schema",
];

/// Whether a path touches security- or schema-sensitive territory.
pub fn is_high_risk_path(path: &str) -> bool {
    let path = path.to_lowercase();
    HIGH_RISK_MARKERS.iter().any(|m| path.contains(m))
}

/// Deviation rate between the expected and actual file sets:
/// `1 − |expected ∩ actual| / |expected ∪ actual|`.
///
/// Both empty yields 0.0; expected empty with actual non-empty yields 1.0.
pub fn deviation_rate(expected: &[String], actual: &[String]) -> f64 {
    let expected: HashSet<&String> = expected.iter().collect();
    let actual: HashSet<&String> = actual.iter().collect();
    let union = expected.union(&actual).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = expected.intersection(&actual).count();
    #[allow(clippy::cast_precision_loss)]
    let rate = 1.0 - intersection as f64 / union as f64;
    rate
}

/// Classifies deviations and assigns severities.
pub struct Sentinel {
    drift_warn_threshold: usize,
    drift_error_threshold: usize,
}

impl Default for Sentinel {
    fn default() -> Self {
        Self {
            drift_warn_threshold: 2,
            drift_error_threshold: 5,
        }
    }
}

impl Sentinel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the task's expected file set against what the agent
    /// reported. Git is not consulted.
    pub fn analyze(&self, task: &Task) -> SentinelReport {
        let expected = normalize_set(&task.expected_files);
        let actual = normalize_set(&task.files_modified);

        let expected_set: HashSet<&String> = expected.iter().collect();
        let actual_set: HashSet<&String> = actual.iter().collect();

        let mut deviations = Vec::new();
        let mut drift_count = 0usize;

        for file in &actual {
            if !expected_set.contains(file) {
                drift_count += 1;
                deviations.push(self.drift_deviation(file, drift_count));
            }
        }

        for file in &expected {
            if !actual_set.contains(file) {
                deviations.push(Deviation {
                    deviation_type: DeviationType::Missing,
                    file_path: file.clone(),
                    severity: Severity::Warning,
                    reason: "planned file was not modified".to_string(),
                });
            }
        }

        let rate = deviation_rate(&expected, &actual);
        let summary = summarize(&deviations, rate);

        SentinelReport {
            task_id: task.id,
            deviations,
            deviation_rate: rate,
            summary,
            verification_status: VerificationStatus::Skipped,
        }
    }

    /// Run `analyze`, then merge git ground truth when a repository is
    /// available. Reported-only analysis still stands when git is not.
    #[instrument(skip(self, task, repo_root), fields(task_id = %task.id))]
    pub async fn analyze_with_verification(
        &self,
        task: &Task,
        repo_root: Option<&Path>,
    ) -> SentinelReport {
        let mut report = self.analyze(task);

        let Some(root) = repo_root else {
            report.verification_status = VerificationStatus::Skipped;
            return report;
        };

        let verifier = GitVerifier::new(root, "origin");
        if !matches!(verifier.driver().is_repo().await, Ok(true)) {
            report.verification_status = VerificationStatus::Unavailable;
            return report;
        }

        let result = verifier
            .verify_with_baseline(&task.files_modified, &task.git_baseline)
            .await;
        if !result.is_verified {
            report.verification_status = VerificationStatus::Unavailable;
            return report;
        }

        for file in &result.unreported {
            let reason = if is_high_risk_path(file) {
                "HIGH RISK: modified per git but not reported by the agent".to_string()
            } else {
                "modified per git but not reported by the agent".to_string()
            };
            report.deviations.push(Deviation {
                deviation_type: DeviationType::Unreported,
                file_path: file.clone(),
                severity: Severity::Error,
                reason,
            });
        }

        for file in &result.over_reported {
            report.deviations.push(Deviation {
                deviation_type: DeviationType::OverReported,
                file_path: file.clone(),
                severity: Severity::Warning,
                reason: "reported as modified but git shows no change".to_string(),
            });
        }

        // With ground truth in hand, the rate uses what git observed
        // (baseline excluded) rather than the agent's self-report.
        let baseline: HashSet<String> = normalize_set(&task.git_baseline).into_iter().collect();
        let actual: Vec<String> = result
            .actual
            .iter()
            .filter(|f| !baseline.contains(f.as_str()))
            .cloned()
            .collect();
        let expected = normalize_set(&task.expected_files);
        report.deviation_rate = deviation_rate(&expected, &actual);
        report.verification_status = VerificationStatus::Verified;
        report.summary = format!(
            "{} [git verified]",
            summarize(&report.deviations, report.deviation_rate)
        );

        info!(
            deviations = report.deviations.len(),
            critical = report.has_critical_deviations(),
            "sentinel verification complete"
        );
        report
    }

    fn drift_deviation(&self, file: &str, drift_count: usize) -> Deviation {
        if is_high_risk_path(file) {
            return Deviation {
                deviation_type: DeviationType::Drift,
                file_path: file.to_string(),
                severity: Severity::Error,
                reason: "high-risk path modified outside the plan".to_string(),
            };
        }

        let severity = if drift_count < self.drift_warn_threshold {
            Severity::Info
        } else if drift_count < self.drift_error_threshold {
            Severity::Warning
        } else {
            Severity::Error
        };

        Deviation {
            deviation_type: DeviationType::Drift,
            file_path: file.to_string(),
            severity,
            reason: "modified but not in the planned file set".to_string(),
        }
    }
}

fn normalize_set(paths: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    paths
        .iter()
        .map(|p| normalize_path(p))
        .filter(|p| !p.is_empty())
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

fn summarize(deviations: &[Deviation], rate: f64) -> String {
    if deviations.is_empty() {
        return "no deviations".to_string();
    }

    let mut counts: Vec<(DeviationType, usize)> = Vec::new();
    for t in [
        DeviationType::Drift,
        DeviationType::Missing,
        DeviationType::Unreported,
        DeviationType::OverReported,
    ] {
        let count = deviations.iter().filter(|d| d.deviation_type == t).count();
        if count > 0 {
            counts.push((t, count));
        }
    }

    let parts: Vec<String> = counts
        .iter()
        .map(|(t, c)| format!("{c} {t}"))
        .collect();

    format!(
        "{} deviation(s) (rate {:.0}%): {}",
        deviations.len(),
        rate * 100.0,
        parts.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn task_with_files(expected: &[&str], reported: &[&str]) -> Task {
        let mut task = Task::new(Uuid::new_v4(), "task", "description");
        task.expected_files = expected.iter().map(ToString::to_string).collect();
        task.files_modified = reported.iter().map(ToString::to_string).collect();
        task
    }

    #[test]
    fn matching_sets_produce_no_deviations() {
        let sentinel = Sentinel::new();
        let task = task_with_files(&["a.rs", "b.rs"], &["a.rs", "b.rs"]);
        let report = sentinel.analyze(&task);
        assert!(report.deviations.is_empty());
        assert!((report.deviation_rate - 0.0).abs() < f64::EPSILON);
        assert_eq!(report.summary, "no deviations");
    }

    #[test]
    fn both_empty_is_rate_zero() {
        assert!((deviation_rate(&[], &[]) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_expected_nonempty_actual_is_rate_one() {
        let actual = vec!["a.rs".to_string()];
        assert!((deviation_rate(&[], &actual) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn drift_severity_escalates_with_count() {
        let sentinel = Sentinel::new();
        let task = task_with_files(
            &[],
            &["one.rs", "two.rs", "three.rs", "four.rs", "five.rs", "six.rs"],
        );
        let report = sentinel.analyze(&task);
        let severities: Vec<Severity> = report.deviations.iter().map(|d| d.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::Info,
                Severity::Warning,
                Severity::Warning,
                Severity::Warning,
                Severity::Error,
                Severity::Error,
            ]
        );
    }

    #[test]
    fn high_risk_drift_is_error_immediately() {
        let sentinel = Sentinel::new();
        let task = task_with_files(&[], &["src/auth/login.rs"]);
        let report = sentinel.analyze(&task);
        assert_eq!(report.deviations[0].severity, Severity::Error);
        assert!(report.has_critical_deviations());
    }

    #[test]
    fn missing_file_is_warning() {
        let sentinel = Sentinel::new();
        let task = task_with_files(&["planned.rs"], &[]);
        let report = sentinel.analyze(&task);
        assert_eq!(report.deviations.len(), 1);
        assert_eq!(report.deviations[0].deviation_type, DeviationType::Missing);
        assert_eq!(report.deviations[0].severity, Severity::Warning);
    }

    #[test]
    fn paths_are_normalized_before_comparison() {
        let sentinel = Sentinel::new();
        let task = task_with_files(&["./a.rs"], &["a.rs"]);
        let report = sentinel.analyze(&task);
        assert!(report.deviations.is_empty());
    }

    #[test]
    fn high_risk_markers() {
        assert!(is_high_risk_path(".env"));
        assert!(is_high_risk_path("db/migrations/0001.sql"));
        assert!(is_high_risk_path("src/config.rs"));
        assert!(!is_high_risk_path("src/parser.rs"));
    }

    #[tokio::test]
    async fn no_repo_root_skips_verification() {
        let sentinel = Sentinel::new();
        let task = task_with_files(&["a.rs"], &["a.rs"]);
        let report = sentinel.analyze_with_verification(&task, None).await;
        assert_eq!(report.verification_status, VerificationStatus::Skipped);
    }
}
