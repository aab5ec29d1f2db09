//! Deviation and verification models.
//!
//! A deviation is any mismatch between the files a plan expected a task
//! to touch, the files the agent reported, and the files git actually
//! observed. The sentinel classifies them; the verifier supplies the
//! git ground truth.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a single deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviationType {
    /// File modified but not planned
    Drift,
    /// Planned file not modified
    Missing,
    /// Modified per git but not reported by the agent
    Unreported,
    /// Claimed modified but git shows no change
    OverReported,
}

impl DeviationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drift => "drift",
            Self::Missing => "missing",
            Self::Unreported => "unreported",
            Self::OverReported => "over_reported",
        }
    }
}

impl std::fmt::Display for DeviationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity assigned to a deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified mismatch between expected, reported and actual files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deviation {
    pub deviation_type: DeviationType,
    pub file_path: String,
    pub severity: Severity,
    pub reason: String,
}

/// Outcome of the git-backed verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No repository root was supplied
    Skipped,
    /// Not a git repository, or git invocation failed
    Unavailable,
    /// Git ground truth was merged into the report
    Verified,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Unavailable => "unavailable",
            Self::Verified => "verified",
        }
    }
}

/// Diff between agent-reported and git-observed modifications.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationResult {
    pub reported: Vec<String>,
    pub actual: Vec<String>,
    /// `actual − reported − baseline`
    pub unreported: Vec<String>,
    /// `reported − actual`
    pub over_reported: Vec<String>,
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_error: Option<String>,
}

/// Severity-tagged report for a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelReport {
    pub task_id: Uuid,
    pub deviations: Vec<Deviation>,
    /// `1 − |expected ∩ actual| / |expected ∪ actual|`
    pub deviation_rate: f64,
    pub summary: String,
    pub verification_status: VerificationStatus,
}

impl SentinelReport {
    /// Whether any deviation carries error severity.
    pub fn has_critical_deviations(&self) -> bool {
        self.deviations
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count deviations of the given type.
    pub fn count_of(&self, deviation_type: DeviationType) -> usize {
        self.deviations
            .iter()
            .filter(|d| d.deviation_type == deviation_type)
            .count()
    }
}
