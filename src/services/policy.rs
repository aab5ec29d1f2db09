//! Policy engine: deny-rule evaluation over task completion payloads.
//!
//! The engine is constructed with an already-loaded rule set; rule
//! files live under `.taskwing/policies/` and are read by the binary at
//! startup. With zero rules every evaluation trivially allows.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// A deny rule. A task is denied when any modified or created file
/// matches one of the rule's `file_patterns`, or when the task text
/// contains one of its `keywords`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    pub reason: String,
    #[serde(default)]
    pub file_patterns: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A single rule violation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyViolation {
    pub rule: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Result of evaluating one task payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    pub violations: Vec<PolicyViolation>,
    pub decision_id: String,
}

/// The task payload under evaluation.
#[derive(Debug, Clone, Default)]
pub struct TaskPolicyInput {
    pub task_id: String,
    pub title: String,
    pub description: String,
    pub files_modified: Vec<String>,
    pub files_created: Vec<String>,
    pub plan_id: String,
    pub plan_goal: String,
}

/// Evaluates task payloads against a set of deny rules.
pub struct PolicyEngine {
    rules: Vec<PolicyRule>,
}

impl PolicyEngine {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Load every YAML rule file in a directory. A missing directory
    /// yields an empty engine.
    pub fn from_dir(dir: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut rules = Vec::new();
        if dir.is_dir() {
            let mut entries: Vec<_> = std::fs::read_dir(dir)?
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .is_some_and(|ext| ext == "yaml" || ext == "yml")
                })
                .collect();
            entries.sort();
            for path in entries {
                let raw = std::fs::read_to_string(&path)?;
                let mut file_rules: Vec<PolicyRule> = serde_yaml::from_str(&raw)?;
                rules.append(&mut file_rules);
            }
        }
        Ok(Self::new(rules))
    }

    pub fn policy_count(&self) -> usize {
        self.rules.len()
    }

    /// Evaluate a task payload. Returns the decision with every
    /// violation found; the caller formats them for the user.
    pub fn evaluate_task(&self, input: &TaskPolicyInput) -> PolicyDecision {
        let decision_id = Uuid::new_v4().to_string();
        if self.rules.is_empty() {
            return PolicyDecision {
                allowed: true,
                violations: Vec::new(),
                decision_id,
            };
        }

        let text = format!("{} {}", input.title, input.description).to_lowercase();
        let mut violations = Vec::new();

        for rule in &self.rules {
            for file in input.files_modified.iter().chain(&input.files_created) {
                if rule
                    .file_patterns
                    .iter()
                    .any(|p| pattern_matches(p, file))
                {
                    violations.push(PolicyViolation {
                        rule: rule.name.clone(),
                        message: format!("{}: {}", rule.reason, file),
                        file: Some(file.clone()),
                    });
                }
            }

            for keyword in &rule.keywords {
                if text.contains(&keyword.to_lowercase()) {
                    violations.push(PolicyViolation {
                        rule: rule.name.clone(),
                        message: format!("{}: task mentions \"{keyword}\"", rule.reason),
                        file: None,
                    });
                }
            }
        }

        debug!(
            task_id = %input.task_id,
            decision_id = %decision_id,
            violations = violations.len(),
            "policy evaluated"
        );

        PolicyDecision {
            allowed: violations.is_empty(),
            violations,
            decision_id,
        }
    }
}

/// Match a file path against a pattern. `*` matches any run of
/// characters; a pattern without `*` matches as a substring.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let path = path.to_lowercase();
    let pattern = pattern.to_lowercase();

    if !pattern.contains('*') {
        return path.contains(&pattern);
    }

    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = path.as_str();
    for (i, seg) in segments.iter().enumerate() {
        if seg.is_empty() {
            continue;
        }
        match rest.find(seg) {
            Some(pos) => {
                // The first segment must anchor at the start.
                if i == 0 && pos != 0 {
                    return false;
                }
                rest = &rest[pos + seg.len()..];
            }
            None => return false,
        }
    }
    // The last segment must anchor at the end.
    if let Some(last) = segments.last() {
        if !last.is_empty() && !path.ends_with(last) {
            return false;
        }
    }
    true
}
