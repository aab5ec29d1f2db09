//! Configuration model for TaskWing.
//!
//! Loaded once at startup through the figment loader and passed by
//! reference into the services that need it.

use serde::{Deserialize, Serialize};

/// Main configuration structure for TaskWing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Clarify round budgets
    #[serde(default)]
    pub clarify: ClarifyConfig,

    /// Knowledge retrieval tuning
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Keyword/scope extraction settings
    #[serde(default)]
    pub scope: ScopeConfig,

    /// Git workflow settings
    #[serde(default)]
    pub git: GitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            clarify: ClarifyConfig::default(),
            knowledge: KnowledgeConfig::default(),
            scope: ScopeConfig::default(),
            git: GitConfig::default(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to the SQLite store
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".taskwing/memory/taskwing.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Also write logs to daily-rotated files under `dir`
    #[serde(default)]
    pub file_enabled: bool,

    /// Directory for rotated log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_log_dir() -> String {
    ".taskwing/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file_enabled: false,
            dir: default_log_dir(),
        }
    }
}

/// Clarify session budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClarifyConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    #[serde(default = "default_max_questions_per_round")]
    pub max_questions_per_round: u32,
}

const fn default_max_rounds() -> u32 {
    5
}

const fn default_max_questions_per_round() -> u32 {
    3
}

impl Default for ClarifyConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            max_questions_per_round: default_max_questions_per_round(),
        }
    }
}

/// Knowledge retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct KnowledgeConfig {
    /// Weight of the lexical leg in score fusion
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,

    /// Weight of the vector leg in score fusion
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Rewrite queries (stopword strip, dedupe) before searching
    #[serde(default = "default_true")]
    pub rewrite_queries: bool,

    /// Pull workspace-adjacent nodes for top hits
    #[serde(default)]
    pub graph_expansion: bool,

    /// Score discount applied to expansion hits
    #[serde(default = "default_expansion_discount")]
    pub expansion_discount: f32,
}

const fn default_lexical_weight() -> f32 {
    0.4
}

const fn default_vector_weight() -> f32 {
    0.6
}

const fn default_true() -> bool {
    true
}

const fn default_expansion_discount() -> f32 {
    0.5
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            lexical_weight: default_lexical_weight(),
            vector_weight: default_vector_weight(),
            rewrite_queries: default_true(),
            graph_expansion: false,
            expansion_discount: default_expansion_discount(),
        }
    }
}

/// One named scope and the keywords that vote for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeDefinition {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Keyword/scope extraction configuration.
///
/// Scope definitions are ordered; classification ties are broken by the
/// first definition. Overrides merge by scope name, replacing the
/// keyword list of an existing scope or appending a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScopeConfig {
    #[serde(default = "default_scopes")]
    pub scopes: Vec<ScopeDefinition>,

    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,

    #[serde(default = "default_min_word_len")]
    pub min_word_len: usize,
}

const fn default_max_keywords() -> usize {
    10
}

const fn default_min_word_len() -> usize {
    4
}

fn scope(name: &str, keywords: &[&str]) -> ScopeDefinition {
    ScopeDefinition {
        name: name.to_string(),
        keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
    }
}

fn default_scopes() -> Vec<ScopeDefinition> {
    vec![
        scope(
            "api",
            &["api", "endpoint", "handler", "route", "rest", "rpc", "http", "request", "response"],
        ),
        scope(
            "database",
            &["database", "db", "schema", "migration", "query", "sql", "table", "index", "storage"],
        ),
        scope(
            "auth",
            &["auth", "authentication", "authorization", "login", "token", "session", "oauth", "password"],
        ),
        scope(
            "ui",
            &["ui", "frontend", "component", "view", "page", "render", "style", "layout"],
        ),
        scope(
            "testing",
            &["test", "tests", "testing", "coverage", "fixture", "mock", "assert"],
        ),
        scope(
            "infra",
            &["deploy", "deployment", "docker", "pipeline", "build", "release", "config", "infra"],
        ),
        scope(
            "docs",
            &["docs", "documentation", "readme", "guide", "comment"],
        ),
    ]
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            scopes: default_scopes(),
            max_keywords: default_max_keywords(),
            min_word_len: default_min_word_len(),
        }
    }
}

impl ScopeConfig {
    /// Merge an override into this config. Scope overrides replace the
    /// keyword list of an existing scope by name, new scopes append.
    pub fn merge(&mut self, overrides: ScopeOverrides) {
        if let Some(max_keywords) = overrides.max_keywords {
            self.max_keywords = max_keywords;
        }
        if let Some(min_word_len) = overrides.min_word_len {
            self.min_word_len = min_word_len;
        }
        for def in overrides.scopes {
            if let Some(existing) = self.scopes.iter_mut().find(|s| s.name == def.name) {
                existing.keywords = def.keywords;
            } else {
                self.scopes.push(def);
            }
        }
    }
}

/// Partial scope configuration supplied from config files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScopeOverrides {
    #[serde(default)]
    pub scopes: Vec<ScopeDefinition>,
    #[serde(default)]
    pub max_keywords: Option<usize>,
    #[serde(default)]
    pub min_word_len: Option<usize>,
}

/// Git workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitConfig {
    /// Remote used for pull/push
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Skip the unpushed-commit precondition when starting a plan workflow
    #[serde(default)]
    pub skip_unpushed_check: bool,
}

fn default_remote() -> String {
    "origin".to_string()
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            remote: default_remote(),
            skip_unpushed_check: false,
        }
    }
}
