//! Knowledge and code-symbol models.
//!
//! Knowledge nodes hold architectural decisions, patterns, constraints
//! and notes; code symbols come from the external indexer. The core
//! consumes both through search, it never manages embeddings itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;

/// Category of a knowledge node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Decision,
    Pattern,
    Constraint,
    Note,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Pattern => "pattern",
            Self::Constraint => "constraint",
            Self::Note => "note",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "decision" => Some(Self::Decision),
            "pattern" => Some(Self::Pattern),
            "constraint" => Some(Self::Constraint),
            "note" => Some(Self::Note),
            _ => None,
        }
    }
}

impl std::str::FromStr for NodeType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown node type: {s}")))
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of architectural knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub id: Uuid,
    pub node_type: NodeType,
    pub summary: String,
    pub content: String,
    /// Embedding vector, present when the external embedder has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub workspace: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeNode {
    pub fn new(node_type: NodeType, summary: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_type,
            summary: summary.into(),
            content: content.into(),
            embedding: None,
            workspace: "default".to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A knowledge node with its retrieval score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node: KnowledgeNode,
    pub score: f32,
}

/// Per-type statistics in the project summary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTypeSummary {
    pub count: u64,
    pub examples: Vec<String>,
}

/// Aggregate view over the knowledge store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub total: u64,
    pub types: std::collections::BTreeMap<String, NodeTypeSummary>,
}

/// Kind of a code symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Struct,
    Interface,
    Type,
    Constant,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Type => "type",
            Self::Constant => "constant",
            Self::Variable => "variable",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "function" => Some(Self::Function),
            "method" => Some(Self::Method),
            "struct" => Some(Self::Struct),
            "interface" => Some(Self::Interface),
            "type" => Some(Self::Type),
            "constant" => Some(Self::Constant),
            "variable" => Some(Self::Variable),
            _ => None,
        }
    }
}

impl std::str::FromStr for SymbolKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
            .ok_or_else(|| DomainError::ValidationFailed(format!("unknown symbol kind: {s}")))
    }
}

/// Symbol visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

/// A symbol extracted from the codebase by the external indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeSymbol {
    pub id: Uuid,
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub doc_comment: String,
    pub visibility: Visibility,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_round_trips() {
        for t in [
            NodeType::Decision,
            NodeType::Pattern,
            NodeType::Constraint,
            NodeType::Note,
        ] {
            assert_eq!(NodeType::from_str(t.as_str()), Some(t));
        }
    }

    #[test]
    fn symbol_kind_round_trips() {
        for k in [
            SymbolKind::Function,
            SymbolKind::Method,
            SymbolKind::Struct,
            SymbolKind::Interface,
            SymbolKind::Type,
            SymbolKind::Constant,
            SymbolKind::Variable,
        ] {
            assert_eq!(SymbolKind::from_str(k.as_str()), Some(k));
        }
    }
}
