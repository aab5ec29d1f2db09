//! Knowledge and code-symbol repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CodeSymbol, KnowledgeNode, NodeType, ScoredNode, SymbolKind};

/// Repository interface for the knowledge store and the code-symbol index.
///
/// The lexical leg runs in the store; the vector leg is computed by the
/// knowledge service over nodes returned from `list_with_embeddings`.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Insert a knowledge node.
    async fn create_node(&self, node: &KnowledgeNode) -> DomainResult<()>;

    /// Get a node by ID.
    async fn get_node(&self, id: Uuid) -> DomainResult<Option<KnowledgeNode>>;

    /// Lexical search: score nodes by how many query terms their summary
    /// or content contains. Returns up to `limit` nodes, best first.
    async fn search_lexical(&self, terms: &[String], limit: usize)
        -> DomainResult<Vec<ScoredNode>>;

    /// Lexical search restricted to one node type.
    async fn search_lexical_by_type(
        &self,
        terms: &[String],
        node_type: NodeType,
        limit: usize,
    ) -> DomainResult<Vec<ScoredNode>>;

    /// All nodes that carry an embedding vector.
    async fn list_with_embeddings(&self) -> DomainResult<Vec<KnowledgeNode>>;

    /// Nodes sharing a workspace, newest first.
    async fn list_by_workspace(&self, workspace: &str, limit: usize)
        -> DomainResult<Vec<KnowledgeNode>>;

    /// Count nodes and collect example summaries per type.
    async fn summarize_by_type(&self) -> DomainResult<Vec<(NodeType, u64, Vec<String>)>>;

    /// Insert a code symbol.
    async fn create_symbol(&self, symbol: &CodeSymbol) -> DomainResult<()>;

    /// Get a symbol by ID.
    async fn get_symbol(&self, id: Uuid) -> DomainResult<Option<CodeSymbol>>;

    /// Record a caller → callee reference edge.
    async fn add_symbol_ref(&self, caller_id: Uuid, callee_id: Uuid) -> DomainResult<()>;

    /// Find symbols by (sub)name, optionally restricted to a kind.
    async fn find_symbols(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
        limit: usize,
    ) -> DomainResult<Vec<CodeSymbol>>;

    /// Direct callers of a symbol.
    async fn callers_of(&self, symbol_id: Uuid) -> DomainResult<Vec<CodeSymbol>>;
}
