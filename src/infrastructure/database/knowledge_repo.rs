//! SQLite implementation of the knowledge and code-symbol repository.
//!
//! The lexical leg scores nodes by how many query terms appear in their
//! summary or content. Vector scoring happens in the knowledge service
//! over the embeddings returned from `list_with_embeddings`.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CodeSymbol, KnowledgeNode, NodeType, ScoredNode, SymbolKind};
use crate::domain::ports::KnowledgeRepository;
use crate::infrastructure::database::utils::parse_datetime;

/// SQLite implementation of `KnowledgeRepository` using sqlx.
pub struct KnowledgeRepositoryImpl {
    pool: SqlitePool,
}

impl KnowledgeRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_node(row: &SqliteRow) -> DomainResult<KnowledgeNode> {
        let node_type: String = row.get("node_type");
        Ok(KnowledgeNode {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            node_type: node_type.parse()?,
            summary: row.get("summary"),
            content: row.get("content"),
            embedding: row
                .get::<Option<String>, _>("embedding")
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            workspace: row.get("workspace"),
            created_at: parse_datetime(row.get::<String, _>("created_at").as_str())?,
        })
    }

    fn row_to_symbol(row: &SqliteRow) -> DomainResult<CodeSymbol> {
        let kind: String = row.get("kind");
        let visibility: String = row.get("visibility");
        Ok(CodeSymbol {
            id: Uuid::parse_str(row.get::<String, _>("id").as_str())?,
            name: row.get("name"),
            kind: kind.parse()?,
            file_path: row.get("file_path"),
            start_line: u32::try_from(row.get::<i64, _>("start_line")).unwrap_or_default(),
            end_line: u32::try_from(row.get::<i64, _>("end_line")).unwrap_or_default(),
            signature: row.get("signature"),
            doc_comment: row.get("doc_comment"),
            visibility: crate::domain::models::Visibility::from_str(&visibility)
                .unwrap_or(crate::domain::models::Visibility::Private),
        })
    }

    /// Count how many distinct terms a node matches.
    fn lexical_score(node: &KnowledgeNode, terms: &[String]) -> f32 {
        if terms.is_empty() {
            return 0.0;
        }
        let haystack = format!("{} {}", node.summary, node.content).to_lowercase();
        let hits = terms
            .iter()
            .filter(|t| !t.is_empty() && haystack.contains(t.to_lowercase().as_str()))
            .count();
        #[allow(clippy::cast_precision_loss)]
        let score = hits as f32 / terms.len() as f32;
        score
    }

    async fn lexical_candidates(
        &self,
        terms: &[String],
        node_type: Option<NodeType>,
        limit: usize,
    ) -> DomainResult<Vec<ScoredNode>> {
        let rows = match node_type {
            Some(t) => {
                sqlx::query("SELECT * FROM knowledge_nodes WHERE node_type = ?")
                    .bind(t.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM knowledge_nodes")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut scored: Vec<ScoredNode> = rows
            .iter()
            .map(Self::row_to_node)
            .collect::<DomainResult<Vec<_>>>()?
            .into_iter()
            .filter_map(|node| {
                let score = Self::lexical_score(&node, terms);
                (score > 0.0).then_some(ScoredNode { node, score })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.node.id.cmp(&b.node.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}

#[async_trait]
impl KnowledgeRepository for KnowledgeRepositoryImpl {
    async fn create_node(&self, node: &KnowledgeNode) -> DomainResult<()> {
        sqlx::query(
            r"
            INSERT INTO knowledge_nodes (id, node_type, summary, content, embedding, workspace, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(node.id.to_string())
        .bind(node.node_type.as_str())
        .bind(&node.summary)
        .bind(&node.content)
        .bind(
            node.embedding
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
        )
        .bind(&node.workspace)
        .bind(node.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_node(&self, id: Uuid) -> DomainResult<Option<KnowledgeNode>> {
        let row = sqlx::query("SELECT * FROM knowledge_nodes WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_node).transpose()
    }

    async fn search_lexical(
        &self,
        terms: &[String],
        limit: usize,
    ) -> DomainResult<Vec<ScoredNode>> {
        self.lexical_candidates(terms, None, limit).await
    }

    async fn search_lexical_by_type(
        &self,
        terms: &[String],
        node_type: NodeType,
        limit: usize,
    ) -> DomainResult<Vec<ScoredNode>> {
        self.lexical_candidates(terms, Some(node_type), limit).await
    }

    async fn list_with_embeddings(&self) -> DomainResult<Vec<KnowledgeNode>> {
        let rows = sqlx::query("SELECT * FROM knowledge_nodes WHERE embedding IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_node).collect()
    }

    async fn list_by_workspace(
        &self,
        workspace: &str,
        limit: usize,
    ) -> DomainResult<Vec<KnowledgeNode>> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_nodes WHERE workspace = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(workspace)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_node).collect()
    }

    async fn summarize_by_type(&self) -> DomainResult<Vec<(NodeType, u64, Vec<String>)>> {
        let counts: Vec<(String, i64)> = sqlx::query_as(
            "SELECT node_type, COUNT(*) FROM knowledge_nodes GROUP BY node_type ORDER BY node_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(counts.len());
        for (type_str, count) in counts {
            let Some(node_type) = NodeType::from_str(&type_str) else {
                continue;
            };
            let examples: Vec<(String,)> = sqlx::query_as(
                "SELECT summary FROM knowledge_nodes WHERE node_type = ? ORDER BY created_at DESC LIMIT 3",
            )
            .bind(&type_str)
            .fetch_all(&self.pool)
            .await?;
            out.push((
                node_type,
                u64::try_from(count).unwrap_or_default(),
                examples.into_iter().map(|(s,)| s).collect(),
            ));
        }
        Ok(out)
    }

    async fn create_symbol(&self, symbol: &CodeSymbol) -> DomainResult<()> {
        sqlx::query(
            r"
            INSERT INTO code_symbols (
                id, name, kind, file_path, start_line, end_line,
                signature, doc_comment, visibility
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(symbol.id.to_string())
        .bind(&symbol.name)
        .bind(symbol.kind.as_str())
        .bind(&symbol.file_path)
        .bind(i64::from(symbol.start_line))
        .bind(i64::from(symbol.end_line))
        .bind(&symbol.signature)
        .bind(&symbol.doc_comment)
        .bind(symbol.visibility.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_symbol(&self, id: Uuid) -> DomainResult<Option<CodeSymbol>> {
        let row = sqlx::query("SELECT * FROM code_symbols WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_symbol).transpose()
    }

    async fn add_symbol_ref(&self, caller_id: Uuid, callee_id: Uuid) -> DomainResult<()> {
        sqlx::query("INSERT OR IGNORE INTO symbol_refs (caller_id, callee_id) VALUES (?, ?)")
            .bind(caller_id.to_string())
            .bind(callee_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_symbols(
        &self,
        name: &str,
        kind: Option<SymbolKind>,
        limit: usize,
    ) -> DomainResult<Vec<CodeSymbol>> {
        let pattern = format!("%{name}%");
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match kind {
            Some(k) => {
                sqlx::query(
                    "SELECT * FROM code_symbols WHERE name LIKE ? AND kind = ? ORDER BY name, file_path LIMIT ?",
                )
                .bind(&pattern)
                .bind(k.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM code_symbols WHERE name LIKE ? ORDER BY name, file_path LIMIT ?",
                )
                .bind(&pattern)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(Self::row_to_symbol).collect()
    }

    async fn callers_of(&self, symbol_id: Uuid) -> DomainResult<Vec<CodeSymbol>> {
        let rows = sqlx::query(
            r"
            SELECT s.* FROM code_symbols s
            JOIN symbol_refs r ON r.caller_id = s.id
            WHERE r.callee_id = ?
            ORDER BY s.name, s.file_path
            ",
        )
        .bind(symbol_id.to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_symbol).collect()
    }
}
