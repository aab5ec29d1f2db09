//! Knowledge-grounded context retrieval.
//!
//! Hybrid search over the knowledge store: an optional query rewrite,
//! lexical and vector legs fused by weighted sum, and an optional
//! workspace expansion pass. The vector leg only runs when an embedder
//! is configured and nodes carry embeddings; retrieval degrades to
//! lexical-only otherwise.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    KnowledgeConfig, KnowledgeNode, NodeType, NodeTypeSummary, ProjectSummary, ScoredNode,
};
use crate::domain::ports::{AnswerSynthesizer, Embedder, KnowledgeRepository};
use crate::services::enricher::tokenize;

/// Context blob produced for a goal, with the strategy that built it.
#[derive(Debug, Clone)]
pub struct RetrievedContext {
    pub context: String,
    pub strategy: String,
}

/// Hybrid lexical/vector retrieval over architectural knowledge.
pub struct KnowledgeService {
    repo: Arc<dyn KnowledgeRepository>,
    embedder: Option<Arc<dyn Embedder>>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
    config: KnowledgeConfig,
}

impl KnowledgeService {
    pub fn new(repo: Arc<dyn KnowledgeRepository>, config: KnowledgeConfig) -> Self {
        Self {
            repo,
            embedder: None,
            synthesizer: None,
            config,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Rewrite a query into search terms, or pass tokens through
    /// unchanged when rewriting is disabled.
    fn query_terms(&self, query: &str) -> Vec<String> {
        let tokens = tokenize(query);
        if !self.config.rewrite_queries {
            return tokens;
        }
        let mut seen = std::collections::HashSet::new();
        tokens
            .into_iter()
            .filter(|t| t.chars().count() >= 2)
            .filter(|t| !crate::services::enricher::STOPWORDS.contains(&t.as_str()))
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    /// Hybrid search: lexical + vector fusion, optionally expanded with
    /// workspace-adjacent nodes at a score discount.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: usize) -> DomainResult<Vec<ScoredNode>> {
        let terms = self.query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        // Overfetch the lexical leg so fusion has candidates to reorder.
        let lexical = self
            .repo
            .search_lexical(&terms, limit.saturating_mul(4))
            .await?;

        let mut fused: HashMap<Uuid, ScoredNode> = HashMap::new();
        for hit in lexical {
            fused.insert(
                hit.node.id,
                ScoredNode {
                    score: hit.score * self.config.lexical_weight,
                    node: hit.node,
                },
            );
        }

        if let Some(vector_hits) = self.vector_leg(query).await? {
            for (node, score) in vector_hits {
                let weighted = score * self.config.vector_weight;
                fused
                    .entry(node.id)
                    .and_modify(|existing| existing.score += weighted)
                    .or_insert(ScoredNode {
                        node,
                        score: weighted,
                    });
            }
        }

        let mut results: Vec<ScoredNode> = fused.into_values().collect();
        sort_scored(&mut results);
        results.truncate(limit);

        if self.config.graph_expansion {
            self.expand_by_workspace(&mut results, limit).await?;
        }

        debug!(hits = results.len(), "knowledge search complete");
        Ok(results)
    }

    /// Search restricted to one node type.
    pub async fn search_by_type(
        &self,
        query: &str,
        node_type: NodeType,
        limit: usize,
    ) -> DomainResult<Vec<ScoredNode>> {
        let terms = self.query_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        self.repo
            .search_lexical_by_type(&terms, node_type, limit)
            .await
    }

    /// Cosine-scored nodes when an embedder is available; `None` when
    /// the vector leg cannot run.
    async fn vector_leg(&self, query: &str) -> DomainResult<Option<Vec<(KnowledgeNode, f32)>>> {
        let Some(embedder) = &self.embedder else {
            return Ok(None);
        };

        let query_vec = match embedder.embed(query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "embedding failed, falling back to lexical-only");
                return Ok(None);
            }
        };

        let nodes = self.repo.list_with_embeddings().await?;
        let scored = nodes
            .into_iter()
            .filter_map(|node| {
                let score = node
                    .embedding
                    .as_ref()
                    .map(|emb| cosine_similarity(&query_vec, emb))?;
                (score > 0.0).then_some((node, score))
            })
            .collect();
        Ok(Some(scored))
    }

    /// Pull nodes sharing a workspace with the top hits, discounted.
    async fn expand_by_workspace(
        &self,
        results: &mut Vec<ScoredNode>,
        limit: usize,
    ) -> DomainResult<()> {
        let present: std::collections::HashSet<Uuid> =
            results.iter().map(|r| r.node.id).collect();
        let workspaces: std::collections::HashSet<String> = results
            .iter()
            .take(3)
            .map(|r| r.node.workspace.clone())
            .collect();

        let floor = results.last().map_or(0.0, |r| r.score);
        for workspace in workspaces {
            let neighbours = self.repo.list_by_workspace(&workspace, limit).await?;
            for node in neighbours {
                if !present.contains(&node.id) {
                    results.push(ScoredNode {
                        score: floor * self.config.expansion_discount,
                        node,
                    });
                }
            }
        }

        sort_scored(results);
        results.truncate(limit.saturating_mul(2));
        Ok(())
    }

    /// Build a markdown context blob for a goal, choosing a coarse
    /// retrieval strategy from the goal's wording.
    #[instrument(skip(self))]
    pub async fn retrieve_context(&self, goal: &str) -> DomainResult<RetrievedContext> {
        let strategy = choose_strategy(goal);

        let nodes = match strategy {
            "constraint-led" => {
                let mut hits = self
                    .search_by_type(goal, NodeType::Constraint, 5)
                    .await?;
                hits.extend(self.search(goal, 5).await?);
                hits
            }
            "pattern-led" => {
                let mut hits = self.search_by_type(goal, NodeType::Pattern, 5).await?;
                hits.extend(self.search(goal, 5).await?);
                hits
            }
            _ => self.search(goal, 8).await?,
        };

        let mut seen = std::collections::HashSet::new();
        let mut context = String::new();
        for hit in &nodes {
            if !seen.insert(hit.node.id) {
                continue;
            }
            context.push_str(&format!(
                "- [{}] {}: {}\n",
                hit.node.node_type, hit.node.summary, hit.node.content
            ));
        }

        Ok(RetrievedContext {
            context,
            strategy: strategy.to_string(),
        })
    }

    /// Synthesise an answer from retrieved nodes. Uses the configured
    /// synthesizer when present, else a deterministic digest.
    pub async fn ask(&self, query: &str, nodes: &[ScoredNode]) -> DomainResult<String> {
        let context: String = nodes
            .iter()
            .map(|hit| format!("[{}] {}: {}\n", hit.node.node_type, hit.node.summary, hit.node.content))
            .collect();

        if let Some(synthesizer) = &self.synthesizer {
            match synthesizer.synthesize(query, &context).await {
                Ok(answer) => return Ok(answer),
                Err(e) => {
                    warn!(error = %e, "answer synthesis failed, using digest");
                }
            }
        }

        if nodes.is_empty() {
            return Ok(format!("No recorded knowledge matches \"{query}\"."));
        }
        let digest: Vec<String> = nodes
            .iter()
            .take(3)
            .map(|hit| hit.node.summary.clone())
            .collect();
        Ok(format!("Most relevant to \"{query}\": {}", digest.join("; ")))
    }

    /// Counts and example summaries per node type.
    pub async fn get_project_summary(&self) -> DomainResult<ProjectSummary> {
        let per_type = self.repo.summarize_by_type().await?;
        let mut summary = ProjectSummary::default();
        for (node_type, count, examples) in per_type {
            summary.total += count;
            summary
                .types
                .insert(node_type.as_str().to_string(), NodeTypeSummary { count, examples });
        }
        Ok(summary)
    }
}

fn sort_scored(results: &mut [ScoredNode]) {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.node.id.cmp(&b.node.id))
    });
}

/// Coarse retrieval strategy from goal wording.
fn choose_strategy(goal: &str) -> &'static str {
    let goal = goal.to_lowercase();
    if ["must", "constraint", "require", "limit", "compliance"]
        .iter()
        .any(|w| goal.contains(w))
    {
        "constraint-led"
    } else if ["pattern", "architecture", "design", "structure"]
        .iter()
        .any(|w| goal.contains(w))
    {
        "pattern-led"
    } else {
        "broad"
    }
}

/// Cosine similarity with a zero-magnitude guard.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}
