//! Embedding provider port.
//!
//! Embeddings come from an external provider; the core only consumes
//! vectors. When no provider is configured the knowledge service falls
//! back to lexical-only retrieval.

use async_trait::async_trait;

use crate::domain::ports::agents::AgentError;

/// Text embedding provider.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AgentError>;

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;
}
