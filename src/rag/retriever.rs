//! Query-time retrieval of the most relevant chunks for an agent.

use std::cmp::Ordering;
use std::sync::Arc;

use super::config::RagConfiguration;
use super::embedder::Embedder;
use super::store::{EmbeddingChunk, RagStore};
use super::vector::{cosine_similarity, Embedding};
use crate::core::config::RagDefaults;
use crate::core::errors::RagError;

/// Separator placed between chunk contents in the context block.
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// A chunk that cleared the similarity threshold.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: EmbeddingChunk,
    pub score: f64,
}

/// Read-only: never writes to the store, not even a default configuration.
pub struct Retriever {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    defaults: RagDefaults,
}

impl Retriever {
    pub fn new(store: Arc<dyn RagStore>, embedder: Arc<dyn Embedder>, defaults: RagDefaults) -> Self {
        Self {
            store,
            embedder,
            defaults,
        }
    }

    /// Stored configuration, or the defaults if the agent has none yet.
    async fn configuration(&self, agent_id: &str) -> Result<RagConfiguration, RagError> {
        Ok(self
            .store
            .get_configuration(agent_id)
            .await?
            .unwrap_or_else(|| {
                RagConfiguration::from_defaults(agent_id, &self.defaults, self.embedder.model_name())
            }))
    }

    /// Ranked chunks for `query`: threshold filter, then score descending
    /// (ties keep insertion order), then the first `top_k`.
    ///
    /// Errors only for infrastructure failures (store or embedding service).
    pub async fn retrieve(
        &self,
        agent_id: &str,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        let config = self.configuration(agent_id).await?;
        if !config.enabled {
            tracing::debug!(agent_id, "RAG disabled; skipping retrieval");
            return Ok(Vec::new());
        }

        let chunks = self.store.list_chunks_for_agent(agent_id).await?;
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(query).await?;
        let candidates = chunks.len();
        let ranked = rank_chunks(
            &query_embedding,
            self.embedder.model_name(),
            chunks,
            config.similarity_threshold,
            config.top_k,
        );

        tracing::debug!(
            agent_id,
            candidates,
            selected = ranked.len(),
            threshold = config.similarity_threshold,
            top_k = config.top_k,
            "Retrieved context chunks"
        );
        Ok(ranked)
    }

    /// Context block for `query`, or `None` when retrieval contributes nothing.
    pub async fn retrieve_context(
        &self,
        agent_id: &str,
        query: &str,
    ) -> Result<Option<String>, RagError> {
        let ranked = self.retrieve(agent_id, query).await?;
        Ok(join_context(&ranked))
    }
}

/// Scores every chunk against the query and keeps the best `top_k` above
/// `threshold`.
///
/// Chunks embedded by a different model than `model_name` score 0.
pub fn rank_chunks(
    query: &Embedding,
    model_name: &str,
    chunks: Vec<EmbeddingChunk>,
    threshold: f64,
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let mut scored: Vec<RetrievedChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let score = if chunk.embedding_model == model_name {
                cosine_similarity(query, &chunk.embedding)
            } else {
                0.0
            };
            RetrievedChunk { chunk, score }
        })
        .filter(|rc| rc.score >= threshold)
        .collect();

    // Stable sort: equal scores keep insertion order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    scored
}

pub fn join_context(ranked: &[RetrievedChunk]) -> Option<String> {
    if ranked.is_empty() {
        return None;
    }
    Some(
        ranked
            .iter()
            .map(|rc| rc.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn chunk(index: usize, content: &str, vector: Vec<f32>) -> EmbeddingChunk {
        EmbeddingChunk {
            id: format!("c{}", index),
            document_id: "d1".to_string(),
            agent_id: "a1".to_string(),
            chunk_index: index,
            content: content.to_string(),
            embedding: Embedding::new(vector),
            embedding_model: "m".to_string(),
            metadata: None,
            created_at: Utc::now(),
        }
    }

    fn ids(ranked: &[RetrievedChunk]) -> Vec<&str> {
        ranked.iter().map(|rc| rc.chunk.id.as_str()).collect()
    }

    #[test]
    fn ranks_by_score_and_truncates_to_top_k() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let chunks = vec![
            chunk(0, "weak", vec![0.8, 0.6]),
            chunk(1, "exact", vec![1.0, 0.0]),
            chunk(2, "orthogonal", vec![0.0, 1.0]),
            chunk(3, "close", vec![0.99, 0.1]),
        ];

        let ranked = rank_chunks(&query, "m", chunks, 0.0, 2);
        assert_eq!(ids(&ranked), vec!["c1", "c3"]);
    }

    #[test]
    fn threshold_is_applied_before_top_k() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let chunks = vec![
            chunk(0, "a", vec![1.0, 0.0]),
            chunk(1, "b", vec![0.5, 0.5]),
            chunk(2, "c", vec![0.0, 1.0]),
        ];

        let ranked = rank_chunks(&query, "m", chunks, 0.9, 3);
        assert_eq!(ids(&ranked), vec!["c0"]);
        assert!(ranked.iter().all(|rc| rc.score >= 0.9));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let chunks = vec![
            chunk(0, "low-a", vec![0.6, 0.8]),
            chunk(1, "high-a", vec![1.0, 0.0]),
            chunk(2, "high-b", vec![1.0, 0.0]),
            chunk(3, "low-b", vec![0.6, 0.8]),
        ];

        let ranked = rank_chunks(&query, "m", chunks, 0.5, 4);
        assert_eq!(ids(&ranked), vec!["c1", "c2", "c0", "c3"]);
    }

    #[test]
    fn malformed_and_foreign_vectors_score_zero() {
        let query = Embedding::new(vec![1.0, 0.0]);
        let mut foreign = chunk(2, "foreign", vec![1.0, 0.0]);
        foreign.embedding_model = "other".to_string();
        let chunks = vec![
            chunk(0, "empty", vec![]),
            chunk(1, "short", vec![1.0]),
            foreign,
            chunk(3, "zero", vec![0.0, 0.0]),
        ];

        let ranked = rank_chunks(&query, "m", chunks, 0.0, 10);
        assert!(ranked.iter().all(|rc| rc.score == 0.0));
        assert!(rank_chunks(&query, "m", Vec::new(), 0.0, 10).is_empty());
    }

    #[test]
    fn context_is_joined_with_blank_lines() {
        let ranked = vec![
            RetrievedChunk {
                chunk: chunk(0, "first passage", vec![1.0]),
                score: 0.9,
            },
            RetrievedChunk {
                chunk: chunk(1, "second passage", vec![1.0]),
                score: 0.8,
            },
        ];

        assert_eq!(
            join_context(&ranked).unwrap(),
            "first passage\n\nsecond passage"
        );
        assert_eq!(join_context(&[]), None);
    }
}
