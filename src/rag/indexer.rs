//! Document indexing: chunk, embed and store, tracking document status.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde_json::json;

use super::chunker::chunk_text;
use super::config::{load_or_create, RagConfiguration};
use super::embedder::Embedder;
use super::store::{DocumentStatus, EmbeddingChunk, RagStore};
use crate::core::config::RagDefaults;
use crate::core::errors::RagError;

/// Turns document text into stored, embedded chunks.
///
/// Runs for the same document id are serialized; different documents index
/// concurrently. Chunks are written one at a time, so a long run can be
/// interrupted between chunks. On failure the document is marked `failed` and
/// the chunks written by that run are removed.
pub struct Indexer {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    defaults: RagDefaults,
    document_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Indexer {
    pub fn new(store: Arc<dyn RagStore>, embedder: Arc<dyn Embedder>, defaults: RagDefaults) -> Self {
        Self {
            store,
            embedder,
            defaults,
            document_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Indexes `content` for the document and returns the number of chunks.
    ///
    /// Existing chunks of the document are replaced, so this doubles as retry.
    /// `agent_id` must own the document.
    pub async fn process_document(
        &self,
        document_id: &str,
        agent_id: &str,
        content: &str,
    ) -> Result<usize, RagError> {
        let lock = self.document_lock(document_id)?;
        let _release = LockRelease {
            locks: &self.document_locks,
            document_id,
            lock: lock.clone(),
        };
        // Dropped before `_release`, also when this future is cancelled.
        let _guard = lock.lock_owned().await;

        self.process_locked(document_id, agent_id, content).await
    }

    async fn process_locked(
        &self,
        document_id: &str,
        agent_id: &str,
        content: &str,
    ) -> Result<usize, RagError> {
        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| RagError::NotFound(format!("document {}", document_id)))?;
        if document.agent_id != agent_id {
            return Err(RagError::BadRequest(format!(
                "document {} does not belong to agent {}",
                document_id, agent_id
            )));
        }

        let config = load_or_create(
            self.store.as_ref(),
            agent_id,
            &self.defaults,
            self.embedder.model_name(),
        )
        .await?;

        if !self
            .store
            .update_document_status(document_id, DocumentStatus::Processing, None)
            .await?
        {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }
        tracing::info!(document_id, agent_id, "Processing document");

        let outcome = async {
            let chunk_count = self
                .write_chunks(document_id, agent_id, content, &config)
                .await?;
            if !self
                .store
                .update_document_status(
                    document_id,
                    DocumentStatus::Completed,
                    Some(chunk_count),
                )
                .await?
            {
                return Err(RagError::NotFound(format!("document {}", document_id)));
            }
            Ok::<usize, RagError>(chunk_count)
        }
        .await;

        match outcome {
            Ok(chunk_count) => {
                tracing::info!(document_id, agent_id, chunk_count, "Document indexed");
                Ok(chunk_count)
            }
            Err(err) => {
                tracing::error!(document_id, agent_id, error = %err, "Document processing failed");
                if let Err(cleanup) = self.store.delete_chunks_for_document(document_id).await {
                    tracing::warn!(
                        document_id,
                        error = %cleanup,
                        "Failed to remove chunks of failed run"
                    );
                }
                if let Err(status_err) = self
                    .store
                    .update_document_status(document_id, DocumentStatus::Failed, Some(0))
                    .await
                {
                    tracing::warn!(
                        document_id,
                        error = %status_err,
                        "Failed to mark document as failed"
                    );
                }
                Err(err)
            }
        }
    }

    async fn write_chunks(
        &self,
        document_id: &str,
        agent_id: &str,
        content: &str,
        config: &RagConfiguration,
    ) -> Result<usize, RagError> {
        let removed = self.store.delete_chunks_for_document(document_id).await?;
        if removed > 0 {
            tracing::debug!(document_id, removed, "Removed chunks from previous run");
        }

        if config.overlap_blocks_sliding() {
            tracing::warn!(
                agent_id,
                chunk_size = config.chunk_size,
                chunk_overlap = config.chunk_overlap,
                "chunk_overlap >= chunk_size; only the first window of each document is indexed"
            );
        }
        if config.embedding_model != self.embedder.model_name() {
            tracing::warn!(
                agent_id,
                configured = %config.embedding_model,
                active = %self.embedder.model_name(),
                "Agent configuration names a different embedding model than the active embedder"
            );
        }

        let chunks = chunk_text(content, config.chunk_size, config.chunk_overlap);
        let expected_dimension = self.embedder.dimension();

        for chunk in &chunks {
            let embedding = self.embedder.embed(&chunk.text).await?;
            embedding.ensure_dimension(expected_dimension)?;

            let record = EmbeddingChunk {
                id: uuid::Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                agent_id: agent_id.to_string(),
                chunk_index: chunk.chunk_index,
                content: chunk.text.clone(),
                embedding,
                embedding_model: self.embedder.model_name().to_string(),
                metadata: Some(json!({
                    "length": chunk.char_len(),
                    "start_offset": chunk.start_offset,
                })),
                created_at: Utc::now(),
            };
            self.store.insert_chunk(&record).await?;
        }

        Ok(chunks.len())
    }

    fn document_lock(&self, document_id: &str) -> Result<Arc<tokio::sync::Mutex<()>>, RagError> {
        let mut locks = self.document_locks.lock().map_err(RagError::internal)?;
        Ok(locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }
}

/// Drops the document's entry from the lock map once no other run holds or
/// awaits it.
struct LockRelease<'a> {
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    document_id: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for LockRelease<'_> {
    fn drop(&mut self) {
        if let Ok(mut locks) = self.locks.lock() {
            // Two references: the map's and ours. Anything more is another run.
            if Arc::strong_count(&self.lock) <= 2 {
                locks.remove(self.document_id);
            }
        }
    }
}
