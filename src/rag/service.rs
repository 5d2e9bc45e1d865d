//! RagService: the operations the chat flow and upload handling call into.

use std::sync::Arc;

use super::augmenter::augment;
use super::config::{load_or_create, RagConfiguration, RagConfigurationUpdate};
use super::embedder::Embedder;
use super::indexer::Indexer;
use super::retriever::{RetrievedChunk, Retriever};
use super::store::{NewDocument, RagStore, TrainingDocument};
use crate::core::config::RagDefaults;
use crate::core::errors::RagError;

pub struct RagService {
    store: Arc<dyn RagStore>,
    embedder: Arc<dyn Embedder>,
    defaults: RagDefaults,
    indexer: Indexer,
    retriever: Retriever,
}

impl RagService {
    pub fn new(store: Arc<dyn RagStore>, embedder: Arc<dyn Embedder>, defaults: RagDefaults) -> Self {
        let indexer = Indexer::new(store.clone(), embedder.clone(), defaults.clone());
        let retriever = Retriever::new(store.clone(), embedder.clone(), defaults.clone());
        Self {
            store,
            embedder,
            defaults,
            indexer,
            retriever,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub async fn get_configuration(&self, agent_id: &str) -> Result<RagConfiguration, RagError> {
        load_or_create(
            self.store.as_ref(),
            agent_id,
            &self.defaults,
            self.embedder.model_name(),
        )
        .await
    }

    pub async fn update_configuration(
        &self,
        agent_id: &str,
        update: &RagConfigurationUpdate,
    ) -> Result<RagConfiguration, RagError> {
        let current = self.get_configuration(agent_id).await?;
        if update.is_empty() {
            return Ok(current);
        }

        let updated = update.apply_to(&current)?;
        if updated.overlap_blocks_sliding() {
            tracing::warn!(
                agent_id,
                chunk_size = updated.chunk_size,
                chunk_overlap = updated.chunk_overlap,
                "chunk_overlap >= chunk_size disables the sliding window"
            );
        }
        self.store.upsert_configuration(&updated).await?;
        tracing::info!(agent_id, "Updated RAG configuration");
        Ok(updated)
    }

    /// Records an upload in `pending` state without indexing it.
    pub async fn upload_document(
        &self,
        agent_id: &str,
        upload: NewDocument,
    ) -> Result<TrainingDocument, RagError> {
        let document = TrainingDocument::pending(agent_id, upload);
        self.store.insert_document(&document).await?;
        tracing::info!(
            agent_id,
            document_id = %document.id,
            file_name = %document.file_name,
            "Document uploaded"
        );
        Ok(document)
    }

    /// Indexes a stored document. Also used to retry a failed one.
    pub async fn process_document(&self, document_id: &str) -> Result<TrainingDocument, RagError> {
        let document = self.require_document(document_id).await?;
        self.indexer
            .process_document(&document.id, &document.agent_id, &document.content)
            .await?;
        self.require_document(document_id).await
    }

    /// Re-indexes an existing document, replacing its chunks.
    pub async fn reprocess_document(&self, document_id: &str) -> Result<TrainingDocument, RagError> {
        let document = self.require_document(document_id).await?;
        tracing::info!(
            document_id,
            agent_id = %document.agent_id,
            previous_status = %document.status,
            "Reprocessing document"
        );
        self.process_document(document_id).await
    }

    pub async fn upload_and_process(
        &self,
        agent_id: &str,
        upload: NewDocument,
    ) -> Result<TrainingDocument, RagError> {
        let document = self.upload_document(agent_id, upload).await?;
        self.process_document(&document.id).await
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Option<TrainingDocument>, RagError> {
        self.store.get_document(document_id).await
    }

    pub async fn list_documents(&self, agent_id: &str) -> Result<Vec<TrainingDocument>, RagError> {
        self.store.list_documents(agent_id).await
    }

    /// Deletes the document and its chunks.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), RagError> {
        if !self.store.delete_document(document_id).await? {
            return Err(RagError::NotFound(format!("document {}", document_id)));
        }
        tracing::info!(document_id, "Document deleted");
        Ok(())
    }

    /// Removes everything stored for the agent. Returns the number of documents removed.
    pub async fn delete_agent(&self, agent_id: &str) -> Result<usize, RagError> {
        let removed = self.store.delete_agent(agent_id).await?;
        tracing::info!(agent_id, documents = removed, "Agent RAG data deleted");
        Ok(removed)
    }

    pub async fn retrieve(
        &self,
        agent_id: &str,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>, RagError> {
        self.retriever.retrieve(agent_id, query).await
    }

    pub async fn retrieve_context(
        &self,
        agent_id: &str,
        query: &str,
    ) -> Result<Option<String>, RagError> {
        self.retriever.retrieve_context(agent_id, query).await
    }

    /// Prompt for the language model. Retrieval failures are logged and the
    /// message goes out without context rather than failing the chat turn.
    pub async fn prepare_prompt(&self, agent_id: &str, message: &str) -> String {
        let context = match self.retrieve_context(agent_id, message).await {
            Ok(context) => context,
            Err(err) => {
                tracing::warn!(agent_id, error = %err, "Context retrieval failed; continuing without RAG");
                None
            }
        };
        augment(message, context.as_deref())
    }

    async fn require_document(&self, document_id: &str) -> Result<TrainingDocument, RagError> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| RagError::NotFound(format!("document {}", document_id)))
    }
}
