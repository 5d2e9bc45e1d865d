//! RagStore trait and the records it persists.
//!
//! Every operation is scoped by agent or document id; agents never share rows.
//! The primary implementation is `SqliteRagStore` in the `sqlite` module.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::RagConfiguration;
use super::vector::Embedding;
use crate::core::errors::RagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentStatus::Pending),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(RagError::Internal(format!(
                "unknown document status '{}'",
                other
            ))),
        }
    }
}

/// An uploaded document whose text has already been extracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDocument {
    pub id: String,
    pub agent_id: String,
    pub file_name: String,
    pub file_type: String,
    /// Size of the original upload in bytes.
    pub file_size: u64,
    pub content: String,
    pub status: DocumentStatus,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Upload payload handed over by the file ingestion boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub file_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub content: String,
}

impl TrainingDocument {
    pub fn pending(agent_id: &str, upload: NewDocument) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            file_name: upload.file_name,
            file_type: upload.file_type,
            file_size: upload.file_size,
            content: upload.content,
            status: DocumentStatus::Pending,
            chunk_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One embedded window of a document. Never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingChunk {
    pub id: String,
    pub document_id: String,
    pub agent_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub embedding: Embedding,
    pub embedding_model: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Abstract trait for RAG storage backends.
#[async_trait]
pub trait RagStore: Send + Sync {
    async fn get_configuration(&self, agent_id: &str)
        -> Result<Option<RagConfiguration>, RagError>;

    /// Returns `false` when the agent already had a configuration.
    async fn insert_configuration_if_absent(
        &self,
        config: &RagConfiguration,
    ) -> Result<bool, RagError>;

    async fn upsert_configuration(&self, config: &RagConfiguration) -> Result<(), RagError>;

    async fn insert_document(&self, document: &TrainingDocument) -> Result<(), RagError>;

    async fn get_document(&self, document_id: &str)
        -> Result<Option<TrainingDocument>, RagError>;

    /// Newest first.
    async fn list_documents(&self, agent_id: &str) -> Result<Vec<TrainingDocument>, RagError>;

    /// Returns `false` when no such document exists.
    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        chunk_count: Option<usize>,
    ) -> Result<bool, RagError>;

    /// Deletes the document and all of its chunks in one transaction.
    async fn delete_document(&self, document_id: &str) -> Result<bool, RagError>;

    async fn insert_chunk(&self, chunk: &EmbeddingChunk) -> Result<(), RagError>;

    async fn delete_chunks_for_document(&self, document_id: &str) -> Result<usize, RagError>;

    /// Chunks of the agent's `completed` documents, in insertion order.
    async fn list_chunks_for_agent(&self, agent_id: &str)
        -> Result<Vec<EmbeddingChunk>, RagError>;

    async fn count_chunks_for_document(&self, document_id: &str) -> Result<usize, RagError>;

    /// Removes the agent's configuration, documents and chunks. Returns the
    /// number of documents removed.
    async fn delete_agent(&self, agent_id: &str) -> Result<usize, RagError>;
}
