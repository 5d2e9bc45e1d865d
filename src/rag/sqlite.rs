//! SQLite-backed RAG store implementation.
//!
//! Vectors are stored as little-endian `f32` blobs next to their dimension and
//! model name; similarity is computed in process by the retriever.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::types::Json;
use sqlx::{Row, SqlitePool};

use super::config::RagConfiguration;
use super::store::{DocumentStatus, EmbeddingChunk, RagStore, TrainingDocument};
use super::vector::Embedding;
use crate::core::errors::RagError;

pub struct SqliteRagStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteRagStore {
    pub async fn with_path(db_path: PathBuf, max_connections: u32) -> Result<Self, RagError> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(RagError::storage)?;

        let store = Self { pool, db_path };
        store.init_schema().await?;
        tracing::debug!(path = %store.db_path.display(), "Opened RAG store");
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), RagError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_configurations (
                agent_id TEXT PRIMARY KEY,
                enabled INTEGER NOT NULL,
                chunk_size INTEGER NOT NULL,
                chunk_overlap INTEGER NOT NULL,
                top_k INTEGER NOT NULL,
                similarity_threshold REAL NOT NULL,
                embedding_model TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS training_documents (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                file_name TEXT NOT NULL,
                file_type TEXT NOT NULL DEFAULT '',
                file_size INTEGER NOT NULL DEFAULT 0,
                content TEXT NOT NULL,
                status TEXT NOT NULL,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_training_documents_agent
             ON training_documents(agent_id)",
        )
        .execute(&self.pool)
        .await?;

        // `seq` records insertion order, used as the ranking tie-break.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS embedding_chunks (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                document_id TEXT NOT NULL
                    REFERENCES training_documents(id) ON DELETE CASCADE,
                agent_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                embedding_model TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(document_id, chunk_index)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_embedding_chunks_agent
             ON embedding_chunks(agent_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_embedding_chunks_document
             ON embedding_chunks(document_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_configuration(row: &SqliteRow) -> Result<RagConfiguration, RagError> {
        Ok(RagConfiguration {
            agent_id: row.try_get("agent_id")?,
            enabled: row.try_get("enabled")?,
            chunk_size: to_usize(row.try_get("chunk_size")?),
            chunk_overlap: to_usize(row.try_get("chunk_overlap")?),
            top_k: to_usize(row.try_get("top_k")?),
            similarity_threshold: row.try_get("similarity_threshold")?,
            embedding_model: row.try_get("embedding_model")?,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn row_to_document(row: &SqliteRow) -> Result<TrainingDocument, RagError> {
        let status: String = row.try_get("status")?;
        let file_size: i64 = row.try_get("file_size")?;
        Ok(TrainingDocument {
            id: row.try_get("id")?,
            agent_id: row.try_get("agent_id")?,
            file_name: row.try_get("file_name")?,
            file_type: row.try_get("file_type")?,
            file_size: file_size.max(0) as u64,
            content: row.try_get("content")?,
            status: status.parse()?,
            chunk_count: to_usize(row.try_get("chunk_count")?),
            created_at: parse_timestamp(row.try_get("created_at")?)?,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        })
    }

    fn row_to_chunk(row: &SqliteRow) -> Result<EmbeddingChunk, RagError> {
        let id: String = row.try_get("id")?;
        let blob: Vec<u8> = row.try_get("embedding")?;
        let dimension = to_usize(row.try_get("dimension")?);

        let embedding = match Embedding::from_le_bytes(&blob) {
            Some(embedding) if embedding.dimension() == dimension => embedding,
            _ => {
                tracing::debug!(
                    chunk_id = %id,
                    bytes = blob.len(),
                    dimension,
                    "Stored vector is malformed; treating it as empty"
                );
                Embedding::default()
            }
        };

        // Unparseable metadata is dropped rather than failing the whole listing.
        let metadata = row
            .try_get::<Option<Json<serde_json::Value>>, _>("metadata")
            .ok()
            .flatten()
            .map(|Json(value)| value);

        Ok(EmbeddingChunk {
            id,
            document_id: row.try_get("document_id")?,
            agent_id: row.try_get("agent_id")?,
            chunk_index: to_usize(row.try_get("chunk_index")?),
            content: row.try_get("content")?,
            embedding,
            embedding_model: row.try_get("embedding_model")?,
            metadata,
            created_at: parse_timestamp(row.try_get("created_at")?)?,
        })
    }
}

fn to_usize(value: i64) -> usize {
    value.max(0) as usize
}

fn parse_timestamp(text: String) -> Result<DateTime<Utc>, RagError> {
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RagError::Internal(format!("invalid timestamp '{}': {}", text, e)))
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn get_configuration(
        &self,
        agent_id: &str,
    ) -> Result<Option<RagConfiguration>, RagError> {
        let row = sqlx::query("SELECT * FROM rag_configurations WHERE agent_id = ?1")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_configuration).transpose()
    }

    async fn insert_configuration_if_absent(
        &self,
        config: &RagConfiguration,
    ) -> Result<bool, RagError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO rag_configurations
                (agent_id, enabled, chunk_size, chunk_overlap, top_k,
                 similarity_threshold, embedding_model, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&config.agent_id)
        .bind(config.enabled)
        .bind(config.chunk_size as i64)
        .bind(config.chunk_overlap as i64)
        .bind(config.top_k as i64)
        .bind(config.similarity_threshold)
        .bind(&config.embedding_model)
        .bind(config.created_at.to_rfc3339())
        .bind(config.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn upsert_configuration(&self, config: &RagConfiguration) -> Result<(), RagError> {
        sqlx::query(
            "INSERT INTO rag_configurations
                (agent_id, enabled, chunk_size, chunk_overlap, top_k,
                 similarity_threshold, embedding_model, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(agent_id) DO UPDATE SET
                enabled = excluded.enabled,
                chunk_size = excluded.chunk_size,
                chunk_overlap = excluded.chunk_overlap,
                top_k = excluded.top_k,
                similarity_threshold = excluded.similarity_threshold,
                embedding_model = excluded.embedding_model,
                updated_at = excluded.updated_at",
        )
        .bind(&config.agent_id)
        .bind(config.enabled)
        .bind(config.chunk_size as i64)
        .bind(config.chunk_overlap as i64)
        .bind(config.top_k as i64)
        .bind(config.similarity_threshold)
        .bind(&config.embedding_model)
        .bind(config.created_at.to_rfc3339())
        .bind(config.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_document(&self, document: &TrainingDocument) -> Result<(), RagError> {
        sqlx::query(
            "INSERT INTO training_documents
                (id, agent_id, file_name, file_type, file_size, content,
                 status, chunk_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&document.id)
        .bind(&document.agent_id)
        .bind(&document.file_name)
        .bind(&document.file_type)
        .bind(document.file_size as i64)
        .bind(&document.content)
        .bind(document.status.as_str())
        .bind(document.chunk_count as i64)
        .bind(document.created_at.to_rfc3339())
        .bind(document.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_document(
        &self,
        document_id: &str,
    ) -> Result<Option<TrainingDocument>, RagError> {
        let row = sqlx::query("SELECT * FROM training_documents WHERE id = ?1")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn list_documents(&self, agent_id: &str) -> Result<Vec<TrainingDocument>, RagError> {
        let rows = sqlx::query(
            "SELECT * FROM training_documents
             WHERE agent_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_document).collect()
    }

    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        chunk_count: Option<usize>,
    ) -> Result<bool, RagError> {
        let now = Utc::now().to_rfc3339();
        let result = match chunk_count {
            Some(count) => {
                sqlx::query(
                    "UPDATE training_documents
                     SET status = ?1, chunk_count = ?2, updated_at = ?3
                     WHERE id = ?4",
                )
                .bind(status.as_str())
                .bind(count as i64)
                .bind(&now)
                .bind(document_id)
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE training_documents SET status = ?1, updated_at = ?2 WHERE id = ?3",
                )
                .bind(status.as_str())
                .bind(&now)
                .bind(document_id)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool, RagError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM embedding_chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM training_documents WHERE id = ?1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_chunk(&self, chunk: &EmbeddingChunk) -> Result<(), RagError> {
        sqlx::query(
            "INSERT INTO embedding_chunks
                (id, document_id, agent_id, chunk_index, content, embedding,
                 dimension, embedding_model, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(&chunk.agent_id)
        .bind(chunk.chunk_index as i64)
        .bind(&chunk.content)
        .bind(chunk.embedding.to_le_bytes())
        .bind(chunk.embedding.dimension() as i64)
        .bind(&chunk.embedding_model)
        .bind(chunk.metadata.as_ref().map(Json))
        .bind(chunk.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_chunks_for_document(&self, document_id: &str) -> Result<usize, RagError> {
        let result = sqlx::query("DELETE FROM embedding_chunks WHERE document_id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn list_chunks_for_agent(
        &self,
        agent_id: &str,
    ) -> Result<Vec<EmbeddingChunk>, RagError> {
        let rows = sqlx::query(
            "SELECT c.id, c.document_id, c.agent_id, c.chunk_index, c.content,
                    c.embedding, c.dimension, c.embedding_model, c.metadata, c.created_at
             FROM embedding_chunks c
             JOIN training_documents d ON d.id = c.document_id
             WHERE c.agent_id = ?1 AND d.agent_id = c.agent_id AND d.status = 'completed'
             ORDER BY c.seq ASC",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_chunk).collect()
    }

    async fn count_chunks_for_document(&self, document_id: &str) -> Result<usize, RagError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM embedding_chunks WHERE document_id = ?1")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(to_usize(count))
    }

    async fn delete_agent(&self, agent_id: &str) -> Result<usize, RagError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM embedding_chunks WHERE agent_id = ?1")
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        let documents = sqlx::query("DELETE FROM training_documents WHERE agent_id = ?1")
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM rag_configurations WHERE agent_id = ?1")
            .bind(agent_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(documents.rows_affected() as usize)
    }
}
