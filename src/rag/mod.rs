//! RAG (Retrieval-Augmented Generation) module.
//!
//! Indexing: document text is split by the `chunker`, embedded by an
//! `Embedder` and written to a `RagStore` by the `Indexer`.
//! Querying: the `Retriever` scores an agent's chunks against the query and
//! `augment` folds the winners into the prompt.

pub mod augmenter;
pub mod chunker;
pub mod config;
pub mod embedder;
pub mod indexer;
pub mod retriever;
pub mod service;
pub mod sqlite;
pub mod store;
pub mod vector;

pub use augmenter::augment;
pub use chunker::{chunk_text, TextChunk};
pub use config::{RagConfiguration, RagConfigurationUpdate};
pub use embedder::{build_embedder, CharFrequencyEmbedder, Embedder, OpenAiCompatibleEmbedder};
pub use indexer::Indexer;
pub use retriever::{RetrievedChunk, Retriever, CONTEXT_SEPARATOR};
pub use service::RagService;
pub use sqlite::SqliteRagStore;
pub use store::{DocumentStatus, EmbeddingChunk, NewDocument, RagStore, TrainingDocument};
pub use vector::{cosine_similarity, try_cosine_similarity, Embedding};
