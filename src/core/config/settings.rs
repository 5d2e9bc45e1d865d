use serde::{Deserialize, Serialize};

/// Typed view of the merged configuration tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    pub embedding: EmbeddingSettings,
    pub rag_defaults: RagDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    /// Also write a daily-rolling log file under the data directory.
    pub file: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    pub db_file: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Character-frequency histogram. Deterministic, not semantic.
    Placeholder,
    /// Any server exposing an OpenAI-style `/v1/embeddings` endpoint.
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Values used when an agent's RAG configuration is created lazily.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagDefaults {
    pub enabled: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub similarity_threshold: f64,
}

impl Default for RagDefaults {
    fn default() -> Self {
        use super::defaults::*;
        Self {
            enabled: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}
