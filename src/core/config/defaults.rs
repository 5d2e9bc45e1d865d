use serde_json::{json, Value};

pub const DEFAULT_CHUNK_SIZE: usize = 512;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;
pub const PLACEHOLDER_DIMENSION: usize = 128;

/// Built-in settings; the user's config.yml is merged over this tree.
pub fn default_settings() -> Value {
    json!({
        "logging": {
            "level": "info",
            "file": true
        },
        "storage": {
            "db_file": "rag.db",
            "max_connections": 4
        },
        "embedding": {
            "provider": "placeholder",
            "base_url": "http://127.0.0.1:1234",
            "model": "text-embedding-nomic-embed-text-v1.5",
            "dimension": PLACEHOLDER_DIMENSION,
            "timeout_secs": 30
        },
        "rag_defaults": {
            "enabled": true,
            "chunk_size": DEFAULT_CHUNK_SIZE,
            "chunk_overlap": DEFAULT_CHUNK_OVERLAP,
            "top_k": DEFAULT_TOP_K,
            "similarity_threshold": DEFAULT_SIMILARITY_THRESHOLD
        }
    })
}
