//! Text embedding strategies.
//!
//! Indexing and retrieval only see the [`Embedder`] trait; which strategy backs
//! it is chosen by the `embedding.provider` setting.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::vector::Embedding;
use crate::core::config::{EmbeddingProvider, EmbeddingSettings};
use crate::core::errors::RagError;

/// Maps text to a fixed-length vector.
///
/// Implementations must be deterministic for identical input and return
/// vectors of [`Embedder::dimension`] for every call.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding, RagError>;

    fn dimension(&self) -> usize;

    /// Identifier recorded on every stored chunk.
    fn model_name(&self) -> &str;
}

pub const CHAR_FREQUENCY_MODEL: &str = "char-frequency-128";
const CHAR_FREQUENCY_DIMENSION: usize = 128;

/// Character-frequency histogram of the lowercased text, L2-normalized.
///
/// Cheap and deterministic but carries no meaning beyond shared letters. Useful
/// for tests and offline runs; use [`OpenAiCompatibleEmbedder`] for real retrieval.
#[derive(Debug, Clone, Default)]
pub struct CharFrequencyEmbedder;

impl CharFrequencyEmbedder {
    pub fn new() -> Self {
        Self
    }

    pub fn embed_sync(&self, text: &str) -> Embedding {
        let mut histogram = vec![0.0f32; CHAR_FREQUENCY_DIMENSION];
        for c in text.chars().flat_map(char::to_lowercase) {
            histogram[c as usize % CHAR_FREQUENCY_DIMENSION] += 1.0;
        }
        Embedding::new(histogram).normalized()
    }
}

#[async_trait]
impl Embedder for CharFrequencyEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, RagError> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        CHAR_FREQUENCY_DIMENSION
    }

    fn model_name(&self) -> &str {
        CHAR_FREQUENCY_MODEL
    }
}

/// Calls an OpenAI-style `POST {base_url}/v1/embeddings` endpoint
/// (LM Studio, llama.cpp server, Ollama, hosted APIs).
#[derive(Clone)]
pub struct OpenAiCompatibleEmbedder {
    base_url: String,
    model: String,
    dimension: usize,
    api_key: Option<String>,
    client: Client,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsItem>,
}

#[derive(Deserialize)]
struct EmbeddingsItem {
    embedding: Vec<f32>,
}

impl OpenAiCompatibleEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self, RagError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(RagError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dimension: settings.dimension,
            api_key: settings.api_key.clone(),
            client,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiCompatibleEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding, RagError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": [text],
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(RagError::embedding)?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(RagError::Embedding(format!(
                "embedding endpoint returned {}: {}",
                status, text
            )));
        }

        let payload: EmbeddingsResponse = res.json().await.map_err(RagError::embedding)?;
        let embedding = payload
            .data
            .into_iter()
            .next()
            .map(|item| Embedding::new(item.embedding))
            .ok_or_else(|| RagError::Embedding("no embedding in response".to_string()))?;

        embedding.ensure_dimension(self.dimension)?;
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Builds the embedder named by `embedding.provider`.
pub fn build_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>, RagError> {
    match settings.provider {
        EmbeddingProvider::Placeholder => {
            tracing::info!(
                model = CHAR_FREQUENCY_MODEL,
                "Using placeholder character-frequency embedder"
            );
            Ok(Arc::new(CharFrequencyEmbedder::new()))
        }
        EmbeddingProvider::OpenaiCompatible => {
            tracing::info!(
                base_url = %settings.base_url,
                model = %settings.model,
                dimension = settings.dimension,
                "Using OpenAI-compatible embedding endpoint"
            );
            Ok(Arc::new(OpenAiCompatibleEmbedder::new(settings)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_has_constant_dimension() {
        let embedder = CharFrequencyEmbedder::new();
        let long = "long text ".repeat(500);
        for text in ["", "a", "hello world", long.as_str(), "日本語"] {
            let v = embedder.embed(text).await.unwrap();
            assert_eq!(v.dimension(), embedder.dimension());
        }
    }

    #[tokio::test]
    async fn placeholder_empty_text_is_zero_vector() {
        let v = CharFrequencyEmbedder::new().embed("").await.unwrap();
        assert!(v.is_zero());
    }

    #[tokio::test]
    async fn placeholder_is_deterministic_and_case_insensitive() {
        let embedder = CharFrequencyEmbedder::new();
        let a = embedder.embed("The Quick Brown Fox").await.unwrap();
        let b = embedder.embed("the quick brown fox").await.unwrap();
        let c = embedder.embed("The Quick Brown Fox").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[tokio::test]
    async fn placeholder_output_is_unit_length() {
        let v = CharFrequencyEmbedder::new()
            .embed("retrieval augmented generation")
            .await
            .unwrap();
        assert!((v.norm() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn build_embedder_selects_placeholder() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProvider::Placeholder,
            base_url: String::new(),
            model: "ignored".to_string(),
            dimension: 768,
            timeout_secs: 5,
            api_key: None,
        };
        let embedder = build_embedder(&settings).unwrap();
        assert_eq!(embedder.model_name(), CHAR_FREQUENCY_MODEL);
        assert_eq!(embedder.dimension(), 128);
    }

    #[test]
    fn build_embedder_selects_http_endpoint() {
        let settings = EmbeddingSettings {
            provider: EmbeddingProvider::OpenaiCompatible,
            base_url: "http://127.0.0.1:1234/".to_string(),
            model: "nomic-embed-text".to_string(),
            dimension: 768,
            timeout_secs: 5,
            api_key: None,
        };
        let embedder = build_embedder(&settings).unwrap();
        assert_eq!(embedder.model_name(), "nomic-embed-text");
        assert_eq!(embedder.dimension(), 768);
    }
}
