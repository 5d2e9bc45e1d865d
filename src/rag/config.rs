//! Per-agent RAG configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::RagStore;
use crate::core::config::RagDefaults;
use crate::core::errors::RagError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagConfiguration {
    pub agent_id: String,
    pub enabled: bool,
    /// Window size in characters.
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    /// Minimum cosine similarity, in `[0, 1]`.
    pub similarity_threshold: f64,
    pub embedding_model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RagConfiguration {
    pub fn from_defaults(agent_id: &str, defaults: &RagDefaults, embedding_model: &str) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.to_string(),
            enabled: defaults.enabled,
            chunk_size: defaults.chunk_size,
            chunk_overlap: defaults.chunk_overlap,
            top_k: defaults.top_k,
            similarity_threshold: defaults.similarity_threshold,
            embedding_model: embedding_model.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// True when the window cannot slide (`overlap >= chunk_size`).
    pub fn overlap_blocks_sliding(&self) -> bool {
        self.chunk_overlap >= self.chunk_size
    }

    pub fn validate(&self) -> Result<(), RagError> {
        if self.chunk_size == 0 {
            return Err(RagError::BadRequest(
                "chunk_size must be greater than 0".to_string(),
            ));
        }
        if self.top_k == 0 {
            return Err(RagError::BadRequest(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagError::BadRequest(format!(
                "similarity_threshold must be between 0 and 1, got {}",
                self.similarity_threshold
            )));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(RagError::BadRequest(
                "embedding_model cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfigurationUpdate {
    pub enabled: Option<bool>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    pub top_k: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub embedding_model: Option<String>,
}

impl RagConfigurationUpdate {
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.chunk_size.is_none()
            && self.chunk_overlap.is_none()
            && self.top_k.is_none()
            && self.similarity_threshold.is_none()
            && self.embedding_model.is_none()
    }

    /// Applies the update and validates the result. `config` is untouched on error.
    pub fn apply_to(&self, config: &RagConfiguration) -> Result<RagConfiguration, RagError> {
        let mut updated = config.clone();
        if let Some(enabled) = self.enabled {
            updated.enabled = enabled;
        }
        if let Some(chunk_size) = self.chunk_size {
            updated.chunk_size = chunk_size;
        }
        if let Some(chunk_overlap) = self.chunk_overlap {
            updated.chunk_overlap = chunk_overlap;
        }
        if let Some(top_k) = self.top_k {
            updated.top_k = top_k;
        }
        if let Some(threshold) = self.similarity_threshold {
            updated.similarity_threshold = threshold;
        }
        if let Some(model) = &self.embedding_model {
            updated.embedding_model = model.clone();
        }
        updated.validate()?;
        updated.updated_at = Utc::now();
        Ok(updated)
    }
}

/// Returns the agent's configuration, creating it from `defaults` on first access.
pub async fn load_or_create(
    store: &dyn RagStore,
    agent_id: &str,
    defaults: &RagDefaults,
    embedding_model: &str,
) -> Result<RagConfiguration, RagError> {
    if let Some(config) = store.get_configuration(agent_id).await? {
        return Ok(config);
    }

    let config = RagConfiguration::from_defaults(agent_id, defaults, embedding_model);
    if store.insert_configuration_if_absent(&config).await? {
        tracing::info!(agent_id, "Created default RAG configuration");
    }

    // A concurrent caller may have won the insert; read back whichever row exists.
    store
        .get_configuration(agent_id)
        .await?
        .ok_or_else(|| RagError::Internal(format!("configuration for {} vanished", agent_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RagConfiguration {
        RagConfiguration::from_defaults("agent-1", &RagDefaults::default(), "char-frequency-128")
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = config();
        assert!(config.enabled);
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.top_k, 3);
        assert!((config.similarity_threshold - 0.7).abs() < f64::EPSILON);
        config.validate().unwrap();
    }

    #[test]
    fn update_changes_only_given_fields() {
        let update = RagConfigurationUpdate {
            top_k: Some(5),
            enabled: Some(false),
            ..Default::default()
        };
        let updated = update.apply_to(&config()).unwrap();

        assert_eq!(updated.top_k, 5);
        assert!(!updated.enabled);
        assert_eq!(updated.chunk_size, 512);
    }

    #[test]
    fn invalid_update_is_rejected() {
        for update in [
            RagConfigurationUpdate {
                chunk_size: Some(0),
                ..Default::default()
            },
            RagConfigurationUpdate {
                top_k: Some(0),
                ..Default::default()
            },
            RagConfigurationUpdate {
                similarity_threshold: Some(-0.1),
                ..Default::default()
            },
            RagConfigurationUpdate {
                embedding_model: Some("  ".to_string()),
                ..Default::default()
            },
        ] {
            assert!(matches!(
                update.apply_to(&config()),
                Err(RagError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn large_overlap_is_allowed_but_flagged() {
        let update = RagConfigurationUpdate {
            chunk_size: Some(50),
            chunk_overlap: Some(50),
            ..Default::default()
        };
        let updated = update.apply_to(&config()).unwrap();
        assert!(updated.overlap_blocks_sliding());
    }
}
