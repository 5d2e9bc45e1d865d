use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::default_settings;
use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use crate::core::errors::RagError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 6] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "credential",
    "bearer",
];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AppPaths {
        &self.paths
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("AGENT_RAG_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        self.paths.config_path.clone()
    }

    /// Built-in defaults, then config.yml, then secrets.yaml.
    pub fn load_config(&self) -> Result<Value, RagError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.paths.secrets_path)?;
        let merged = deep_merge(&default_settings(), &public_config);
        let merged = deep_merge(&merged, &secrets_config);
        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn load_settings(&self) -> Result<Settings, RagError> {
        let merged = self.load_config()?;
        serde_json::from_value(merged)
            .map_err(|e| RagError::BadRequest(format!("Invalid config: {}", e)))
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, RagError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(RagError::internal)?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = serde_yaml::from_str::<Value>(&contents).map_err(|e| {
        RagError::BadRequest(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(RagError::BadRequest(format!(
            "Invalid config in {}: expected a mapping at the top level",
            path.display()
        ))),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::settings::EmbeddingProvider;
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        ConfigService::new(Arc::new(AppPaths::with_data_dir(dir.to_path_buf())))
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn missing_files_yield_built_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = service_in(dir.path()).load_settings().unwrap();

        assert_eq!(settings.embedding.provider, EmbeddingProvider::Placeholder);
        assert_eq!(settings.rag_defaults.chunk_size, 512);
        assert_eq!(settings.rag_defaults.chunk_overlap, 50);
        assert_eq!(settings.rag_defaults.top_k, 3);
        assert!((settings.rag_defaults.similarity_threshold - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn user_file_and_secrets_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "embedding:\n  provider: openai_compatible\n  dimension: 768\nrag_defaults:\n  top_k: 5\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "embedding:\n  api_key: sk-test\n",
        )
        .unwrap();

        let settings = service_in(dir.path()).load_settings().unwrap();

        assert_eq!(
            settings.embedding.provider,
            EmbeddingProvider::OpenaiCompatible
        );
        assert_eq!(settings.embedding.dimension, 768);
        assert_eq!(settings.embedding.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.rag_defaults.top_k, 5);
        assert_eq!(settings.rag_defaults.chunk_size, 512);
    }

    #[test]
    fn invalid_user_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.yml"),
            "rag_defaults:\n  similarity_threshold: 2.0\n",
        )
        .unwrap();

        let err = service_in(dir.path()).load_settings().unwrap_err();
        assert!(matches!(err, RagError::BadRequest(_)));
    }

    #[test]
    fn redaction_hides_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        let redacted = service.redact_sensitive_values(&json!({
            "embedding": { "api_key": "sk-live", "model": "m" }
        }));

        assert_eq!(
            redacted,
            json!({ "embedding": { "api_key": "****", "model": "m" } })
        );
    }
}
