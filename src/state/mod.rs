use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::rag::{build_embedder, Embedder, RagService, RagStore, SqliteRagStore};

pub mod error;

use error::InitializationError;

/// Process-wide handles, built once by the entry point and passed down.
///
/// Contains references to:
/// - Configuration and paths
/// - The RAG store connection pool
/// - The active embedder
/// - The RAG service built on top of both
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Arc<Settings>,
    pub rag_store: Arc<dyn RagStore>,
    pub embedder: Arc<dyn Embedder>,
    pub rag: Arc<RagService>,
}

impl AppState {
    /// Loads settings for `paths`, opens the store and selects the embedder.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        Self::with_settings(paths, config, settings).await
    }

    pub async fn with_settings(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
    ) -> Result<Arc<Self>, InitializationError> {
        let db_path = paths.resolve_db_path(&settings.storage.db_file);
        let rag_store: Arc<dyn RagStore> = Arc::new(
            SqliteRagStore::with_path(db_path, settings.storage.max_connections)
                .await
                .map_err(|e| InitializationError::Store(e.into()))?,
        );

        let embedder = build_embedder(&settings.embedding)
            .map_err(|e| InitializationError::Embedder(e.into()))?;

        let rag = Arc::new(RagService::new(
            rag_store.clone(),
            embedder.clone(),
            settings.rag_defaults.clone(),
        ));

        Ok(Arc::new(AppState {
            paths,
            config,
            settings: Arc::new(settings),
            rag_store,
            embedder,
            rag,
        }))
    }
}
