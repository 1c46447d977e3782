use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use embed::Embedder;
use metrics_exporter_prometheus::PrometheusHandle;
use search::SearchService;
use std::sync::Arc;
use store::DocumentStore;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Document store (shared across requests)
    pub store: Arc<DocumentStore>,

    /// Similarity search over the store's documents
    pub search: Arc<SearchService>,

    /// Prometheus exporter handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// Open the configured store and embedder.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = DocumentStore::new(config.store.clone())?;
        let embedder = embed::build_embedder(&config.embedder)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        Ok(Self::from_parts(config, Arc::new(store), embedder))
    }

    /// Assemble state from an existing store and embedder.
    pub fn from_parts(
        config: ServerConfig,
        store: Arc<DocumentStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let search = SearchService::new(embedder, store.clone(), config.search.clone());
        Self {
            config: Arc::new(config),
            store,
            search: Arc::new(search),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}
