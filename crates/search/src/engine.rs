use std::sync::Arc;
use std::time::{Duration, Instant};

use embed::Embedder;
use store::{DocumentStore, StoreError, TextDocument, VectorHit, VectorQueryError};
use tokio::task::JoinError;
use tokio::time::timeout;

use crate::similarity::rank;
use crate::types::{Provenance, SearchConfig, SearchError, SearchHit, SearchOutcome};


/// Data access needed by the search service.
///
/// Both calls block and are run on the blocking pool. Implemented for
/// [`DocumentStore`]; tests substitute fakes.
pub trait SearchBackend: Send + Sync {
    /// Indexed nearest-neighbour lookup over document embeddings.
    fn vector_query(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorQueryError>;

    /// Documents carrying an embedding, in retrieval order, at most `limit`.
    fn embedded_documents(&self, limit: usize) -> Result<Vec<TextDocument>, StoreError>;
}

impl SearchBackend for DocumentStore {
    fn vector_query(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorQueryError> {
        self.vector_search(query, k)
    }

    fn embedded_documents(&self, limit: usize) -> Result<Vec<TextDocument>, StoreError> {
        DocumentStore::embedded_documents(self, limit)
    }
}

/// Outcome of the indexed attempt when it does not produce results.
enum IndexedFailure {
    /// Logged and answered by the brute-force scan.
    Recoverable(String),
    Fatal(SearchError),
}

/// Similarity search with indexed lookup and brute-force fallback.
pub struct SearchService {
    embedder: Arc<dyn Embedder>,
    backend: Arc<dyn SearchBackend>,
    cfg: SearchConfig,
}

impl SearchService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        backend: Arc<dyn SearchBackend>,
        cfg: SearchConfig,
    ) -> Self {
        Self {
            embedder,
            backend,
            cfg,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.cfg
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Rank stored documents by similarity to `query`.
    ///
    /// `top_k` defaults to the configured value and must lie within
    /// `1..=max_top_k`. Argument checks run before any embedding or store
    /// access.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<i64>,
    ) -> Result<SearchOutcome, SearchError> {
        let top_k = self.validate(query, top_k)?;
        let start = Instant::now();

        let vector = self.embed_query(query).await?;

        let outcome = match self.indexed(&vector, top_k).await {
            Ok(results) => SearchOutcome {
                source: Provenance::Indexed,
                results,
            },
            Err(IndexedFailure::Recoverable(reason)) => {
                tracing::warn!(
                    %reason,
                    top_k,
                    "indexed lookup failed, falling back to brute-force scan"
                );
                metrics::counter!("search_fallbacks_total").increment(1);
                SearchOutcome {
                    source: Provenance::BruteForce,
                    results: self.brute_force(vector, top_k).await?,
                }
            }
            Err(IndexedFailure::Fatal(err)) => return Err(err),
        };

        let elapsed = start.elapsed();
        metrics::counter!("search_requests_total", "source" => outcome.source.as_str())
            .increment(1);
        metrics::histogram!("search_latency_seconds").record(elapsed.as_secs_f64());
        tracing::debug!(
            source = outcome.source.as_str(),
            hits = outcome.results.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "search served"
        );
        Ok(outcome)
    }

    fn validate(&self, query: &str, top_k: Option<i64>) -> Result<usize, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidArgument(
                "query must not be empty".into(),
            ));
        }
        let chars = query.chars().count();
        if chars > self.cfg.max_query_chars {
            return Err(SearchError::InvalidArgument(format!(
                "query is {chars} characters, at most {} allowed",
                self.cfg.max_query_chars
            )));
        }

        let requested = top_k.unwrap_or(self.cfg.default_top_k as i64);
        match usize::try_from(requested) {
            Ok(k) if (1..=self.cfg.max_top_k).contains(&k) => Ok(k),
            _ => Err(SearchError::InvalidArgument(format!(
                "top_k must be within 1..={}, got {requested}",
                self.cfg.max_top_k
            ))),
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, SearchError> {
        let budget = self.cfg.embed_timeout();
        match timeout(budget, self.embedder.embed(query)).await {
            Ok(Ok(vector)) => Ok(vector),
            Ok(Err(e)) => Err(SearchError::EmbedderUnavailable(e)),
            Err(_) => Err(timed_out("embed", budget)),
        }
    }

    async fn indexed(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, IndexedFailure> {
        let backend = Arc::clone(&self.backend);
        let query = vector.to_vec();
        let task = tokio::task::spawn_blocking(move || backend.vector_query(&query, top_k));

        let hits = match timeout(self.cfg.index_timeout(), task).await {
            Err(_) => {
                return Err(IndexedFailure::Recoverable(format!(
                    "timed out after {}ms",
                    self.cfg.index_timeout_ms
                )))
            }
            Ok(Err(join)) => {
                return Err(IndexedFailure::Fatal(join_failure("indexed lookup", join)))
            }
            Ok(Ok(Err(e))) if e.is_recoverable() => {
                return Err(IndexedFailure::Recoverable(e.to_string()))
            }
            Ok(Ok(Err(e))) => {
                return Err(IndexedFailure::Fatal(SearchError::StoreUnavailable(
                    e.to_string(),
                )))
            }
            Ok(Ok(Ok(hits))) => hits,
        };

        let mut results: Vec<SearchHit> = hits
            .into_iter()
            .map(|hit| SearchHit::from_document(hit.document, hit.score))
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        Ok(results)
    }

    async fn brute_force(
        &self,
        vector: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let backend = Arc::clone(&self.backend);
        let cap = self.cfg.max_scan_documents;
        let task = tokio::task::spawn_blocking(move || {
            // One extra document tells us whether the cap cut the scan short.
            let mut documents = backend.embedded_documents(cap.saturating_add(1))?;
            let truncated = documents.len() > cap;
            documents.truncate(cap);
            Ok::<_, StoreError>((rank(&vector, documents, top_k), truncated))
        });

        let budget = self.cfg.scan_timeout();
        match timeout(budget, task).await {
            Err(_) => Err(timed_out("brute-force scan", budget)),
            Ok(Err(join)) => Err(join_failure("brute-force scan", join)),
            Ok(Ok(Err(e))) => Err(SearchError::StoreUnavailable(e.to_string())),
            Ok(Ok(Ok((hits, truncated)))) => {
                if truncated {
                    tracing::warn!(
                        max_scan_documents = cap,
                        "brute-force scan hit its document cap, results cover a prefix of the corpus"
                    );
                }
                Ok(hits)
            }
        }
    }
}

fn timed_out(stage: &'static str, budget: Duration) -> SearchError {
    SearchError::Timeout {
        stage,
        elapsed_ms: budget.as_millis() as u64,
    }
}

fn join_failure(stage: &str, err: JoinError) -> SearchError {
    SearchError::Internal(format!("{stage} task failed: {err}"))
}
