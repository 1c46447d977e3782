use embed::EmbedError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use store::{Language, TextDocument};
use thiserror::Error;

/// Tuning knobs and bounds for the search service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    /// Result count used when the request does not name one.
    pub default_top_k: usize,
    /// Largest accepted `top_k`; larger requests are rejected, not clamped.
    pub max_top_k: usize,
    /// Longest accepted query, in characters.
    pub max_query_chars: usize,
    pub embed_timeout_ms: u64,
    /// Budget for the indexed lookup. Exceeding it triggers the fallback.
    pub index_timeout_ms: u64,
    /// Budget for the brute-force scan. Exceeding it fails the request.
    pub scan_timeout_ms: u64,
    /// Upper bound on documents scored by one brute-force scan.
    pub max_scan_documents: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 100,
            max_query_chars: 1_000,
            embed_timeout_ms: 5_000,
            index_timeout_ms: 2_000,
            scan_timeout_ms: 10_000,
            max_scan_documents: 50_000,
        }
    }
}

impl SearchConfig {
    pub(crate) fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub(crate) fn index_timeout(&self) -> Duration {
        Duration::from_millis(self.index_timeout_ms)
    }

    pub(crate) fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    /// Validate the configuration before serving requests.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.max_top_k == 0 {
            return Err(SearchError::InvalidArgument(
                "max_top_k must be greater than zero".into(),
            ));
        }
        if self.default_top_k == 0 || self.default_top_k > self.max_top_k {
            return Err(SearchError::InvalidArgument(format!(
                "default_top_k must be within 1..={}",
                self.max_top_k
            )));
        }
        if self.max_query_chars == 0 || self.max_scan_documents == 0 {
            return Err(SearchError::InvalidArgument(
                "max_query_chars and max_scan_documents must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Which retrieval path served a response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Indexed,
    BruteForce,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Indexed => "indexed",
            Provenance::BruteForce => "brute_force",
        }
    }
}

/// One ranked document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    /// Cosine similarity with the query, in `[-1, 1]`.
    pub score: f32,
    pub language: Language,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_medicamento: Option<String>,
}

impl SearchHit {
    pub fn from_document(doc: TextDocument, score: f32) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            score,
            language: doc.language,
            related_medicamento: doc.related_medicamento,
        }
    }
}

/// Ranked results tagged with the path that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchOutcome {
    pub source: Provenance,
    pub results: Vec<SearchHit>,
}

/// Coarse classification used to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Unavailable,
    Internal,
}

/// Errors surfaced by [`SearchService::search`](crate::SearchService::search).
///
/// Failures of the indexed path never appear here: they are absorbed by the
/// brute-force fallback.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("embedder unavailable: {0}")]
    EmbedderUnavailable(#[source] EmbedError),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("{stage} timed out after {elapsed_ms}ms")]
    Timeout { stage: &'static str, elapsed_ms: u64 },
    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SearchError::EmbedderUnavailable(_)
            | SearchError::StoreUnavailable(_)
            | SearchError::Timeout { .. } => ErrorKind::Unavailable,
            SearchError::Internal(_) => ErrorKind::Internal,
        }
    }
}
