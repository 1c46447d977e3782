//! # Pharmacien Search (`search`)
//!
//! ## Purpose
//!
//! `search` answers free-text similarity queries over the text documents in
//! the store. A query is embedded once, then served by one of two paths:
//!
//! 1. **Indexed**: the store's HNSW nearest-neighbour lookup.
//! 2. **Brute force**: if the indexed path fails in a recoverable way
//!    (index disabled, absent, stale, wrong dimension, query error, timeout),
//!    every embedded document is scored with exact cosine similarity.
//!
//! Every response carries a [`Provenance`] tag naming the path that served
//! it. Failures of the indexed path are logged and counted, never returned;
//! embedder failures and store failures during the scan fail the request.
//!
//! ## Core Types
//!
//! - [`SearchService`]: validates, embeds, and routes a query.
//! - [`SearchBackend`]: the data-access seam, implemented for
//!   [`store::DocumentStore`].
//! - [`SearchConfig`]: `top_k` bounds, query length limit, stage timeouts,
//!   scan cap.
//! - [`SearchOutcome`] / [`SearchHit`]: ranked results plus provenance.
//! - [`SearchError`]: argument, availability, timeout and internal failures.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use embed::{build_embedder, EmbedConfig};
//! use search::{Provenance, SearchConfig, SearchService};
//! use store::{DocumentStore, StoreConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = Arc::new(DocumentStore::new(StoreConfig::default()).unwrap());
//! let embedder = build_embedder(&EmbedConfig::default()).unwrap();
//! let service = SearchService::new(embedder, store, SearchConfig::default());
//!
//! let outcome = service.search("dolor de cabeza", Some(3)).await.unwrap();
//! // Nothing is indexed yet, so the scan answers (with no documents).
//! assert_eq!(outcome.source, Provenance::BruteForce);
//! assert!(outcome.results.is_empty());
//! # }
//! ```
//!
//! ## Observability
//!
//! Emits `search_requests_total{source}`, `search_fallbacks_total` and
//! `search_latency_seconds` through the `metrics` facade. Install a
//! recorder (e.g. the Prometheus exporter) to collect them.

pub mod engine;
pub mod similarity;
pub mod types;

pub use crate::engine::{SearchBackend, SearchService};
pub use crate::similarity::{cosine_similarity, EPSILON};
pub use crate::types::{
    ErrorKind, Provenance, SearchConfig, SearchError, SearchHit, SearchOutcome,
};
