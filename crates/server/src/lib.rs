//! Pharmacien Server - HTTP REST API for the pharmacy data service
//!
//! Exposes the document store and the similarity search service over HTTP:
//!
//! - **Search**: free-text similarity search with indexed lookup and
//!   brute-force fallback, tagged with the path that served it
//! - **Collections**: create, fetch and page through every collection
//! - **Stats**: per-collection counts and vector index status
//! - **Health & Metrics**: liveness/readiness probes and Prometheus metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (store readable)
//! - `GET /metrics` - Prometheus metrics
//! - `POST /search` - Similarity search `{"query", "top_k"?}`
//! - `GET /stats` - Collection counts and vector index status
//! - `POST /vector-index/rebuild` - Rebuild the HNSW index
//! - `GET /{collection}?offset=&limit=` - Page through a collection
//! - `GET /{collection}/{id}` - Fetch one record
//! - `POST /{collection}` - Create a record (201, server-assigned `_id`)
//!
//! Errors use `{"error": {"code", "message"}}` with 400 for invalid input,
//! 404 for unknown collections or records, 503 when the embedder or store
//! fails, 408 on request timeout and 500 otherwise.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
