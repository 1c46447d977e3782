//! Workspace umbrella crate for the Pharmacien data service.
//!
//! Ties the workspace crates together for the `pharmacien` CLI:
//!
//! - [`config`]: YAML configuration shared by every command
//! - [`dataset`]: deterministic synthetic dataset for all collections
//! - [`pipeline`]: cleanup, ingest, embedding backfill and full setup jobs
//!
//! The building blocks are re-exported so callers can depend on this crate
//! alone.

pub mod config;
pub mod dataset;
pub mod pipeline;

pub use config::{ConfigLoadError, PharmacienConfig};
pub use dataset::{Dataset, DatasetConfig, DatasetError, generate};
pub use pipeline::{
    BackfillConfig, BackfillReport, PipelineError, SetupReport, backfill_embeddings, cleanup,
    ingest, setup,
};

pub use embed::{EmbedConfig, EmbedError, Embedder, build_embedder};
pub use search::{Provenance, SearchConfig, SearchError, SearchOutcome, SearchService};
pub use store::{BackendConfig, Collection, DocumentStore, Entity, StoreConfig, StoreError};
