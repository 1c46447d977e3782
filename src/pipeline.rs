//! Setup jobs: clear collections, load a dataset, backfill embeddings.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use embed::{EmbedError, Embedder};
use serde::{Deserialize, Serialize};
use store::{Collection, DocumentStore, Entity, StoreError, TextDocument};
use thiserror::Error;

use crate::dataset::{self, Dataset, DatasetConfig, DatasetError};

/// Errors that can occur while running a setup job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    #[error("embedding failure: {0}")]
    Embed(#[from] EmbedError),

    #[error("dataset failure: {0}")]
    Dataset(#[from] DatasetError),

    #[error("invalid job configuration: {0}")]
    Config(String),
}

/// Options for the embedding backfill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    /// Documents embedded per embedder call.
    pub batch_size: usize,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self { batch_size: 32 }
    }
}

impl BackfillConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillReport {
    pub embedded: usize,
    /// Pending documents left unembedded because their content is blank.
    pub skipped: usize,
    pub batches: usize,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetupReport {
    pub cleared: BTreeMap<Collection, usize>,
    pub inserted: BTreeMap<Collection, usize>,
    pub backfill: Option<BackfillReport>,
}

/// Remove every record from `collections`. Returns the removed count per
/// collection.
pub fn cleanup(
    store: &DocumentStore,
    collections: &[Collection],
) -> Result<BTreeMap<Collection, usize>, PipelineError> {
    let mut cleared = BTreeMap::new();
    for &collection in collections {
        let removed = store.clear(collection)?;
        tracing::info!(collection = %collection, removed, "collection cleared");
        cleared.insert(collection, removed);
    }
    Ok(cleared)
}

/// Replace the contents of every collection the dataset covers.
///
/// Collections are cleared first so re-running an ingest is idempotent.
pub fn ingest(
    store: &DocumentStore,
    dataset: Dataset,
) -> Result<BTreeMap<Collection, usize>, PipelineError> {
    let counts = dataset.counts();
    let collections: Vec<Collection> = counts.keys().copied().collect();
    cleanup(store, &collections)?;

    let entities: Vec<Entity> = dataset.into_entities();
    let inserted = store.insert_many(entities)?;
    store.flush()?;

    for (collection, n) in &counts {
        tracing::info!(collection = %collection, records = n, "collection loaded");
    }
    tracing::info!(total = inserted, "ingest complete");
    Ok(counts)
}

/// Embed every document that has no vector yet and attach the result
/// together with the embedder's model tag.
///
/// Documents are processed in batches of `cfg.batch_size`; an embedder
/// failure aborts the job, leaving earlier batches written. Documents with
/// blank content cannot be embedded; they are skipped, stay pending and are
/// counted in [`BackfillReport::skipped`].
pub async fn backfill_embeddings(
    store: &DocumentStore,
    embedder: &dyn Embedder,
    cfg: &BackfillConfig,
) -> Result<BackfillReport, PipelineError> {
    if cfg.batch_size == 0 {
        return Err(PipelineError::Config("batch_size must be >= 1".into()));
    }

    let start = Instant::now();
    let model = embedder.model_version().to_string();
    let blank = store.scan_documents(usize::MAX, |d| !d.is_embedded() && !has_text(d))?;
    for doc in &blank {
        tracing::warn!(id = %doc.id, "document has blank content, skipping embedding");
    }
    let mut report = BackfillReport {
        embedded: 0,
        skipped: blank.len(),
        batches: 0,
        model: model.clone(),
    };

    loop {
        let pending = store.scan_documents(cfg.batch_size, |d| !d.is_embedded() && has_text(d))?;
        if pending.is_empty() {
            break;
        }

        let texts: Vec<String> = pending.iter().map(|d| d.content.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != pending.len() {
            return Err(EmbedError::Inference(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                pending.len()
            ))
            .into());
        }

        for (doc, vector) in pending.iter().zip(vectors) {
            if vector.len() != embedder.dimension() {
                return Err(EmbedError::DimensionMismatch {
                    expected: embedder.dimension(),
                    got: vector.len(),
                }
                .into());
            }
            store.attach_embedding(&doc.id, vector, &model)?;
        }

        report.embedded += pending.len();
        report.batches += 1;
        tracing::debug!(
            batch = report.batches,
            size = pending.len(),
            "embedding batch written"
        );
    }

    store.flush()?;
    tracing::info!(
        embedded = report.embedded,
        skipped = report.skipped,
        batches = report.batches,
        model = %report.model,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "embedding backfill complete"
    );
    Ok(report)
}

fn has_text(doc: &TextDocument) -> bool {
    !doc.content.trim().is_empty()
}

/// Full setup: clear all collections, generate and load a fresh dataset,
/// then optionally backfill embeddings.
pub async fn setup(
    store: &DocumentStore,
    embedder: Option<&dyn Embedder>,
    dataset_cfg: &DatasetConfig,
    backfill_cfg: &BackfillConfig,
    now: DateTime<Utc>,
) -> Result<SetupReport, PipelineError> {
    let cleared = cleanup(store, &Collection::ALL)?;
    let dataset = dataset::generate(dataset_cfg, now);
    let inserted = ingest(store, dataset)?;

    let backfill = match embedder {
        Some(embedder) => Some(backfill_embeddings(store, embedder, backfill_cfg).await?),
        None => None,
    };

    Ok(SetupReport {
        cleared,
        inserted,
        backfill,
    })
}
