//! # Pharmacien Store
//!
//! Typed document store for the pharmacy data service. Every collection
//! (`documents`, `medicamentos`, `citas`, ...) has one strongly typed record
//! shape; records are validated on the way in, serialized as JSON and
//! compressed before they reach the storage backend.
//!
//! ## Core Features
//!
//! - **Pluggable Backends**: storage sits behind the [`StoreBackend`] trait.
//!   Out of the box there is an ordered in-memory backend (ideal for tests)
//!   and a Redb backend for persistent, on-disk storage (enabled via the
//!   `backend-redb` feature, on by default).
//! - **Runtime Configuration**: backend, compression and vector index are
//!   chosen at runtime through [`StoreConfig`].
//! - **Vector Index**: an HNSW index over the `embeddings` field of text
//!   documents. It may be disabled, absent, or stale, and every failure is
//!   reported through [`VectorQueryError`] so callers can decide whether to
//!   fall back to an exhaustive scan.
//!
//! ## Example Usage
//!
//! ```
//! use store::{Collection, DocumentStore, Entity, StoreConfig, TextDocument};
//!
//! let store = DocumentStore::new(StoreConfig::default()).unwrap();
//! let stored = store
//!     .insert(Entity::from(TextDocument::new("Ibuprofeno", "Alivia el dolor de cabeza")))
//!     .unwrap();
//!
//! let fetched = store.get(Collection::Documents, stored.id()).unwrap();
//! assert_eq!(fetched, Some(stored));
//! assert_eq!(store.count(Collection::Documents).unwrap(), 1);
//! ```

pub mod ann;
mod backend;
pub mod model;
mod query;

#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{BackendConfig, InMemoryBackend, ScanVisitor, StoreBackend};

pub use ann::{IndexState, VectorIndexConfig, VectorIndexStatus, VectorQueryError};
pub use model::{
    Categoria, Cita, Cliente, Collection, Doctor, Entity, EntityRef, Farmacia, ImageAsset,
    ImageMetadata, Language, Medicamento, Proveedor, TextDocument, Transaccion,
};
pub use query::VectorHit;

use crate::ann::VectorIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use thiserror::Error;
use zstd::{decode_all, encode_all};

/// Compression codec options for stored records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// No compression (useful for debugging or when storage is not a concern).
    None,
    /// Zstd compression (default, good balance of speed and ratio).
    #[default]
    Zstd,
}

/// Compression behavior configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub codec: CompressionCodec,
    /// Compression level (1-22 for Zstd, where higher = better compression but slower).
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn new(codec: CompressionCodec, level: i32) -> Self {
        Self { codec, level }
    }

    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(encode_all(data, self.level)?),
        }
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, StoreError> {
        match self.codec {
            CompressionCodec::None => Ok(data.to_vec()),
            CompressionCodec::Zstd => Ok(decode_all(data)?),
        }
    }
}

/// Config for opening a store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend storage configuration (in-memory or Redb).
    pub backend: BackendConfig,
    /// Compression settings for stored records.
    pub compression: CompressionConfig,
    /// HNSW index over document embeddings.
    pub vector_index: VectorIndexConfig,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_vector_index(mut self, vector_index: VectorIndexConfig) -> Self {
        self.vector_index = vector_index;
        self
    }
}

/// Errors raised by the store.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization encode error: {0}")]
    Encode(String),
    #[error("Serialization decode error: {0}")]
    Decode(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("invalid {collection} record: {reason}")]
    Schema { collection: Collection, reason: String },
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),
    #[error("{collection} record '{id}' not found")]
    NotFound { collection: Collection, id: String },
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Compression(e.to_string())
    }
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }

    /// True for errors caused by the caller's input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::Schema { .. } | StoreError::UnknownCollection(_) | StoreError::NotFound { .. }
        )
    }
}

/// The built index plus whether documents changed after it was built.
#[derive(Default)]
struct IndexSlot {
    index: Option<VectorIndex>,
    stale: bool,
}

/// Handle over all collections. Construct it once and share it behind an
/// `Arc`; reads may run concurrently.
pub struct DocumentStore {
    backend: Box<dyn StoreBackend>,
    cfg: StoreConfig,
    vector_index: RwLock<IndexSlot>,
    /// Bumped on every write that touches document vectors.
    vector_writes: AtomicU64,
}

impl DocumentStore {
    /// Open a store using the configured backend.
    pub fn new(cfg: StoreConfig) -> Result<Self, StoreError> {
        let backend = cfg.backend.build()?;
        Ok(Self::with_backend(cfg, backend))
    }

    /// Build a store over a custom backend (e.g. in-memory for tests).
    pub fn with_backend(cfg: StoreConfig, backend: Box<dyn StoreBackend>) -> Self {
        Self {
            backend,
            cfg,
            vector_index: RwLock::new(IndexSlot::default()),
            vector_writes: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.cfg
    }

    /// Insert or replace a record. An empty identifier is replaced with a
    /// fresh UUID v4. Returns the record as stored.
    pub fn insert(&self, mut entity: Entity) -> Result<Entity, StoreError> {
        if entity.id().is_empty() {
            entity.set_id(uuid::Uuid::new_v4().to_string());
        }
        entity.validate()?;
        let payload = self.encode(&entity)?;
        self.backend
            .put(entity.collection().name(), entity.id(), &payload)?;
        if entity.as_document().is_some_and(TextDocument::is_embedded) {
            self.mark_index_stale();
        }
        Ok(entity)
    }

    /// Insert many records, one backend batch per collection.
    pub fn insert_many(&self, entities: Vec<Entity>) -> Result<usize, StoreError> {
        let mut batches: BTreeMap<Collection, Vec<(String, Vec<u8>)>> = BTreeMap::new();
        let mut touches_vectors = false;
        let total = entities.len();

        for mut entity in entities {
            if entity.id().is_empty() {
                entity.set_id(uuid::Uuid::new_v4().to_string());
            }
            entity.validate()?;
            touches_vectors |= entity.as_document().is_some_and(TextDocument::is_embedded);
            let payload = self.encode(&entity)?;
            batches
                .entry(entity.collection())
                .or_default()
                .push((entity.id().to_string(), payload));
        }

        for (collection, entries) in batches {
            log::debug!("batch insert of {} {} records", entries.len(), collection);
            self.backend.batch_put(collection.name(), entries)?;
        }
        if touches_vectors {
            self.mark_index_stale();
        }
        Ok(total)
    }

    /// Retrieve a record by identifier.
    pub fn get(&self, collection: Collection, id: &str) -> Result<Option<Entity>, StoreError> {
        match self.backend.get(collection.name(), id)? {
            Some(data) => Ok(Some(self.decode(collection, &data)?)),
            None => Ok(None),
        }
    }

    /// Page through a collection in key order.
    pub fn list(
        &self,
        collection: Collection,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, StoreError> {
        let mut out = Vec::with_capacity(limit.min(256));
        if limit == 0 {
            return Ok(out);
        }
        let mut skipped = 0usize;
        self.scan(collection, &mut |entity| {
            if skipped < offset {
                skipped += 1;
                return Ok(ControlFlow::Continue(()));
            }
            out.push(entity);
            Ok(if out.len() >= limit {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        })?;
        Ok(out)
    }

    /// Visit every record of a collection in key order.
    pub fn scan(
        &self,
        collection: Collection,
        visitor: &mut dyn FnMut(Entity) -> Result<ControlFlow<()>, StoreError>,
    ) -> Result<(), StoreError> {
        self.backend.scan(collection.name(), &mut |_key: &str, data: &[u8]| {
            let entity = self.decode(collection, data)?;
            visitor(entity)
        })
    }

    pub fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        self.backend.count(collection.name())
    }

    /// Record counts for every collection.
    pub fn counts(&self) -> Result<BTreeMap<Collection, usize>, StoreError> {
        Collection::ALL
            .into_iter()
            .map(|c| Ok((c, self.count(c)?)))
            .collect()
    }

    /// Remove every record of a collection, returning how many were removed.
    pub fn clear(&self, collection: Collection) -> Result<usize, StoreError> {
        let removed = self.backend.clear(collection.name())?;
        if collection == Collection::Documents {
            self.mark_index_stale();
        }
        log::info!("cleared {removed} records from {collection}");
        Ok(removed)
    }

    /// Attach a vector and its model tag to a document in one write.
    pub fn attach_embedding(
        &self,
        id: &str,
        vector: Vec<f32>,
        model: &str,
    ) -> Result<TextDocument, StoreError> {
        let doc = self
            .get(Collection::Documents, id)?
            .and_then(Entity::into_document)
            .ok_or_else(|| StoreError::NotFound {
                collection: Collection::Documents,
                id: id.to_string(),
            })?;
        let entity = self.insert(Entity::Document(doc.with_embedding(vector, model)))?;
        entity.into_document().ok_or_else(|| {
            StoreError::Decode(format!("record '{id}' is no longer a text document"))
        })
    }

    /// Flush backend buffers if supported.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.backend.flush()
    }

    /// (Re)build the vector index from every embedded document.
    ///
    /// A vector write that lands while the scan runs leaves the new index
    /// stale, since the scan may have missed it.
    pub fn build_vector_index(&self) -> Result<VectorIndexStatus, StoreError> {
        let cfg = &self.cfg.vector_index;
        if !cfg.enabled {
            return Ok(VectorIndexStatus::disabled());
        }

        let writes_at_scan = self.vector_writes.load(Ordering::SeqCst);
        let mut entries = Vec::new();
        self.scan(Collection::Documents, &mut |entity| {
            if let Some(doc) = entity.into_document() {
                if let Some(vector) = doc.embeddings {
                    entries.push((doc.id, vector));
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;

        let built = VectorIndex::build(cfg, entries);

        let mut slot = self
            .vector_index
            .write()
            .map_err(|_| StoreError::backend("vector index lock poisoned"))?;
        let stale = self.vector_writes.load(Ordering::SeqCst) != writes_at_scan;
        let status = match &built {
            Some(index) if stale => VectorIndexStatus::stale(index),
            Some(index) => VectorIndexStatus::ready(index),
            None => VectorIndexStatus::absent(),
        };
        slot.index = built;
        slot.stale = stale;
        log::info!(
            "vector index rebuilt: state={:?} vectors={}",
            status.state,
            status.vectors
        );
        Ok(status)
    }

    /// Current state of the vector index.
    pub fn vector_index_status(&self) -> VectorIndexStatus {
        if !self.cfg.vector_index.enabled {
            return VectorIndexStatus::disabled();
        }
        match self.vector_index.read() {
            Ok(slot) => match &slot.index {
                Some(index) if slot.stale => VectorIndexStatus::stale(index),
                Some(index) => VectorIndexStatus::ready(index),
                None => VectorIndexStatus::absent(),
            },
            Err(_) => VectorIndexStatus::absent(),
        }
    }

    fn mark_index_stale(&self) {
        // Count before taking the lock so a rebuild holding it sees the write.
        self.vector_writes.fetch_add(1, Ordering::SeqCst);
        match self.vector_index.write() {
            Ok(mut slot) => slot.stale = true,
            // A poisoned slot is never read as ready again.
            Err(poisoned) => poisoned.into_inner().stale = true,
        }
    }

    pub(crate) fn decode(&self, collection: Collection, data: &[u8]) -> Result<Entity, StoreError> {
        let bytes = self.cfg.compression.decompress(data)?;
        Entity::from_slice(collection, &bytes)
    }

    fn encode(&self, entity: &Entity) -> Result<Vec<u8>, StoreError> {
        let bytes = serde_json::to_vec(entity).map_err(|e| StoreError::Encode(e.to_string()))?;
        self.cfg.compression.compress(&bytes)
    }
}
