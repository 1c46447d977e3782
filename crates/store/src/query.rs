use crate::ann::VectorQueryError;
use crate::{Collection, DocumentStore, StoreError, TextDocument};
use std::ops::ControlFlow;

/// Document matched by an indexed nearest-neighbour query.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub document: TextDocument,
    /// Cosine similarity with the query vector.
    pub score: f32,
}

/// Scan-with-filter and nearest-neighbour retrieval over `documents`.
impl DocumentStore {
    /// Text documents accepted by `filter`, in key order, at most `limit`.
    pub fn scan_documents(
        &self,
        limit: usize,
        filter: impl Fn(&TextDocument) -> bool,
    ) -> Result<Vec<TextDocument>, StoreError> {
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }
        self.scan(Collection::Documents, &mut |entity| {
            if let Some(doc) = entity.into_document().filter(|d| filter(d)) {
                out.push(doc);
                if out.len() >= limit {
                    return Ok(ControlFlow::Break(()));
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;
        Ok(out)
    }

    /// Documents that carry a vector and can be scored.
    pub fn embedded_documents(&self, limit: usize) -> Result<Vec<TextDocument>, StoreError> {
        self.scan_documents(limit, TextDocument::is_embedded)
    }

    /// Documents still waiting for the embedding backfill.
    pub fn pending_documents(&self, limit: usize) -> Result<Vec<TextDocument>, StoreError> {
        self.scan_documents(limit, |doc| !doc.is_embedded())
    }

    /// Indexed nearest-neighbour lookup over document embeddings.
    ///
    /// Fails with a recoverable [`VectorQueryError`] when the index is
    /// disabled, not built, stale, or cannot answer the query. Only a failure
    /// to read a matched document back from storage is fatal.
    pub fn vector_search(&self, query: &[f32], k: usize) -> Result<Vec<VectorHit>, VectorQueryError> {
        if !self.cfg.vector_index.enabled {
            return Err(VectorQueryError::IndexUnavailable(
                "disabled by configuration".into(),
            ));
        }

        let neighbours = {
            let slot = self
                .vector_index
                .read()
                .map_err(|_| VectorQueryError::QueryFailed("vector index lock poisoned".into()))?;
            let index = slot
                .index
                .as_ref()
                .ok_or_else(|| VectorQueryError::IndexUnavailable("not built".into()))?;
            if slot.stale {
                return Err(VectorQueryError::IndexUnavailable(
                    "stale, documents changed since the last build".into(),
                ));
            }
            index.search(query, k)?
        };

        let mut hits = Vec::with_capacity(neighbours.len());
        for neighbour in neighbours {
            let document = self
                .get(Collection::Documents, &neighbour.id)
                .map_err(VectorQueryError::Hydrate)?
                .and_then(|e| e.into_document())
                .ok_or_else(|| {
                    VectorQueryError::QueryFailed(format!(
                        "indexed document {} is no longer stored",
                        neighbour.id
                    ))
                })?;
            hits.push(VectorHit {
                document,
                score: neighbour.score,
            });
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        Collection, DocumentStore, Entity, IndexState, InMemoryBackend, ScanVisitor, StoreBackend,
        StoreConfig, StoreError, TextDocument, VectorIndexConfig, VectorQueryError,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;

    /// Holds the first armed `documents` scan open until the test lets it go.
    struct GatedBackend {
        inner: InMemoryBackend,
        armed: Arc<AtomicBool>,
        scanned: Arc<Barrier>,
        resume: Arc<Barrier>,
    }

    impl StoreBackend for GatedBackend {
        fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
            self.inner.put(table, key, value)
        }
        fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(table, key)
        }
        fn batch_put(&self, table: &str, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
            self.inner.batch_put(table, entries)
        }
        fn scan(&self, table: &str, visitor: &mut ScanVisitor<'_>) -> Result<(), StoreError> {
            self.inner.scan(table, visitor)?;
            if table == Collection::Documents.name() && self.armed.swap(false, Ordering::SeqCst) {
                self.scanned.wait();
                self.resume.wait();
            }
            Ok(())
        }
        fn count(&self, table: &str) -> Result<usize, StoreError> {
            self.inner.count(table)
        }
        fn clear(&self, table: &str) -> Result<usize, StoreError> {
            self.inner.clear(table)
        }
    }

    fn store_with(cfg: VectorIndexConfig) -> DocumentStore {
        DocumentStore::with_backend(
            StoreConfig::new().with_vector_index(cfg),
            Box::new(InMemoryBackend::new()),
        )
    }

    fn embedded(title: &str, hot: usize) -> Entity {
        let mut v = vec![0.05; 4];
        v[hot] = 1.0;
        Entity::from(TextDocument::new(title, title).with_embedding(v, "test-model"))
    }

    fn seed(store: &DocumentStore, n: usize) {
        for i in 0..n {
            let mut e = embedded(&format!("doc {i}"), i % 4);
            e.set_id(format!("d{i:02}"));
            store.insert(e).unwrap();
        }
    }

    #[test]
    fn scan_filters_split_embedded_and_pending() {
        let store = store_with(VectorIndexConfig::default());
        seed(&store, 3);
        store
            .insert(Entity::from(TextDocument::new("sin vector", "texto")))
            .unwrap();

        assert_eq!(store.embedded_documents(100).unwrap().len(), 3);
        assert_eq!(store.embedded_documents(2).unwrap().len(), 2);
        let pending = store.pending_documents(100).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "sin vector");
    }

    #[test]
    fn unbuilt_index_is_unavailable() {
        let store = store_with(VectorIndexConfig::default());
        seed(&store, 12);
        let err = store.vector_search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap_err();
        assert!(matches!(err, VectorQueryError::IndexUnavailable(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn built_index_returns_hydrated_documents() {
        let store = store_with(VectorIndexConfig::default());
        seed(&store, 12);
        let status = store.build_vector_index().unwrap();
        assert_eq!(status.state, IndexState::Ready);
        assert_eq!(status.vectors, 12);
        assert_eq!(status.dimension, Some(4));

        let hits = store.vector_search(&[0.0, 0.0, 1.0, 0.0], 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|h| h.document.embeddings.as_ref().unwrap()[2] == 1.0));
    }

    #[test]
    fn writing_embeddings_marks_index_stale() {
        let store = store_with(VectorIndexConfig::default());
        seed(&store, 12);
        store.build_vector_index().unwrap();

        store.insert(embedded("nuevo", 1)).unwrap();
        assert_eq!(store.vector_index_status().state, IndexState::Stale);
        let err = store.vector_search(&[0.0, 1.0, 0.0, 0.0], 1).unwrap_err();
        assert!(matches!(err, VectorQueryError::IndexUnavailable(_)));

        store.build_vector_index().unwrap();
        assert_eq!(store.vector_index_status().state, IndexState::Ready);
    }

    #[test]
    fn write_during_rebuild_scan_leaves_index_stale() {
        let armed = Arc::new(AtomicBool::new(false));
        let scanned = Arc::new(Barrier::new(2));
        let resume = Arc::new(Barrier::new(2));
        let backend = GatedBackend {
            inner: InMemoryBackend::new(),
            armed: Arc::clone(&armed),
            scanned: Arc::clone(&scanned),
            resume: Arc::clone(&resume),
        };
        let store = Arc::new(DocumentStore::with_backend(
            StoreConfig::new(),
            Box::new(backend),
        ));
        seed(&store, 12);

        armed.store(true, Ordering::SeqCst);
        let rebuild = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.build_vector_index())
        };

        // The rebuild has read every document but not installed the index yet.
        scanned.wait();
        let mut late = embedded("tardío", 3);
        late.set_id("zz_new".to_string());
        store.insert(late).unwrap();
        resume.wait();

        let status = rebuild.join().unwrap().unwrap();
        assert_eq!(status.state, IndexState::Stale);
        assert_eq!(status.vectors, 12);
        assert_eq!(store.vector_index_status().state, IndexState::Stale);
        assert!(store.vector_search(&[0.0, 0.0, 0.0, 1.0], 1).is_err());

        // A quiet rebuild picks the late document up.
        let status = store.build_vector_index().unwrap();
        assert_eq!(status.state, IndexState::Ready);
        assert_eq!(status.vectors, 13);
    }

    #[test]
    fn pending_documents_do_not_stale_the_index() {
        let store = store_with(VectorIndexConfig::default());
        seed(&store, 12);
        store.build_vector_index().unwrap();
        store
            .insert(Entity::from(TextDocument::new("pendiente", "texto")))
            .unwrap();
        assert_eq!(store.vector_index_status().state, IndexState::Ready);
    }

    #[test]
    fn disabled_index_reports_disabled() {
        let store = store_with(VectorIndexConfig::default().with_enabled(false));
        seed(&store, 12);
        assert_eq!(store.build_vector_index().unwrap().state, IndexState::Disabled);
        assert!(store.vector_search(&[1.0, 0.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn small_corpus_leaves_index_absent() {
        let store = store_with(VectorIndexConfig::default());
        seed(&store, 3);
        assert_eq!(store.build_vector_index().unwrap().state, IndexState::Absent);
    }
}
