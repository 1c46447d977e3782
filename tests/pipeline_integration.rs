//! End-to-end: setup on a redb file, backfill, then search both paths.

use std::sync::Arc;

use chrono::Utc;
use pharmacien::{
    BackendConfig, BackfillConfig, Collection, DatasetConfig, DocumentStore, EmbedConfig,
    Provenance, SearchConfig, SearchService, StoreConfig, build_embedder, setup,
};
use tempfile::tempdir;

fn small_dataset() -> DatasetConfig {
    DatasetConfig {
        images: 5,
        documents: 30,
        proveedores: 3,
        medicamentos: 8,
        farmacias: 2,
        clientes: 6,
        doctores: 4,
        citas: 10,
        transacciones: 12,
        ..DatasetConfig::default()
    }
}

#[tokio::test]
async fn setup_then_search_on_persistent_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pharmacien.redb");
    let store_cfg = StoreConfig::default()
        .with_backend(BackendConfig::redb(path.to_string_lossy().into_owned()));

    let embedder = build_embedder(&EmbedConfig::hash(96)).unwrap();

    {
        let store = DocumentStore::new(store_cfg.clone()).unwrap();
        let report = setup(
            &store,
            Some(embedder.as_ref()),
            &small_dataset(),
            &BackfillConfig::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(report.inserted[&Collection::Documents], 30);
        assert_eq!(report.backfill.as_ref().unwrap().embedded, 30);
    }

    // Reopen: data and embeddings persisted.
    let store = Arc::new(DocumentStore::new(store_cfg).unwrap());
    assert_eq!(store.count(Collection::Documents).unwrap(), 30);
    assert_eq!(store.count(Collection::Transacciones).unwrap(), 12);
    assert!(store.pending_documents(100).unwrap().is_empty());

    let service = SearchService::new(embedder.clone(), store.clone(), SearchConfig::default());
    let query = "Administrar 1 tableta cada 8 horas durante 7 dias. No tomar con alcohol.";

    let brute = service.search(query, Some(5)).await.unwrap();
    assert_eq!(brute.source, Provenance::BruteForce);
    assert_eq!(brute.results.len(), 5);
    assert!(brute.results.windows(2).all(|w| w[0].score >= w[1].score));

    store.build_vector_index().unwrap();
    let indexed = service.search(query, Some(5)).await.unwrap();
    assert_eq!(indexed.source, Provenance::Indexed);
    assert!(!indexed.results.is_empty());
    assert!((indexed.results[0].score - brute.results[0].score).abs() < 1e-3);
}

#[tokio::test]
async fn setup_without_embedding_leaves_documents_pending() {
    let store = DocumentStore::new(StoreConfig::default()).unwrap();
    let report = setup(
        &store,
        None,
        &small_dataset(),
        &BackfillConfig::default(),
        Utc::now(),
    )
    .await
    .unwrap();
    assert!(report.backfill.is_none());
    assert_eq!(store.pending_documents(100).unwrap().len(), 30);

    // Search still answers, with nothing eligible.
    let embedder = build_embedder(&EmbedConfig::hash(96)).unwrap();
    let service = SearchService::new(embedder, Arc::new(store), SearchConfig::default());
    let outcome = service.search("dolor de cabeza", None).await.unwrap();
    assert_eq!(outcome.source, Provenance::BruteForce);
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn rerunning_setup_resets_collections() {
    let store = DocumentStore::new(StoreConfig::default()).unwrap();
    let cfg = small_dataset();
    let backfill = BackfillConfig::default();

    setup(&store, None, &cfg, &backfill, Utc::now()).await.unwrap();
    let report = setup(&store, None, &cfg, &backfill, Utc::now()).await.unwrap();

    assert_eq!(report.cleared[&Collection::Citas], 10);
    assert_eq!(store.count(Collection::Citas).unwrap(), 10);
    assert_eq!(store.counts().unwrap().values().sum::<usize>(), 80);
}
