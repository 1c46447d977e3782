//! Seeded generation and hash embeddings must be reproducible.

use chrono::{DateTime, TimeDelta, Utc};
use pharmacien::{Dataset, DatasetConfig, EmbedConfig, Embedder, build_embedder, generate};
use tempfile::tempdir;

fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_100)
}

#[test]
fn same_seed_same_dataset() {
    let cfg = DatasetConfig::default().with_seed(42);
    let a = generate(&cfg, fixed_now());
    let b = generate(&cfg, fixed_now());
    assert_eq!(a, b);
}

#[test]
fn different_seed_different_dataset() {
    let a = generate(&DatasetConfig::default().with_seed(1), fixed_now());
    let b = generate(&DatasetConfig::default().with_seed(2), fixed_now());
    assert_ne!(a.text_documents[0].id, b.text_documents[0].id);
    assert_eq!(a.counts(), b.counts());
}

#[test]
fn dataset_survives_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("dataset.json");

    let original = generate(&DatasetConfig::default(), fixed_now());
    original.write_json(&path).unwrap();
    let loaded = Dataset::read_json(&path).unwrap();

    assert_eq!(loaded.counts(), original.counts());
    assert_eq!(loaded.medicamentos, original.medicamentos);
    assert_eq!(loaded.citas, original.citas);
}

#[test]
fn missing_dataset_file_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(Dataset::read_json(dir.path().join("absent.json")).is_err());
}

#[tokio::test]
async fn hash_embedder_is_deterministic_across_instances() {
    let cfg = EmbedConfig::hash(128);
    let first = build_embedder(&cfg).unwrap();
    let second = build_embedder(&cfg).unwrap();

    let text = "Administrar 1 tableta cada 8 horas durante 7 dias.";
    let a = first.embed(text).await.unwrap();
    let b = second.embed(text).await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), 128);
}
