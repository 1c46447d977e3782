use crate::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::RwLock;

/// Visitor used by [`StoreBackend::scan`]. Receives key and stored bytes and
/// returns `ControlFlow::Break` to stop early.
pub type ScanVisitor<'a> = dyn FnMut(&str, &[u8]) -> Result<ControlFlow<()>, StoreError> + 'a;

/// Trait for a key-value storage backend with one table per collection.
/// This allows for different storage implementations (e.g., in-memory, Redb).
///
/// Scans visit entries in ascending key order.
pub trait StoreBackend: Send + Sync {
    /// Insert or update a key-value pair.
    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<(), StoreError>;
    /// Retrieve a value by key.
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Insert or update multiple key-value pairs in one write.
    fn batch_put(&self, table: &str, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError>;
    /// Visit every entry of a table in key order.
    fn scan(&self, table: &str, visitor: &mut ScanVisitor<'_>) -> Result<(), StoreError>;
    /// Number of entries in a table.
    fn count(&self, table: &str) -> Result<usize, StoreError>;
    /// Remove every entry of a table, returning how many were removed.
    fn clear(&self, table: &str) -> Result<usize, StoreError>;
    /// Flush any buffered writes to the backend.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Configuration for selecting and building a backend.
///
/// # Example
/// ```
/// use store::BackendConfig;
///
/// // In-memory (for testing)
/// let config = BackendConfig::in_memory();
///
/// // Redb (pure Rust, persistent)
/// let config = BackendConfig::redb("/data/pharmacien.redb");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Use Redb for storage. The `path` is the file path for the database.
    ///
    /// Requires the `backend-redb` feature (enabled by default).
    Redb { path: String },
    /// Use an in-memory ordered map. Contents are lost on drop.
    #[default]
    InMemory,
}

impl BackendConfig {
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    pub fn redb<P: Into<String>>(path: P) -> Self {
        BackendConfig::Redb { path: path.into() }
    }

    /// Build the backend described by this configuration.
    pub fn build(&self) -> Result<Box<dyn StoreBackend>, StoreError> {
        match self {
            BackendConfig::InMemory => Ok(Box::new(InMemoryBackend::new())),
            BackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Box::new(RedbBackend::open(path)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(StoreError::backend("redb backend disabled at compile time"))
                }
            }
        }
    }
}

type Table = BTreeMap<String, Vec<u8>>;

/// An in-memory backend: one `BTreeMap` per table behind a `RwLock`.
pub struct InMemoryBackend {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::backend("poisoned lock")
}

impl StoreBackend for InMemoryBackend {
    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.tables
            .write()
            .map_err(poisoned)?
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.tables.read().map_err(poisoned)?;
        Ok(guard.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn batch_put(&self, table: &str, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        // One write lock for the whole batch.
        let mut guard = self.tables.write().map_err(poisoned)?;
        let t = guard.entry(table.to_string()).or_default();
        for (key, value) in entries {
            t.insert(key, value);
        }
        Ok(())
    }

    fn scan(&self, table: &str, visitor: &mut ScanVisitor<'_>) -> Result<(), StoreError> {
        let guard = self.tables.read().map_err(poisoned)?;
        if let Some(t) = guard.get(table) {
            for (key, value) in t {
                if visitor(key, value)?.is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        let guard = self.tables.read().map_err(poisoned)?;
        Ok(guard.get(table).map(BTreeMap::len).unwrap_or(0))
    }

    fn clear(&self, table: &str) -> Result<usize, StoreError> {
        let mut guard = self.tables.write().map_err(poisoned)?;
        Ok(guard.remove(table).map(|t| t.len()).unwrap_or(0))
    }
}

/// The Redb backend implementation.
#[cfg(feature = "backend-redb")]
pub mod redb;

#[cfg(feature = "backend-redb")]
pub use redb::RedbBackend;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_isolated() {
        let backend = InMemoryBackend::new();
        backend.put("a", "k", b"1").unwrap();
        backend.put("b", "k", b"2").unwrap();

        assert_eq!(backend.get("a", "k").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.get("b", "k").unwrap(), Some(b"2".to_vec()));
        assert_eq!(backend.get("c", "k").unwrap(), None);
        assert_eq!(backend.count("a").unwrap(), 1);
    }

    #[test]
    fn scan_is_key_ordered_and_can_stop() {
        let backend = InMemoryBackend::new();
        backend
            .batch_put(
                "t",
                vec![
                    ("c".into(), b"3".to_vec()),
                    ("a".into(), b"1".to_vec()),
                    ("b".into(), b"2".to_vec()),
                ],
            )
            .unwrap();

        let mut keys = Vec::new();
        backend
            .scan("t", &mut |key, _| {
                keys.push(key.to_string());
                Ok(if keys.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn clear_reports_counts() {
        let backend = InMemoryBackend::new();
        backend.put("t", "x", b"1").unwrap();
        backend.put("t", "y", b"2").unwrap();

        assert_eq!(backend.clear("t").unwrap(), 2);
        assert_eq!(backend.count("t").unwrap(), 0);
        assert_eq!(backend.clear("missing").unwrap(), 0);
    }

    #[test]
    fn backend_config_deserializes_tagged() {
        let cfg: BackendConfig =
            serde_json::from_str(r#"{ "kind": "redb", "path": "/tmp/x.redb" }"#).unwrap();
        assert_eq!(cfg, BackendConfig::redb("/tmp/x.redb"));
        let cfg: BackendConfig = serde_json::from_str(r#"{ "kind": "in_memory" }"#).unwrap();
        assert_eq!(cfg, BackendConfig::InMemory);
    }
}
