//! Redb (Rust embedded database) backend.
//!
//! Each collection lives in its own redb table keyed by record id. Redb is
//! ACID with MVCC, so concurrent readers never block each other and a write
//! is visible only after its transaction commits.
//!
//! # Configuration Example
//! ```yaml
//! store:
//!   backend:
//!     kind: redb
//!     path: "/data/pharmacien.redb"
//! ```

use crate::backend::ScanVisitor;
use crate::{StoreBackend, StoreError};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition, TableError,
};
use std::path::Path;
use std::sync::Arc;

fn table_def(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

/// Redb backend for persistent storage.
///
/// Redb takes an exclusive lock on the database file, so one process at a
/// time may open it.
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create a Redb database at the given path.
    ///
    /// # Example
    /// ```no_run
    /// use store::RedbBackend;
    ///
    /// let backend = RedbBackend::open("/tmp/pharmacien.redb").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::backend)?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl StoreBackend for RedbBackend {
    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut t = write_txn
                .open_table(table_def(table))
                .map_err(StoreError::backend)?;
            t.insert(key, value).map_err(StoreError::backend)?;
        }
        write_txn.commit().map_err(StoreError::backend)
    }

    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let t = match read_txn.open_table(table_def(table)) {
            Ok(t) => t,
            // Tables are created lazily by the first write.
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(StoreError::backend(e)),
        };
        let value = t.get(key).map_err(StoreError::backend)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn batch_put(&self, table: &str, entries: Vec<(String, Vec<u8>)>) -> Result<(), StoreError> {
        let write_txn = self.db.begin_write().map_err(StoreError::backend)?;
        {
            let mut t = write_txn
                .open_table(table_def(table))
                .map_err(StoreError::backend)?;
            for (key, value) in entries {
                t.insert(key.as_str(), value.as_slice())
                    .map_err(StoreError::backend)?;
            }
        }
        write_txn.commit().map_err(StoreError::backend)
    }

    fn scan(&self, table: &str, visitor: &mut ScanVisitor<'_>) -> Result<(), StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        let t = match read_txn.open_table(table_def(table)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(()),
            Err(e) => return Err(StoreError::backend(e)),
        };
        for item in t.iter().map_err(StoreError::backend)? {
            let (key, value) = item.map_err(StoreError::backend)?;
            if visitor(key.value(), value.value())?.is_break() {
                break;
            }
        }
        Ok(())
    }

    fn count(&self, table: &str) -> Result<usize, StoreError> {
        let read_txn = self.db.begin_read().map_err(StoreError::backend)?;
        match read_txn.open_table(table_def(table)) {
            Ok(t) => Ok(t.len().map_err(StoreError::backend)? as usize),
            Err(TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    fn clear(&self, table: &str) -> Result<usize, StoreError> {
        let write_txn = self.db.begin_write().map_err(StoreError::backend)?;
        let removed = {
            let t = write_txn
                .open_table(table_def(table))
                .map_err(StoreError::backend)?;
            t.len().map_err(StoreError::backend)? as usize
        };
        write_txn
            .delete_table(table_def(table))
            .map_err(StoreError::backend)?;
        write_txn.commit().map_err(StoreError::backend)?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;
    use tempfile::NamedTempFile;

    fn open_temp() -> (NamedTempFile, RedbBackend) {
        let file = NamedTempFile::new().unwrap();
        let backend = RedbBackend::open(file.path()).unwrap();
        (file, backend)
    }

    #[test]
    fn missing_table_reads_as_empty() {
        let (_file, backend) = open_temp();
        assert_eq!(backend.get("documents", "x").unwrap(), None);
        assert_eq!(backend.count("documents").unwrap(), 0);
        backend
            .scan("documents", &mut |_, _| panic!("no entries expected"))
            .unwrap();
    }

    #[test]
    fn put_get_overwrite() {
        let (_file, backend) = open_temp();
        backend.put("clientes", "c1", b"ana").unwrap();
        assert_eq!(backend.get("clientes", "c1").unwrap(), Some(b"ana".to_vec()));
        assert_eq!(backend.get("doctores", "c1").unwrap(), None);

        backend.put("clientes", "c1", b"eva").unwrap();
        assert_eq!(backend.get("clientes", "c1").unwrap(), Some(b"eva".to_vec()));
        assert_eq!(backend.count("clientes").unwrap(), 1);
    }

    #[test]
    fn batch_then_ordered_scan() {
        let (_file, backend) = open_temp();
        backend
            .batch_put(
                "citas",
                vec![
                    ("b".into(), b"2".to_vec()),
                    ("a".into(), b"1".to_vec()),
                    ("c".into(), b"3".to_vec()),
                ],
            )
            .unwrap();

        let mut seen = Vec::new();
        backend
            .scan("citas", &mut |key, value| {
                seen.push((key.to_string(), value.to_vec()));
                Ok(ControlFlow::Continue(()))
            })
            .unwrap();
        let keys: Vec<_> = seen.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(backend.count("citas").unwrap(), 3);
    }

    #[test]
    fn clear_drops_the_table() {
        let (_file, backend) = open_temp();
        backend.put("images", "i1", b"x").unwrap();
        backend.put("images", "i2", b"y").unwrap();

        assert_eq!(backend.clear("images").unwrap(), 2);
        assert_eq!(backend.count("images").unwrap(), 0);
        backend.put("images", "i3", b"z").unwrap();
        assert_eq!(backend.count("images").unwrap(), 1);
    }
}
