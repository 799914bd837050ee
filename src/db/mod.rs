mod schema;
pub mod catalog;
pub mod query;
pub mod records;
pub mod stats;

use rusqlite::Connection;
use std::path::Path;

use crate::error::Result;

pub use catalog::CatalogStore;
pub use query::{Ordering, Query, QueryContext, QueryTarget, Selection};
pub use records::{
    CatalogEntry, CatalogRecord, CreatorSummary, DerivedStats, NewRecord, RecordUpdate,
};
pub use schema::{CONNECTION_PRAGMAS, SCHEMA};
pub use stats::StatsTable;

/// Handle to the relational store. Components borrow it; nothing is global.
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(Self { conn })
    }

    /// Private in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ========================================================================
    // Table accessors
    // ========================================================================

    pub fn catalog(&self) -> CatalogStore<'_> {
        CatalogStore::new(&self.conn)
    }

    pub fn stats(&self) -> StatsTable<'_> {
        StatsTable::new(&self.conn)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("pictures.db");
        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
        assert_eq!(db.catalog().count(QueryTarget::Catalog).unwrap(), 0);
        assert_eq!(db.catalog().count(QueryTarget::Combined).unwrap(), 0);
    }
}
