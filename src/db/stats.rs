//! Row access for the `catalog_stats` table.

use rusqlite::{params, Connection};

use super::records::DerivedStats;
use crate::error::Result;

pub struct StatsTable<'a> {
    conn: &'a Connection,
}

impl<'a> StatsTable<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, id: i64) -> Result<Option<DerivedStats>> {
        let result = self.conn.query_row(
            "SELECT id, file_count, total_size FROM catalog_stats WHERE id = ?1",
            [id],
            |row| {
                Ok(DerivedStats {
                    id: row.get(0)?,
                    file_count: row.get(1)?,
                    total_size_mb: row.get(2)?,
                })
            },
        );
        match result {
            Ok(stats) => Ok(Some(stats)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert(&self, stats: &DerivedStats) -> Result<()> {
        self.conn.execute(
            "INSERT INTO catalog_stats (id, file_count, total_size) VALUES (?1, ?2, ?3)",
            params![stats.id, stats.file_count, stats.total_size_mb],
        )?;
        Ok(())
    }

    /// Returns the number of rows changed (0 when no row exists for the id).
    pub fn update(&self, stats: &DerivedStats) -> Result<usize> {
        let changed = self.conn.execute(
            "UPDATE catalog_stats SET file_count = ?1, total_size = ?2 WHERE id = ?3",
            params![stats.file_count, stats.total_size_mb, stats.id],
        )?;
        Ok(changed)
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM catalog_stats WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    /// Empty the table. Returns the number of rows removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM catalog_stats", [])?;
        Ok(removed)
    }

    /// Every stats row, ascending by id.
    pub fn all(&self) -> Result<Vec<DerivedStats>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, file_count, total_size FROM catalog_stats ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(DerivedStats {
                    id: row.get(0)?,
                    file_count: row.get(1)?,
                    total_size_mb: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_db, new_record};

    #[test]
    fn test_row_lifecycle() {
        let db = memory_db();
        let id = db.catalog().insert(&new_record("/p", "p")).unwrap();
        let stats = db.stats();

        assert!(stats.get(id).unwrap().is_none());
        assert_eq!(stats.update(&DerivedStats { id, file_count: 1, total_size_mb: 1 }).unwrap(), 0);

        stats.insert(&DerivedStats { id, file_count: 3, total_size_mb: 7 }).unwrap();
        assert_eq!(stats.update(&DerivedStats { id, file_count: 4, total_size_mb: 8 }).unwrap(), 1);
        assert_eq!(stats.all().unwrap(), vec![DerivedStats { id, file_count: 4, total_size_mb: 8 }]);

        assert!(stats.delete(id).unwrap());
        assert!(!stats.delete(id).unwrap());
    }

    #[test]
    fn test_stats_require_catalog_row() {
        let db = memory_db();
        let result = db.stats().insert(&DerivedStats { id: 42, file_count: 0, total_size_mb: 0 });
        assert!(result.is_err());
    }

    #[test]
    fn test_clear() {
        let db = memory_db();
        let a = db.catalog().insert(&new_record("/a", "a")).unwrap();
        let b = db.catalog().insert(&new_record("/b", "b")).unwrap();
        db.stats().insert(&DerivedStats { id: a, file_count: 0, total_size_mb: 0 }).unwrap();
        db.stats().insert(&DerivedStats { id: b, file_count: 0, total_size_mb: 0 }).unwrap();
        assert_eq!(db.stats().clear().unwrap(), 2);
        assert!(db.stats().all().unwrap().is_empty());
    }
}
