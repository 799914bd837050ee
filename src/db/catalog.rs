//! CRUD and listing over the `catalog` table and the combined view.

use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, info};

use super::query::{Ordering, Query, QueryContext, QueryTarget, Selection};
use super::records::{CatalogEntry, CatalogRecord, CreatorSummary, DerivedStats, NewRecord};
use crate::error::{Error, Result};

pub struct CatalogStore<'a> {
    conn: &'a Connection,
}

fn record_from_row(row: &Row) -> rusqlite::Result<CatalogRecord> {
    Ok(CatalogRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        creator: row.get(2)?,
        path: row.get(3)?,
        media: row.get(4)?,
        mark: row.get(5)?,
        fav: row.get(6)?,
        info: row.get(7)?,
        date: row.get(8)?,
        count: row.get(9)?,
    })
}

fn entry_from_row(row: &Row, target: QueryTarget) -> rusqlite::Result<CatalogEntry> {
    let record = record_from_row(row)?;
    let stats = if target.has_stats() {
        Some(DerivedStats {
            id: record.id,
            file_count: row.get(10)?,
            total_size_mb: row.get(11)?,
        })
    } else {
        None
    };
    Ok(CatalogEntry { record, stats })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl<'a> CatalogStore<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Report a UNIQUE failure on `path` as `DuplicatePath` naming the row
    /// that holds it. Other errors pass through.
    fn duplicate_or(&self, err: rusqlite::Error, path: &str) -> Error {
        if !is_unique_violation(&err) {
            return err.into();
        }
        match self.get_by_path(path) {
            Ok(Some(existing)) => Error::DuplicatePath {
                path: path.to_string(),
                id: existing.id,
                title: existing.title,
            },
            _ => err.into(),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert a record dated today and return its id.
    ///
    /// Callers check the path with [`get_by_path`](Self::get_by_path) first.
    /// A UNIQUE failure from the store still becomes `DuplicatePath` and is
    /// not retried.
    pub fn insert(&self, record: &NewRecord) -> Result<i64> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        self.conn
            .execute(
                r#"
                INSERT INTO catalog (title, creator, path, media, mark, info, date)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    record.title,
                    record.creator,
                    record.path,
                    record.media,
                    record.mark,
                    record.info,
                    today
                ],
            )
            .map_err(|e| self.duplicate_or(e, &record.path))?;
        let id = self.conn.last_insert_rowid();
        info!(id, path = %record.path, "catalog record inserted");
        Ok(id)
    }

    /// Overwrite the editable columns of `record.id`. Count and date are untouched.
    pub fn update(&self, record: &CatalogRecord) -> Result<()> {
        let changed = self
            .conn
            .execute(
                r#"
                UPDATE catalog
                SET title = ?1, creator = ?2, path = ?3, media = ?4, mark = ?5, fav = ?6, info = ?7
                WHERE id = ?8
                "#,
                params![
                    record.title,
                    record.creator,
                    record.path,
                    record.media,
                    record.mark,
                    record.fav,
                    record.info,
                    record.id
                ],
            )
            .map_err(|e| self.duplicate_or(e, &record.path))?;
        if changed == 0 {
            return Err(Error::NotFound(record.id));
        }
        debug!(id = record.id, "catalog record updated");
        Ok(())
    }

    /// Delete a record and its stats row. Returns whether the record existed.
    pub fn delete(&self, id: i64) -> Result<bool> {
        self.conn
            .execute("DELETE FROM catalog_stats WHERE id = ?1", [id])?;
        let removed = self.conn.execute("DELETE FROM catalog WHERE id = ?1", [id])?;
        if removed > 0 {
            info!(id, "catalog record deleted");
        }
        Ok(removed > 0)
    }

    /// Bump the view counter. Returns false when the id is unknown.
    pub fn increment_count(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("UPDATE catalog SET count = count + 1 WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    /// Add `delta` to fav. Returns false when the id is unknown.
    pub fn add_fav(&self, id: i64, delta: i64) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE catalog SET fav = fav + ?1 WHERE id = ?2",
            params![delta, id],
        )?;
        Ok(changed > 0)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    pub fn get(&self, id: i64) -> Result<Option<CatalogRecord>> {
        Ok(self.get_entry(QueryTarget::Catalog, id)?.map(|e| e.record))
    }

    pub fn get_entry(&self, target: QueryTarget, id: i64) -> Result<Option<CatalogEntry>> {
        Ok(self
            .query(target, &Selection::Id(id), Ordering::Asc)?
            .into_iter()
            .next())
    }

    /// Record registered at `path`, if any. Absence is not an error.
    pub fn get_by_path(&self, path: &str) -> Result<Option<CatalogRecord>> {
        Ok(self
            .query(QueryTarget::Catalog, &Selection::Path(path.to_string()), Ordering::Asc)?
            .into_iter()
            .next()
            .map(|e| e.record))
    }

    pub fn max_id(&self) -> Result<Option<i64>> {
        let max = self
            .conn
            .query_row("SELECT max(id) FROM catalog", [], |row| row.get(0))?;
        Ok(max)
    }

    /// Row count of the catalog table or of the combined view.
    pub fn count(&self, target: QueryTarget) -> Result<i64> {
        let sql = format!("SELECT count(*) FROM {}", target.relation());
        let count = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// The single read path every listing goes through.
    pub fn query(
        &self,
        target: QueryTarget,
        selection: &Selection,
        ordering: Ordering,
    ) -> Result<Vec<CatalogEntry>> {
        let query = Query::build(target, selection, ordering);
        let mut stmt = self.conn.prepare(&query.sql)?;
        let entries = stmt
            .query_map(params_from_iter(query.params.iter()), |row| {
                entry_from_row(row, query.target)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Listing driven by the caller's session state.
    pub fn list(&self, target: QueryTarget, ctx: &QueryContext) -> Result<Vec<CatalogEntry>> {
        self.query(target, &ctx.selection(), ctx.ordering)
    }

    pub fn list_filtered(
        &self,
        target: QueryTarget,
        filter: &str,
        ordering: Ordering,
    ) -> Result<Vec<CatalogEntry>> {
        self.query(target, &Selection::Filter(filter.to_string()), ordering)
    }

    pub fn list_by_mark(
        &self,
        target: QueryTarget,
        mark: &str,
        ordering: Ordering,
    ) -> Result<Vec<CatalogEntry>> {
        self.query(target, &Selection::Mark(mark.to_string()), ordering)
    }

    pub fn list_by_creator(&self, target: QueryTarget, creator: &str) -> Result<Vec<CatalogEntry>> {
        self.query(target, &Selection::Creator(creator.to_string()), Ordering::Asc)
    }

    pub fn list_favorites(&self, target: QueryTarget) -> Result<Vec<CatalogEntry>> {
        self.query(target, &Selection::Favorites, Ordering::Asc)
    }

    pub fn list_most_viewed(&self, target: QueryTarget) -> Result<Vec<CatalogEntry>> {
        self.query(target, &Selection::MostViewed, Ordering::Asc)
    }

    pub fn marks(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT mark FROM catalog ORDER BY mark")?;
        let marks = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(marks)
    }

    pub fn creators(&self) -> Result<Vec<CreatorSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT creator, count(*), max(fav)
            FROM catalog
            GROUP BY creator
            ORDER BY creator
            "#,
        )?;
        let creators = stmt
            .query_map([], |row| {
                Ok(CreatorSummary {
                    creator: row.get(0)?,
                    records: row.get(1)?,
                    max_fav: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(creators)
    }

    /// Every catalog id, ascending.
    pub fn ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM catalog ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// (id, path) of every record, ascending by id.
    pub fn paths(&self) -> Result<Vec<(i64, String)>> {
        self.id_paths("SELECT id, path FROM catalog ORDER BY id")
    }

    /// (id, path) of records pending deletion.
    pub fn negative_fav(&self) -> Result<Vec<(i64, String)>> {
        self.id_paths("SELECT id, path FROM catalog WHERE fav < 0 ORDER BY id")
    }

    fn id_paths(&self, sql: &str) -> Result<Vec<(i64, String)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_db, new_record};
    use crate::db::RecordUpdate;

    #[test]
    fn test_insert_then_get_by_path() {
        let db = memory_db();
        let store = db.catalog();
        let id = store.insert(&new_record("/pics/a", "Alpha")).unwrap();

        let record = store.get_by_path("/pics/a").unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.title, "Alpha");
        assert_eq!(record.fav, 0);
        assert_eq!(record.count, 0);
        assert!(record.date.is_some());
        assert_eq!(store.max_id().unwrap(), Some(id));
        assert!(store.get_by_path("/pics/b").unwrap().is_none());
    }

    #[test]
    fn test_store_rejects_duplicate_path() {
        let db = memory_db();
        let store = db.catalog();
        let first = store.insert(&new_record("/pics/a", "Alpha")).unwrap();
        let second = store.insert(&new_record("/pics/b", "Beta")).unwrap();

        let err = store.insert(&new_record("/pics/a", "Again")).unwrap_err();
        match err {
            Error::DuplicatePath { path, id, title } => {
                assert_eq!(path, "/pics/a");
                assert_eq!(id, first);
                assert_eq!(title, "Alpha");
            }
            other => panic!("expected DuplicatePath, got {:?}", other),
        }
        assert_eq!(store.count(QueryTarget::Catalog).unwrap(), 1);

        let mut other = store.get(second).unwrap().unwrap();
        other.path = "/pics/a".to_string();
        assert!(matches!(
            store.update(&other),
            Err(Error::DuplicatePath { id, .. }) if id == first
        ));
        assert_eq!(store.get(second).unwrap().unwrap().path, "/pics/b");
    }

    #[test]
    fn test_ids_are_monotonic() {
        let db = memory_db();
        let store = db.catalog();
        let a = store.insert(&new_record("/a", "a")).unwrap();
        store.delete(a).unwrap();
        let b = store.insert(&new_record("/b", "b")).unwrap();
        assert!(b > a);
        assert_eq!(store.ids().unwrap(), vec![b]);
    }

    #[test]
    fn test_update_and_missing_id() {
        let db = memory_db();
        let store = db.catalog();
        let id = store.insert(&new_record("/pics/a", "Alpha")).unwrap();
        let current = store.get(id).unwrap().unwrap();

        let update = RecordUpdate {
            title: Some("Beta".to_string()),
            fav: Some(3),
            ..Default::default()
        };
        store.update(&update.apply(&current)).unwrap();
        let updated = store.get(id).unwrap().unwrap();
        assert_eq!(updated.title, "Beta");
        assert_eq!(updated.fav, 3);
        assert_eq!(updated.path, "/pics/a");

        let mut ghost = updated.clone();
        ghost.id = 999;
        assert!(matches!(store.update(&ghost), Err(Error::NotFound(999))));
    }

    #[test]
    fn test_counters() {
        let db = memory_db();
        let store = db.catalog();
        let id = store.insert(&new_record("/pics/a", "Alpha")).unwrap();

        assert!(store.increment_count(id).unwrap());
        assert!(store.increment_count(id).unwrap());
        assert!(store.add_fav(id, 1).unwrap());
        assert!(store.add_fav(id, -3).unwrap());
        assert!(!store.increment_count(id + 1).unwrap());

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.count, 2);
        assert_eq!(record.fav, -2);
        assert!(record.is_pending_deletion());
        assert_eq!(store.negative_fav().unwrap(), vec![(id, "/pics/a".to_string())]);
    }

    #[test]
    fn test_listings() {
        let db = memory_db();
        let store = db.catalog();
        let mut first = new_record("/pics/cats", "Cats");
        first.mark = "best".to_string();
        first.creator = "alice".to_string();
        let a = store.insert(&first).unwrap();
        let mut second = new_record("/pics/dogs", "Dogs");
        second.info = "has a cat too".to_string();
        second.creator = "bob".to_string();
        let b = store.insert(&second).unwrap();
        let mut third = new_record("/pics/birds", "Birds");
        third.creator = "alice".to_string();
        let c = store.insert(&third).unwrap();

        store.add_fav(a, 2).unwrap();
        store.add_fav(c, 5).unwrap();
        store.add_fav(b, -1).unwrap();
        store.increment_count(b).unwrap();

        let ids = |entries: Vec<CatalogEntry>| entries.iter().map(|e| e.record.id).collect::<Vec<_>>();

        let filtered = store.list_filtered(QueryTarget::Catalog, "cat", Ordering::Desc).unwrap();
        assert_eq!(ids(filtered), vec![b, a]);
        let filtered = store.list_filtered(QueryTarget::Catalog, "Cat", Ordering::Asc).unwrap();
        assert_eq!(ids(filtered), vec![a]);

        assert_eq!(ids(store.list_by_mark(QueryTarget::Catalog, "best", Ordering::Asc).unwrap()), vec![a]);
        assert_eq!(ids(store.list_by_creator(QueryTarget::Catalog, "alice").unwrap()), vec![a, c]);
        assert_eq!(ids(store.list_favorites(QueryTarget::Catalog).unwrap()), vec![c, a]);
        assert_eq!(ids(store.list_most_viewed(QueryTarget::Catalog).unwrap()), vec![b]);
        assert_eq!(
            ids(store.query(QueryTarget::Catalog, &Selection::All, Ordering::Title).unwrap()),
            vec![c, a, b]
        );
        assert_eq!(
            ids(store.query(QueryTarget::Catalog, &Selection::FromId(b), Ordering::Asc).unwrap()),
            vec![b, c]
        );

        assert_eq!(store.marks().unwrap(), vec!["".to_string(), "best".to_string()]);
        assert_eq!(
            store.creators().unwrap(),
            vec![
                CreatorSummary { creator: "alice".to_string(), records: 2, max_fav: 5 },
                CreatorSummary { creator: "bob".to_string(), records: 1, max_fav: -1 },
            ]
        );
    }

    #[test]
    fn test_context_listing() {
        let db = memory_db();
        let store = db.catalog();
        let mut marked = new_record("/x/1", "One");
        marked.mark = "keep".to_string();
        let a = store.insert(&marked).unwrap();
        let b = store.insert(&new_record("/x/2", "Two")).unwrap();

        let ctx = QueryContext::default().with_ordering(Ordering::Desc);
        let all: Vec<i64> = store.list(QueryTarget::Catalog, &ctx).unwrap().iter().map(|e| e.record.id).collect();
        assert_eq!(all, vec![b, a]);

        let ctx = ctx.with_mark("keep");
        let marked: Vec<i64> = store.list(QueryTarget::Catalog, &ctx).unwrap().iter().map(|e| e.record.id).collect();
        assert_eq!(marked, vec![a]);
    }

    #[test]
    fn test_combined_view_needs_stats() {
        let db = memory_db();
        let store = db.catalog();
        let id = store.insert(&new_record("/pics/a", "Alpha")).unwrap();

        assert!(store.get_entry(QueryTarget::Combined, id).unwrap().is_none());
        assert_eq!(store.count(QueryTarget::Combined).unwrap(), 0);

        db.stats()
            .insert(&DerivedStats { id, file_count: 4, total_size_mb: 2 })
            .unwrap();
        let entry = store.get_entry(QueryTarget::Combined, id).unwrap().unwrap();
        assert_eq!(entry.stats, Some(DerivedStats { id, file_count: 4, total_size_mb: 2 }));
        assert!(store.get_entry(QueryTarget::Catalog, id).unwrap().unwrap().stats.is_none());
    }

    #[test]
    fn test_delete_removes_stats_row() {
        let db = memory_db();
        let store = db.catalog();
        let id = store.insert(&new_record("/pics/a", "Alpha")).unwrap();
        db.stats()
            .insert(&DerivedStats { id, file_count: 1, total_size_mb: 0 })
            .unwrap();

        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert!(db.stats().get(id).unwrap().is_none());
    }
}
