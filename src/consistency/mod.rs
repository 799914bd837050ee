//! Checks that the catalog, its stats and the disk still agree.

use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::db::{Database, QueryTarget};
use crate::error::{Error, Result};

/// Result of comparing the catalog with the combined view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftState {
    Consistent,
    /// Some records have no stats row; a full rebuild is required.
    Drifted { catalog_rows: i64, view_rows: i64 },
}

impl DriftState {
    pub fn is_consistent(&self) -> bool {
        matches!(self, DriftState::Consistent)
    }

    /// What an operator should do about this state.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            DriftState::Consistent => None,
            DriftState::Drifted { .. } => {
                Some("run `piccat refresh` to rebuild the stats table")
            }
        }
    }
}

impl fmt::Display for DriftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriftState::Consistent => write!(f, "catalog and stats are consistent"),
            DriftState::Drifted { catalog_rows, view_rows } => write!(
                f,
                "catalog has {} records but only {} have stats; {}",
                catalog_rows,
                view_rows,
                self.remediation().unwrap_or_default()
            ),
        }
    }
}

pub struct ConsistencyChecker<'a> {
    db: &'a Database,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Paths of records whose directory no longer exists.
    ///
    /// With `auto_delete`, those records and their stats rows are removed.
    pub fn sweep_missing(&self, auto_delete: bool) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for (id, path) in self.db.catalog().paths()? {
            if Path::new(&path).is_dir() {
                continue;
            }
            warn!(id, path = %path, "catalog directory is missing");
            if auto_delete {
                self.db.catalog().delete(id)?;
            }
            missing.push(path);
        }

        if auto_delete && !missing.is_empty() {
            info!(removed = missing.len(), "removed records with missing directories");
        }
        Ok(missing)
    }

    /// Fails with `DuplicatePath` when `path` is already registered.
    pub fn check_duplicate_path(&self, path: &str) -> Result<()> {
        match self.db.catalog().get_by_path(path)? {
            Some(existing) => Err(Error::DuplicatePath {
                path: path.to_string(),
                id: existing.id,
                title: existing.title,
            }),
            None => Ok(()),
        }
    }

    /// Compare catalog and combined-view row counts. Never repairs.
    pub fn check_drift(&self) -> Result<DriftState> {
        let catalog = self.db.catalog();
        let catalog_rows = catalog.count(QueryTarget::Catalog)?;
        let view_rows = catalog.count(QueryTarget::Combined)?;

        if catalog_rows == view_rows {
            Ok(DriftState::Consistent)
        } else {
            warn!(catalog_rows, view_rows, "derived stats have drifted");
            Ok(DriftState::Drifted { catalog_rows, view_rows })
        }
    }

    /// Like [`check_drift`](Self::check_drift) but drift becomes an error.
    pub fn ensure_consistent(&self) -> Result<()> {
        match self.check_drift()? {
            DriftState::Consistent => Ok(()),
            DriftState::Drifted { catalog_rows, view_rows } => {
                Err(Error::DriftDetected { catalog_rows, view_rows })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_db, new_record};
    use crate::navigator::DirectoryNavigator;
    use crate::stats::DerivedStatsManager;
    use tempfile::tempdir;

    #[test]
    fn test_sweep_reports_and_optionally_deletes() {
        let present = tempdir().unwrap();
        let db = memory_db();
        let kept = db
            .catalog()
            .insert(&new_record(&present.path().to_string_lossy(), "here"))
            .unwrap();
        let gone = db.catalog().insert(&new_record("/a/missing", "gone")).unwrap();
        db.stats()
            .insert(&crate::db::DerivedStats { id: gone, file_count: 3, total_size_mb: 1 })
            .unwrap();

        let checker = ConsistencyChecker::new(&db);
        assert_eq!(checker.sweep_missing(false).unwrap(), vec!["/a/missing".to_string()]);
        assert!(db.catalog().get(gone).unwrap().is_some());

        assert_eq!(checker.sweep_missing(true).unwrap(), vec!["/a/missing".to_string()]);
        assert!(db.catalog().get(gone).unwrap().is_none());
        assert!(db.stats().get(gone).unwrap().is_none());
        assert!(db.catalog().get(kept).unwrap().is_some());
        assert!(checker.sweep_missing(false).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_path() {
        let db = memory_db();
        let id = db.catalog().insert(&new_record("/pics/a", "Alpha")).unwrap();
        let checker = ConsistencyChecker::new(&db);

        assert!(checker.check_duplicate_path("/pics/b").is_ok());
        match checker.check_duplicate_path("/pics/a") {
            Err(Error::DuplicatePath { id: existing, title, .. }) => {
                assert_eq!(existing, id);
                assert_eq!(title, "Alpha");
            }
            other => panic!("expected DuplicatePath, got {:?}", other),
        }
    }

    #[test]
    fn test_drift_state_machine() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"1").unwrap();
        let db = memory_db();
        let nav = DirectoryNavigator::default();
        let checker = ConsistencyChecker::new(&db);

        assert_eq!(checker.check_drift().unwrap(), DriftState::Consistent);

        db.catalog()
            .insert(&new_record(&dir.path().to_string_lossy(), "no stats yet"))
            .unwrap();
        let state = checker.check_drift().unwrap();
        assert_eq!(state, DriftState::Drifted { catalog_rows: 1, view_rows: 0 });
        assert!(state.remediation().is_some());
        assert!(state.to_string().contains("piccat refresh"));
        assert!(matches!(
            checker.ensure_consistent(),
            Err(Error::DriftDetected { catalog_rows: 1, view_rows: 0 })
        ));

        // Checking again does not repair anything.
        assert!(!checker.check_drift().unwrap().is_consistent());

        DerivedStatsManager::new(&db, &nav).rebuild_all().unwrap();
        assert!(checker.check_drift().unwrap().is_consistent());
        assert!(checker.ensure_consistent().is_ok());
    }
}
