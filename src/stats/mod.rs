//! Recomputes the cached per-record file statistics from disk.
//!
//! `rebuild_all` is a full, non-resumable rebuild: it empties the stats table
//! and walks every record again. Rerunning it is the recovery path for any
//! partial failure.

use tracing::{debug, info, warn};

use crate::db::{Database, DerivedStats};
use crate::error::{Error, Result};
use crate::navigator::DirectoryNavigator;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Whole megabytes, rounding halves up.
pub fn bytes_to_mb(bytes: u64) -> i64 {
    (bytes as f64 / BYTES_PER_MB).round() as i64
}

/// Which branch of the upsert wrote the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsWrite {
    Inserted,
    Updated,
}

/// Outcome of [`DerivedStatsManager::rebuild_all`].
#[derive(Debug, Clone, Default)]
pub struct RebuildReport {
    /// Ids that got a fresh stats row, ascending.
    pub rebuilt: Vec<i64>,
    /// Records skipped because their directory could not be read.
    pub failed: Vec<(i64, String)>,
}

impl RebuildReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct DerivedStatsManager<'a> {
    db: &'a Database,
    navigator: &'a DirectoryNavigator,
}

impl<'a> DerivedStatsManager<'a> {
    pub fn new(db: &'a Database, navigator: &'a DirectoryNavigator) -> Self {
        Self { db, navigator }
    }

    /// Compute stats for `id` from its directory without writing them.
    pub fn measure(&self, id: i64) -> Result<DerivedStats> {
        let record = self.db.catalog().get(id)?.ok_or(Error::NotFound(id))?;
        let files = self.navigator.list(&record.path)?;
        let total = self.navigator.total_size_bytes(&files)?;
        Ok(DerivedStats {
            id,
            file_count: files.len() as i64,
            total_size_mb: bytes_to_mb(total),
        })
    }

    /// Recompute and store stats for one record.
    ///
    /// Inserts when the record has no stats row yet, updates otherwise. Any
    /// failure is returned to the caller.
    pub fn recompute(&self, id: i64) -> Result<(DerivedStats, StatsWrite)> {
        let stats = self.measure(id)?;
        let table = self.db.stats();

        let write = if table.get(id)?.is_some() {
            table.update(&stats)?;
            StatsWrite::Updated
        } else {
            table.insert(&stats)?;
            StatsWrite::Inserted
        };

        debug!(
            id,
            file_count = stats.file_count,
            total_size_mb = stats.total_size_mb,
            ?write,
            "stats recomputed"
        );
        Ok((stats, write))
    }

    /// Drop a record's stats so it falls out of the combined view.
    pub fn invalidate(&self, id: i64) -> Result<bool> {
        self.db.stats().delete(id)
    }

    /// Empty the stats table and recompute every record in ascending id order.
    ///
    /// A record whose directory can't be listed or stat'ed is skipped and
    /// reported; store errors abort the rebuild.
    pub fn rebuild_all(&self) -> Result<RebuildReport> {
        let cleared = self.db.stats().clear()?;
        let ids = self.db.catalog().ids()?;
        info!(cleared, records = ids.len(), "rebuilding derived stats");

        let mut report = RebuildReport::default();
        for id in ids {
            let stats = match self.measure(id) {
                Ok(stats) => stats,
                Err(e) if e.is_io() => {
                    warn!(id, error = %e, "skipping record during rebuild");
                    report.failed.push((id, e.to_string()));
                    continue;
                }
                // Deleted while the rebuild was running.
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            self.db.stats().insert(&stats)?;
            report.rebuilt.push(id);
        }

        info!(
            rebuilt = report.rebuilt.len(),
            failed = report.failed.len(),
            "derived stats rebuild finished"
        );
        Ok(report)
    }
}
