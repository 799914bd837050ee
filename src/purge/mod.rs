//! Removal of records marked for deletion (negative fav).

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::db::Database;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeMode {
    /// Remove catalog and stats rows, leave directories alone.
    DataOnly,
    /// Also delete each record's directory from disk.
    WithDirectories,
}

impl PurgeMode {
    pub fn from_data_only(data_only: bool) -> Self {
        if data_only {
            PurgeMode::DataOnly
        } else {
            PurgeMode::WithDirectories
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedItem {
    pub id: i64,
    pub path: String,
}

/// What an interactive purge ended with.
#[derive(Debug)]
pub enum PurgeOutcome {
    NothingPending,
    Aborted,
    Purged(PurgeReport),
}

#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    pub removed: Vec<PurgedItem>,
    /// Directories that could not be deleted; their rows were kept.
    pub failed: Vec<(PurgedItem, String)>,
    /// Items no longer pending when their turn came (fav raised, path
    /// changed or record gone). Nothing was touched for them.
    pub skipped: Vec<PurgedItem>,
}

/// Ask `prompt` on `output` and read one answer line from `input`.
///
/// Only `y` or `yes` (any case) confirms.
pub fn confirm<R: BufRead, W: Write>(prompt: &str, input: &mut R, output: &mut W) -> io::Result<bool> {
    write!(output, "{} (y/n) ", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Recursively delete `path`. A directory that is already gone is fine.
fn remove_directory(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

pub struct Purger<'a> {
    db: &'a Database,
}

impl<'a> Purger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Records that the next purge would remove.
    pub fn pending(&self) -> Result<Vec<PurgedItem>> {
        Ok(self
            .db
            .catalog()
            .negative_fav()?
            .into_iter()
            .map(|(id, path)| PurgedItem { id, path })
            .collect())
    }

    /// Purge everything currently pending.
    pub fn purge(&self, mode: PurgeMode) -> Result<PurgeReport> {
        let pending = self.pending()?;
        self.purge_items(&pending, mode)
    }

    /// Purge exactly `items`. Each one is re-read first and only removed if
    /// it still has a negative fav and the same path.
    pub fn purge_items(&self, items: &[PurgedItem], mode: PurgeMode) -> Result<PurgeReport> {
        let mut report = PurgeReport::default();

        for item in items.iter().cloned() {
            let still_pending = match self.db.catalog().get(item.id)? {
                Some(record) => record.is_pending_deletion() && record.path == item.path,
                None => false,
            };
            if !still_pending {
                info!(id = item.id, path = %item.path, "no longer pending, skipped");
                report.skipped.push(item);
                continue;
            }

            if mode == PurgeMode::WithDirectories {
                match remove_directory(Path::new(&item.path)) {
                    Ok(true) => info!(path = %item.path, "directory removed"),
                    Ok(false) => {}
                    Err(e) => {
                        warn!(id = item.id, path = %item.path, error = %e, "failed to remove directory");
                        report.failed.push((item, e.to_string()));
                        continue;
                    }
                }
            }
            self.db.catalog().delete(item.id)?;
            report.removed.push(item);
        }

        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            ?mode,
            "purge finished"
        );
        Ok(report)
    }

    /// List pending records on `output`, ask for confirmation on `input`
    /// unless `assume_yes`, then purge.
    pub fn purge_interactive<R: BufRead, W: Write>(
        &self,
        mode: PurgeMode,
        assume_yes: bool,
        input: &mut R,
        output: &mut W,
    ) -> Result<PurgeOutcome> {
        let pending = self.pending()?;
        if pending.is_empty() {
            return Ok(PurgeOutcome::NothingPending);
        }

        for item in &pending {
            writeln!(output, "{:>5}  {}", item.id, item.path)?;
        }
        if mode == PurgeMode::WithDirectories {
            writeln!(output, "These directories will be deleted from disk.")?;
        }

        if !assume_yes && !confirm("Proceed?", input, output)? {
            info!(pending = pending.len(), "purge aborted by operator");
            return Ok(PurgeOutcome::Aborted);
        }
        Ok(PurgeOutcome::Purged(self.purge_items(&pending, mode)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{memory_db, new_record};
    use crate::db::DerivedStats;
    use tempfile::tempdir;

    fn setup(root: &Path) -> (Database, i64, i64, std::path::PathBuf) {
        let doomed_dir = root.join("doomed");
        fs::create_dir(&doomed_dir).unwrap();
        fs::write(doomed_dir.join("a.jpg"), b"1").unwrap();
        let kept_dir = root.join("kept");
        fs::create_dir(&kept_dir).unwrap();

        let db = memory_db();
        let doomed = db
            .catalog()
            .insert(&new_record(&doomed_dir.to_string_lossy(), "doomed"))
            .unwrap();
        let kept = db
            .catalog()
            .insert(&new_record(&kept_dir.to_string_lossy(), "kept"))
            .unwrap();
        db.catalog().add_fav(doomed, -1).unwrap();
        db.stats()
            .insert(&DerivedStats { id: doomed, file_count: 1, total_size_mb: 0 })
            .unwrap();
        (db, doomed, kept, doomed_dir)
    }

    #[test]
    fn test_data_only_leaves_directories() {
        let root = tempdir().unwrap();
        let (db, doomed, kept, doomed_dir) = setup(root.path());

        let report = Purger::new(&db).purge(PurgeMode::DataOnly).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].id, doomed);
        assert!(doomed_dir.exists());
        assert!(db.catalog().get(doomed).unwrap().is_none());
        assert!(db.stats().get(doomed).unwrap().is_none());
        assert!(db.catalog().get(kept).unwrap().is_some());
    }

    #[test]
    fn test_with_directories_removes_from_disk() {
        let root = tempdir().unwrap();
        let (db, doomed, kept, doomed_dir) = setup(root.path());

        let report = Purger::new(&db).purge(PurgeMode::WithDirectories).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(report.failed.is_empty());
        assert!(!doomed_dir.exists());
        assert!(root.path().join("kept").exists());
        assert!(db.catalog().get(doomed).unwrap().is_none());
        assert!(db.catalog().get(kept).unwrap().is_some());
    }

    #[test]
    fn test_already_missing_directory_is_not_a_failure() {
        let db = memory_db();
        let id = db.catalog().insert(&new_record("/nowhere/at/all", "ghost")).unwrap();
        db.catalog().add_fav(id, -2).unwrap();

        let purger = Purger::new(&db);
        assert_eq!(purger.pending().unwrap().len(), 1);
        let report = purger.purge(PurgeMode::WithDirectories).unwrap();
        assert_eq!(report.removed, vec![PurgedItem { id, path: "/nowhere/at/all".to_string() }]);
        assert!(purger.pending().unwrap().is_empty());
    }

    #[test]
    fn test_confirm_answers() {
        let mut out = Vec::new();
        assert!(confirm("Proceed?", &mut "y\n".as_bytes(), &mut out).unwrap());
        assert!(confirm("Proceed?", &mut " YES \n".as_bytes(), &mut out).unwrap());
        assert!(!confirm("Proceed?", &mut "n\n".as_bytes(), &mut out).unwrap());
        assert!(!confirm("Proceed?", &mut "".as_bytes(), &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("Proceed? (y/n) "));
    }

    #[test]
    fn test_interactive_abort_keeps_everything() {
        let root = tempdir().unwrap();
        let (db, doomed, _, doomed_dir) = setup(root.path());
        let purger = Purger::new(&db);

        let mut out = Vec::new();
        let outcome = purger
            .purge_interactive(PurgeMode::WithDirectories, false, &mut "n\n".as_bytes(), &mut out)
            .unwrap();
        assert!(matches!(outcome, PurgeOutcome::Aborted));
        assert!(doomed_dir.exists());
        assert!(db.catalog().get(doomed).unwrap().is_some());

        let listing = String::from_utf8(out).unwrap();
        assert!(listing.contains(&doomed_dir.to_string_lossy().to_string()));
        assert!(listing.contains("deleted from disk"));

        let outcome = purger
            .purge_interactive(PurgeMode::DataOnly, false, &mut "y\n".as_bytes(), &mut Vec::new())
            .unwrap();
        match outcome {
            PurgeOutcome::Purged(report) => assert_eq!(report.removed.len(), 1),
            other => panic!("expected Purged, got {:?}", other),
        }
        assert!(doomed_dir.exists());

        let outcome = purger
            .purge_interactive(PurgeMode::DataOnly, true, &mut "".as_bytes(), &mut Vec::new())
            .unwrap();
        assert!(matches!(outcome, PurgeOutcome::NothingPending));
    }

    /// Answers "y", changing favs the moment the answer is read.
    struct ChangesWhileAsking<'a> {
        db: &'a Database,
        demote: i64,
        restore: i64,
        answer: &'static [u8],
        pos: usize,
        fired: bool,
    }

    impl io::Read for ChangesWhileAsking<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let available = self.fill_buf()?;
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            self.consume(n);
            Ok(n)
        }
    }

    impl BufRead for ChangesWhileAsking<'_> {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            if !self.fired {
                self.fired = true;
                self.db.catalog().add_fav(self.demote, -1).unwrap();
                self.db.catalog().add_fav(self.restore, 5).unwrap();
            }
            Ok(&self.answer[self.pos..])
        }

        fn consume(&mut self, amt: usize) {
            self.pos += amt;
        }
    }

    #[test]
    fn test_interactive_purge_only_touches_confirmed_items() {
        let root = tempdir().unwrap();
        let (db, doomed, kept, doomed_dir) = setup(root.path());
        let kept_dir = root.path().join("kept");

        let mut input = ChangesWhileAsking {
            db: &db,
            demote: kept,
            restore: doomed,
            answer: b"y\n",
            pos: 0,
            fired: false,
        };
        let mut out = Vec::new();
        let outcome = Purger::new(&db)
            .purge_interactive(PurgeMode::WithDirectories, false, &mut input, &mut out)
            .unwrap();

        let listing = String::from_utf8(out).unwrap();
        assert!(!listing.contains(&kept_dir.to_string_lossy().to_string()));

        let report = match outcome {
            PurgeOutcome::Purged(report) => report,
            other => panic!("expected Purged, got {:?}", other),
        };
        assert!(report.removed.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, doomed);

        // Demoted during the prompt but never shown: left alone.
        assert!(kept_dir.exists());
        assert!(db.catalog().get(kept).unwrap().is_some());
        // Un-marked during the prompt: left alone too.
        assert!(doomed_dir.exists());
        assert!(db.catalog().get(doomed).unwrap().is_some());
    }

    #[test]
    fn test_purge_items_skips_moved_record() {
        let root = tempdir().unwrap();
        let (db, doomed, _, doomed_dir) = setup(root.path());
        let purger = Purger::new(&db);
        let pending = purger.pending().unwrap();

        let mut record = db.catalog().get(doomed).unwrap().unwrap();
        record.path = root.path().join("elsewhere").to_string_lossy().to_string();
        db.catalog().update(&record).unwrap();

        let report = purger.purge_items(&pending, PurgeMode::WithDirectories).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.skipped, pending);
        assert!(doomed_dir.exists());
    }

    #[test]
    fn test_nothing_pending() {
        let db = memory_db();
        let report = Purger::new(&db).purge(PurgeMode::WithDirectories).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(PurgeMode::from_data_only(true), PurgeMode::DataOnly);
    }
}
