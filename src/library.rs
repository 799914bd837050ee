//! Request-level operations over one catalog database.
//!
//! Each method is one request: it re-reads whatever it needs from the store
//! and the disk and keeps no state between calls.

use std::path::Path;
use tracing::{info, warn};

use crate::config::Config;
use crate::consistency::{ConsistencyChecker, DriftState};
use crate::db::{
    CatalogEntry, CatalogRecord, Database, NewRecord, Ordering, QueryTarget, RecordUpdate,
};
use crate::error::{Error, Result};
use crate::navigator::{normalize_dir, normalize_separators, DirectoryNavigator};
use crate::purge::Purger;
use crate::stats::{DerivedStatsManager, RebuildReport};

/// Where to go from the current image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Stay,
    First,
    Last,
    Next,
    Prev,
}

impl Move {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "" | "stay" => Some(Move::Stay),
            "first" => Some(Move::First),
            "last" => Some(Move::Last),
            "next" => Some(Move::Next),
            "prev" => Some(Move::Prev),
            _ => None,
        }
    }
}

/// Navigation hit the edge of the listing and stayed put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    First,
    Last,
}

impl Boundary {
    pub fn notice(&self) -> &'static str {
        match self {
            Boundary::First => "this is the first image",
            Boundary::Last => "this is the last image",
        }
    }
}

/// Result of one navigation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub path: String,
    /// Zero-based index in the listing at the time of the call.
    pub position: usize,
    pub count: usize,
    /// Title of the record that owns the directory, when registered.
    pub title: Option<String>,
    pub boundary: Option<Boundary>,
}

/// A record opened for display, with its current images.
#[derive(Debug, Clone)]
pub struct ItemView {
    pub entry: CatalogEntry,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub records: i64,
    pub with_stats: i64,
    pub drift: DriftState,
}

pub struct Library {
    db: Database,
    navigator: DirectoryNavigator,
}

impl Library {
    /// Open (and create if needed) the database named by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let db = Database::open(&config.db_path)?;
        db.initialize()?;
        let navigator = DirectoryNavigator::new(&config.scanner.image_extensions);
        Ok(Self::new(db, navigator))
    }

    pub fn new(db: Database, navigator: DirectoryNavigator) -> Self {
        Self { db, navigator }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn navigator(&self) -> &DirectoryNavigator {
        &self.navigator
    }

    pub fn stats_manager(&self) -> DerivedStatsManager<'_> {
        DerivedStatsManager::new(&self.db, &self.navigator)
    }

    pub fn checker(&self) -> ConsistencyChecker<'_> {
        ConsistencyChecker::new(&self.db)
    }

    pub fn purger(&self) -> Purger<'_> {
        Purger::new(&self.db)
    }

    // ========================================================================
    // Catalog edits
    // ========================================================================

    /// Register an existing directory and compute its stats.
    ///
    /// The record and its stats are written separately; if the stats step
    /// fails the record stays and the drift check will report it.
    pub fn add_item(&self, mut new: NewRecord) -> Result<CatalogRecord> {
        if !Path::new(&new.path).is_dir() {
            return Err(Error::MissingDirectory(new.path));
        }
        new.path = normalize_dir(&new.path);
        new.title = new.title.trim().to_string();
        new.info = new.info.trim().to_string();

        self.checker().check_duplicate_path(&new.path)?;
        let id = self.db.catalog().insert(&new)?;
        self.stats_manager().recompute(id)?;

        self.db.catalog().get(id)?.ok_or(Error::NotFound(id))
    }

    /// Edit a record. Stats are recomputed when the path changes.
    pub fn update_item(&self, id: i64, mut update: RecordUpdate) -> Result<CatalogRecord> {
        let current = self.db.catalog().get(id)?.ok_or(Error::NotFound(id))?;

        update.path = update.path.map(|p| normalize_dir(&p));
        update.title = update.title.map(|t| t.trim().to_string());
        update.info = update.info.map(|i| i.trim().to_string());

        let updated = update.apply(&current);
        if updated.path != current.path {
            if !Path::new(&updated.path).is_dir() {
                return Err(Error::MissingDirectory(updated.path));
            }
            self.checker().check_duplicate_path(&updated.path)?;
        }
        self.db.catalog().update(&updated)?;
        info!(id, "catalog record updated");

        if updated.path != current.path {
            self.stats_manager().recompute(id)?;
        }
        Ok(updated)
    }

    pub fn delete_item(&self, id: i64) -> Result<bool> {
        self.db.catalog().delete(id)
    }

    pub fn favorite(&self, id: i64) -> Result<()> {
        self.adjust_fav(id, 1)
    }

    pub fn unfavorite(&self, id: i64) -> Result<()> {
        self.adjust_fav(id, -1)
    }

    fn adjust_fav(&self, id: i64, delta: i64) -> Result<()> {
        if self.db.catalog().add_fav(id, delta)? {
            Ok(())
        } else {
            Err(Error::NotFound(id))
        }
    }

    // ========================================================================
    // Viewing
    // ========================================================================

    /// Open a record: list its images and count the view.
    ///
    /// `Ordering::Desc` reverses the listing; other orderings keep it.
    pub fn view_item(&self, id: i64, ordering: Ordering) -> Result<ItemView> {
        let catalog = self.db.catalog();
        let entry = match catalog.get_entry(QueryTarget::Combined, id)? {
            Some(entry) => entry,
            None => catalog
                .get_entry(QueryTarget::Catalog, id)?
                .ok_or(Error::NotFound(id))?,
        };

        let mut files = self.navigator.list(&entry.record.path)?;
        if ordering == Ordering::Desc {
            files.reverse();
        }
        catalog.increment_count(id)?;

        Ok(ItemView { entry, files })
    }

    /// Move from `image` within its directory.
    ///
    /// At either end the current path is kept and a boundary is reported.
    /// `image` must be one of the directory's listed images.
    pub fn step(&self, image: &str, movement: Move) -> Result<Step> {
        let image = normalize_separators(image);
        let image_path = Path::new(&image);
        if !image_path.is_file() {
            return Err(Error::ImageNotFound(image));
        }
        let dir = match image_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => normalize_separators(&p.to_string_lossy()),
            _ => ".".to_string(),
        };
        // Spelled the way the listing spells its entries.
        let key = match image_path.file_name() {
            Some(name) => normalize_separators(&Path::new(&dir).join(name).to_string_lossy()),
            None => return Err(Error::ImageNotFound(image)),
        };

        let files = self.navigator.list(&dir)?;
        let current = match files.iter().position(|f| *f == key) {
            Some(i) => i,
            None => return Err(Error::ImageNotFound(image)),
        };

        let last = files.len() - 1;
        let (position, boundary) = match movement {
            Move::Stay => (current, None),
            Move::First => (0, None),
            Move::Last => (last, None),
            Move::Next if current < last => (current + 1, None),
            Move::Next => (current, Some(Boundary::Last)),
            Move::Prev if current > 0 => (current - 1, None),
            Move::Prev => (current, Some(Boundary::First)),
        };
        let title = self.db.catalog().get_by_path(&dir)?.map(|r| r.title);

        Ok(Step {
            path: files[position].clone(),
            position,
            count: files.len(),
            title,
            boundary,
        })
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    pub fn status(&self) -> Result<Status> {
        let catalog = self.db.catalog();
        let records = catalog.count(QueryTarget::Catalog)?;
        let with_stats = catalog.count(QueryTarget::Combined)?;
        let drift = self.checker().check_drift()?;
        Ok(Status { records, with_stats, drift })
    }

    /// Rebuild every stats row and report the drift state afterwards.
    pub fn refresh(&self) -> Result<(RebuildReport, DriftState)> {
        let before = self.checker().check_drift()?;
        let report = self.stats_manager().rebuild_all()?;
        let after = self.checker().check_drift()?;

        if before != after {
            info!(%before, %after, "drift state changed after rebuild");
        }
        if !after.is_consistent() {
            warn!(failed = report.failed.len(), "stats still incomplete after rebuild");
        }
        Ok((report, after))
    }
}
