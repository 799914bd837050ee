//! Row types for the catalog, its derived stats, and the combined view.

use serde::{Deserialize, Serialize};

/// One registered image directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub id: i64,
    pub title: String,
    pub creator: String,
    pub path: String,
    pub media: String,
    pub mark: String,
    pub fav: i64,
    pub info: String,
    pub date: Option<String>,
    pub count: i64,
}

impl CatalogRecord {
    /// Negative fav marks the record for the next purge.
    pub fn is_pending_deletion(&self) -> bool {
        self.fav < 0
    }
}

/// Cached file statistics for one catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub id: i64,
    pub file_count: i64,
    pub total_size_mb: i64,
}

/// A catalog row, with its stats when it was read from the combined view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub record: CatalogRecord,
    pub stats: Option<DerivedStats>,
}

/// Fields supplied when registering a directory.
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub title: String,
    pub creator: String,
    pub path: String,
    pub media: String,
    pub mark: String,
    pub info: String,
}

/// Editable fields of an existing record. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub path: Option<String>,
    pub media: Option<String>,
    pub mark: Option<String>,
    pub fav: Option<i64>,
    pub info: Option<String>,
}

impl RecordUpdate {
    /// Apply to `record`, returning the merged row.
    pub fn apply(&self, record: &CatalogRecord) -> CatalogRecord {
        CatalogRecord {
            id: record.id,
            title: self.title.clone().unwrap_or_else(|| record.title.clone()),
            creator: self.creator.clone().unwrap_or_else(|| record.creator.clone()),
            path: self.path.clone().unwrap_or_else(|| record.path.clone()),
            media: self.media.clone().unwrap_or_else(|| record.media.clone()),
            mark: self.mark.clone().unwrap_or_else(|| record.mark.clone()),
            fav: self.fav.unwrap_or(record.fav),
            info: self.info.clone().unwrap_or_else(|| record.info.clone()),
            date: record.date.clone(),
            count: record.count,
        }
    }
}

/// A creator with the number of records and their highest fav.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorSummary {
    pub creator: String,
    pub records: i64,
    pub max_fav: i64,
}
