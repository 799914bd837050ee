use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::db::{CatalogEntry, Database, Ordering, QueryTarget, Selection};
use crate::error::Result;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    /// Pick a format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

/// CSV header for an export with no rows. Must list the fields of
/// [`ExportedItem`] in declaration order.
const CSV_HEADER: [&str; 12] = [
    "id",
    "title",
    "creator",
    "path",
    "media",
    "mark",
    "fav",
    "info",
    "date",
    "count",
    "file_count",
    "total_size_mb",
];

/// Flat row written to the export file.
#[derive(Debug, Serialize)]
pub struct ExportedItem {
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
    pub file_count: Option<i64>,
    pub total_size_mb: Option<i64>,
}

impl From<CatalogEntry> for ExportedItem {
    fn from(entry: CatalogEntry) -> Self {
        let r = entry.record;
        Self {
            id: r.id,
            title: r.title,
            creator: r.creator,
            path: r.path,
            media: r.media,
            mark: r.mark,
            fav: r.fav,
            info: r.info,
            date: r.date,
            count: r.count,
            file_count: entry.stats.map(|s| s.file_count),
            total_size_mb: entry.stats.map(|s| s.total_size_mb),
        }
    }
}

/// Write the combined view to `output_path`. Returns the number of rows.
pub fn export_catalog(db: &Database, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let items: Vec<ExportedItem> = db
        .catalog()
        .query(QueryTarget::Combined, &Selection::All, Ordering::Asc)?
        .into_iter()
        .map(ExportedItem::from)
        .collect();
    let count = items.len();

    match format {
        ExportFormat::Json => export_json(&items, output_path)?,
        ExportFormat::Csv => export_csv(&items, output_path)?,
    }

    tracing::info!(count, path = %output_path.display(), format = format.extension(), "catalog exported");
    Ok(count)
}

fn export_json(items: &[ExportedItem], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(items)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(items: &[ExportedItem], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    // Header comes from the struct field names
    for item in items {
        wtr.serialize(item)?;
    }
    if items.is_empty() {
        wtr.write_record(CSV_HEADER)?;
    }

    wtr.flush()?;
    Ok(())
}
