use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to list {}: {source}", .path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no catalog record with id {0}")]
    NotFound(i64),

    #[error("path {path} is already registered (id={id} title=\"{title}\")")]
    DuplicatePath { path: String, id: i64, title: String },

    #[error("directory does not exist: {0}")]
    MissingDirectory(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error(
        "catalog has {catalog_rows} records but the combined view has {view_rows}; \
         stats are out of date, run `piccat refresh` to rebuild them"
    )]
    DriftDetected { catalog_rows: i64, view_rows: i64 },
}

impl Error {
    /// True for the filesystem failures that rebuilds skip over.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Listing { .. } | Error::Stat { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
