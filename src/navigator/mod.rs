//! Ordered listing and positioning over the images in one directory.
//!
//! Nothing is cached: each call lists the directory again, so an index is
//! only meaningful for the instant it was computed.

use std::path::Path;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Normalize path separators so listings compare equal across platforms.
pub fn normalize_separators(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}

/// Normalize a directory path as it is stored in the catalog.
pub fn normalize_dir(dir: &str) -> String {
    let dir = normalize_separators(dir);
    if dir.len() <= 1 {
        return dir;
    }
    match dir.strip_suffix('/').or_else(|| dir.strip_suffix('\\')) {
        Some(trimmed) => trimmed.to_string(),
        None => dir,
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryNavigator {
    extensions: Vec<String>,
}

impl DirectoryNavigator {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    fn is_image(&self, path: &Path) -> bool {
        match path.extension() {
            Some(ext) => {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                self.extensions.iter().any(|e| *e == ext_lower)
            }
            None => false,
        }
    }

    /// Image files directly inside `dir`, in file name order.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| Error::Listing {
                path: Path::new(dir).to_path_buf(),
                source,
            })?;
            if entry.file_type().is_file() && self.is_image(entry.path()) {
                files.push(normalize_separators(&entry.path().to_string_lossy()));
            }
        }

        Ok(files)
    }

    pub fn count(&self, dir: &str) -> Result<usize> {
        Ok(self.list(dir)?.len())
    }

    pub fn first(&self, dir: &str) -> Result<Option<String>> {
        Ok(self.list(dir)?.into_iter().next())
    }

    pub fn last(&self, dir: &str) -> Result<Option<String>> {
        Ok(self.list(dir)?.pop())
    }

    pub fn position_of(&self, dir: &str, file: &str) -> Result<Option<usize>> {
        let file = normalize_separators(file);
        Ok(self.list(dir)?.iter().position(|f| *f == file))
    }

    /// Entry after `file`, or `None` at the end or when `file` has gone away.
    pub fn next(&self, dir: &str, file: &str) -> Result<Option<String>> {
        let files = self.list(dir)?;
        let file = normalize_separators(file);
        Ok(files
            .iter()
            .position(|f| *f == file)
            .and_then(|i| files.get(i + 1).cloned()))
    }

    /// Entry before `file`, or `None` at the start or when `file` has gone away.
    pub fn prev(&self, dir: &str, file: &str) -> Result<Option<String>> {
        let files = self.list(dir)?;
        let file = normalize_separators(file);
        Ok(files
            .iter()
            .position(|f| *f == file)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| files.get(i).cloned()))
    }

    /// Sum of the byte sizes of `files`.
    pub fn total_size_bytes(&self, files: &[String]) -> Result<u64> {
        let mut total = 0u64;
        for f in files {
            let metadata = std::fs::metadata(f).map_err(|source| Error::Stat {
                path: Path::new(f).to_path_buf(),
                source,
            })?;
            total += metadata.len();
        }
        Ok(total)
    }
}

impl Default for DirectoryNavigator {
    fn default() -> Self {
        Self::new(&crate::config::default_image_extensions())
    }
}
