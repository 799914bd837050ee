pub const SCHEMA: &str = r#"
-- Catalog: one row per registered image directory
CREATE TABLE IF NOT EXISTS catalog (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL DEFAULT '',
    creator TEXT NOT NULL DEFAULT '',
    path TEXT NOT NULL UNIQUE,
    media TEXT NOT NULL DEFAULT '',
    mark TEXT NOT NULL DEFAULT '',
    fav INTEGER NOT NULL DEFAULT 0,   -- negative means pending deletion
    info TEXT NOT NULL DEFAULT '',
    date TEXT,
    count INTEGER NOT NULL DEFAULT 0  -- view counter
);

CREATE INDEX IF NOT EXISTS idx_catalog_mark ON catalog(mark);
CREATE INDEX IF NOT EXISTS idx_catalog_creator ON catalog(creator);
CREATE INDEX IF NOT EXISTS idx_catalog_fav ON catalog(fav);

-- Derived per-directory statistics, recomputable from disk at any time
CREATE TABLE IF NOT EXISTS catalog_stats (
    id INTEGER PRIMARY KEY,
    file_count INTEGER NOT NULL,
    total_size INTEGER NOT NULL,      -- megabytes, rounded
    FOREIGN KEY (id) REFERENCES catalog(id) ON DELETE CASCADE
);

-- Catalog rows joined with their stats. Rows without stats drop out, which
-- is what the drift check counts.
CREATE VIEW IF NOT EXISTS catalog_view AS
SELECT c.id, c.title, c.creator, c.path, c.media, c.mark, c.fav, c.info, c.date, c.count,
       s.file_count, s.total_size
FROM catalog c
JOIN catalog_stats s ON s.id = c.id;
"#;

/// Pragmas applied to every connection.
pub const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";
