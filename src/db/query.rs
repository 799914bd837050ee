//! Query construction shared by every catalog read.
//!
//! A read is a `QueryTarget` (which relation), a `Selection` (which rows) and
//! an `Ordering`. Table and column names come only from these enums; every
//! user-supplied value is bound as a parameter.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

const CATALOG_COLUMNS: &str = "id, title, creator, path, media, mark, fav, info, date, count";
const COMBINED_COLUMNS: &str =
    "id, title, creator, path, media, mark, fav, info, date, count, file_count, total_size";

/// Relation a query reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryTarget {
    /// The catalog table alone.
    Catalog,
    /// The catalog joined with its derived stats.
    Combined,
}

impl QueryTarget {
    pub fn relation(&self) -> &'static str {
        match self {
            QueryTarget::Catalog => "catalog",
            QueryTarget::Combined => "catalog_view",
        }
    }

    fn columns(&self) -> &'static str {
        match self {
            QueryTarget::Catalog => CATALOG_COLUMNS,
            QueryTarget::Combined => COMBINED_COLUMNS,
        }
    }

    pub fn has_stats(&self) -> bool {
        matches!(self, QueryTarget::Combined)
    }
}

/// Sort order for listings that don't impose their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ordering {
    #[default]
    Asc,
    Desc,
    Title,
}

impl Ordering {
    fn clause(&self) -> &'static str {
        match self {
            Ordering::Asc => "id ASC",
            Ordering::Desc => "id DESC",
            Ordering::Title => "title ASC, id ASC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(Ordering::Asc),
            "desc" => Some(Ordering::Desc),
            "title" => Some(Ordering::Title),
            _ => None,
        }
    }
}

/// Which rows a query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Id(i64),
    Path(String),
    /// Substring match against title, path or info.
    Filter(String),
    Mark(String),
    Creator(String),
    /// `fav > 0`, highest first.
    Favorites,
    /// `count > 0`, most viewed first.
    MostViewed,
    /// `id >= n`.
    FromId(i64),
}

impl Selection {
    fn condition(&self) -> (Option<&'static str>, Vec<Value>) {
        match self {
            Selection::All => (None, vec![]),
            Selection::Id(id) => (Some("id = ?1"), vec![Value::Integer(*id)]),
            Selection::Path(path) => (Some("path = ?1"), vec![Value::Text(path.clone())]),
            Selection::Filter(text) => (
                Some("(instr(title, ?1) > 0 OR instr(path, ?1) > 0 OR instr(info, ?1) > 0)"),
                vec![Value::Text(text.clone())],
            ),
            Selection::Mark(mark) => (Some("mark = ?1"), vec![Value::Text(mark.clone())]),
            Selection::Creator(creator) => {
                (Some("creator = ?1"), vec![Value::Text(creator.clone())])
            }
            Selection::Favorites => (Some("fav > 0"), vec![]),
            Selection::MostViewed => (Some("count > 0"), vec![]),
            Selection::FromId(id) => (Some("id >= ?1"), vec![Value::Integer(*id)]),
        }
    }

    fn fixed_order(&self) -> Option<&'static str> {
        match self {
            Selection::Favorites => Some("fav DESC, id ASC"),
            Selection::MostViewed => Some("count DESC, id ASC"),
            _ => None,
        }
    }
}

/// SQL text plus its bound parameters.
#[derive(Debug, Clone)]
pub struct Query {
    pub target: QueryTarget,
    pub sql: String,
    pub params: Vec<Value>,
}

impl Query {
    pub fn build(target: QueryTarget, selection: &Selection, ordering: Ordering) -> Self {
        let (condition, params) = selection.condition();
        let mut sql = format!("SELECT {} FROM {}", target.columns(), target.relation());
        if let Some(condition) = condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(selection.fixed_order().unwrap_or_else(|| ordering.clause()));

        Self { target, sql, params }
    }
}

/// Per-session listing state, carried by the caller between requests.
///
/// An empty mark or filter counts as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    #[serde(default)]
    pub mark: Option<String>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub ordering: Ordering,
}

impl QueryContext {
    pub fn with_mark(mut self, mark: impl Into<String>) -> Self {
        self.mark = Some(mark.into());
        self.filter = None;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self.mark = None;
        self
    }

    pub fn with_ordering(mut self, ordering: Ordering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Mark wins over filter; neither means every row.
    pub fn selection(&self) -> Selection {
        if let Some(mark) = self.mark.as_deref().filter(|m| !m.is_empty()) {
            Selection::Mark(mark.to_string())
        } else if let Some(filter) = self.filter.as_deref().filter(|f| !f.is_empty()) {
            Selection::Filter(filter.to_string())
        } else {
            Selection::All
        }
    }
}
