use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque pagination token, valid only for the generation that received it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One table record. `timestamp` is epoch milliseconds and drives the live
/// boundary; all other columns travel in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    pub timestamp: i64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Row {
    pub fn new(id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            timestamp,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Body returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub rows: Vec<Row>,
    #[serde(default)]
    pub next_cursor: Option<Cursor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
}

impl ListResponse {
    pub fn new(rows: Vec<Row>, next_cursor: Option<Cursor>) -> Self {
        Self {
            rows,
            next_cursor,
            total_count: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    /// Returned by a cursor request.
    Fetched,
    /// Rows merged at the head by live mode.
    Live,
}

/// Immutable slice of the table. The loader replaces or inserts pages but
/// never edits one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    rows: Vec<Row>,
    next_cursor: Option<Cursor>,
    origin: PageOrigin,
}

impl Page {
    pub fn fetched(rows: Vec<Row>, next_cursor: Option<Cursor>) -> Self {
        Self {
            rows,
            next_cursor,
            origin: PageOrigin::Fetched,
        }
    }

    pub fn live(rows: Vec<Row>) -> Self {
        Self {
            rows,
            next_cursor: None,
            origin: PageOrigin::Live,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.next_cursor.as_ref()
    }

    pub fn origin(&self) -> PageOrigin {
        self.origin
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn newest_timestamp(&self) -> Option<i64> {
        self.rows.iter().map(|row| row.timestamp).max()
    }
}
