use crate::{FailureKind, LoadStatus, PagePurpose, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub message: String,
    pub kind: FailureKind,
    pub purpose: PagePurpose,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveView {
    pub enabled: bool,
    pub auto_merge: bool,
    pub staged_count: usize,
    pub error: Option<String>,
}

/// Everything the table renderer needs; rebuilt whenever the state is dirty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableViewModel {
    pub rows: Vec<Row>,
    pub status: LoadStatus,
    pub is_loading: bool,
    pub has_more: bool,
    pub error: Option<ErrorBanner>,
    pub live: LiveView,
    pub selected: Option<String>,
    pub total_count: Option<u64>,
    /// Normalized query string for the address bar.
    pub query: String,
    pub query_key: String,
    /// Rows inserted above the original head since the last page 1 load.
    /// Renderers add this to their scroll offset to keep the viewport still.
    pub head_shift: usize,
}

impl TableViewModel {
    pub fn row_ids(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.id.as_str()).collect()
    }
}
