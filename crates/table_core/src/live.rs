use crate::error::FetchError;
use crate::page::Row;
use crate::state::{Generation, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiveMode {
    #[default]
    Off,
    Polling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingPoll {
    pub(crate) id: RequestId,
    pub(crate) generation: Generation,
}

/// Live overlay: rows discovered by polling that have not been merged yet.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiveState {
    mode: LiveMode,
    auto_merge: bool,
    staged: Vec<Row>,
    pub(crate) pending: Option<PendingPoll>,
    last_error: Option<FetchError>,
}

impl LiveState {
    pub fn mode(&self) -> LiveMode {
        self.mode
    }

    pub fn is_polling(&self) -> bool {
        self.mode == LiveMode::Polling
    }

    pub fn auto_merge(&self) -> bool {
        self.auto_merge
    }

    pub fn staged(&self) -> &[Row] {
        &self.staged
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub(crate) fn set_mode(&mut self, mode: LiveMode) {
        self.mode = mode;
    }

    pub(crate) fn set_auto_merge(&mut self, auto_merge: bool) {
        self.auto_merge = auto_merge;
    }

    pub(crate) fn set_error(&mut self, error: Option<FetchError>) {
        self.last_error = error;
    }

    /// Stages a batch after earlier batches; staged rows keep arrival order.
    pub(crate) fn stage(&mut self, rows: Vec<Row>) {
        self.staged.extend(rows);
    }

    pub(crate) fn take_staged(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.staged)
    }

    pub(crate) fn is_staged(&self, id: &str) -> bool {
        self.staged.iter().any(|row| row.id == id)
    }

    pub(crate) fn newest_staged(&self) -> Option<i64> {
        self.staged.iter().map(|row| row.timestamp).max()
    }
}
