use crate::error::FetchError;
use crate::filter::FilterState;
use crate::page::{ListResponse, Row};
use crate::state::{Generation, RequestId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// The router delivered a query string (initial load, back/forward, or a rewrite).
    Navigated(String),
    /// User edited a filter, sort or page size.
    FilterStateChanged(FilterState),
    /// User scrolled to the end of the loaded rows.
    LoadNextRequested,
    /// User clicked Refresh.
    RefreshRequested,
    /// User clicked Retry on the error banner.
    RetryRequested,
    /// Reply to `Effect::FetchPage`.
    PageLoaded {
        request_id: RequestId,
        generation: Generation,
        result: Result<ListResponse, FetchError>,
    },
    /// User toggled live mode.
    LiveModeToggled(bool),
    /// User toggled automatic merging of live rows.
    AutoMergeToggled(bool),
    /// Poll interval elapsed.
    PollTick,
    /// Reply to `Effect::FetchLive`.
    LiveRowsLoaded {
        request_id: RequestId,
        generation: Generation,
        result: Result<ListResponse, FetchError>,
    },
    /// User clicked the "new rows" banner.
    MergeStagedRequested,
    /// Rows pushed from outside the poller (e.g. a websocket feed).
    RowsPrepended(Vec<Row>),
    /// User selected (or cleared) a row.
    RowSelected(Option<String>),
}
