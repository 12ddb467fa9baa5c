use crate::page::Cursor;
use crate::query::QueryOptions;
use crate::state::{Generation, PagePurpose, RequestId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Request one page. The reply must come back as `Msg::PageLoaded` with the same tags.
    FetchPage {
        request_id: RequestId,
        generation: Generation,
        purpose: PagePurpose,
        options: QueryOptions,
        cursor: Option<Cursor>,
    },
    /// Ask for rows newer than `since`. Replies with `Msg::LiveRowsLoaded`.
    FetchLive {
        request_id: RequestId,
        generation: Generation,
        options: QueryOptions,
        since: Option<i64>,
    },
    /// Abort a request whose reply would be dropped anyway.
    CancelRequest { request_id: RequestId },
    /// Rewrite the address bar without navigating.
    ReplaceUrl { query: String },
    StartPolling,
    StopPolling,
}
