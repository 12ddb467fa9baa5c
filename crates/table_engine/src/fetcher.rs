use std::sync::Arc;
use std::time::Duration;

use table_core::{Cursor, FailureKind, FetchError, ListRequest, ListResponse, QueryOptions};

use crate::source::PageSource;

/// A filter state bound to a source. Holds no mutable state, so clones can
/// fetch concurrently (prefetching the next page, polling while paging).
#[derive(Clone)]
pub struct PageFetcher {
    options: QueryOptions,
    source: Arc<dyn PageSource>,
    timeout: Duration,
}

pub fn build_fetcher(
    options: QueryOptions,
    source: Arc<dyn PageSource>,
    timeout: Duration,
) -> PageFetcher {
    PageFetcher {
        options,
        source,
        timeout,
    }
}

impl PageFetcher {
    pub async fn fetch_page(&self, cursor: Option<Cursor>) -> Result<ListResponse, FetchError> {
        self.run(self.options.page_request(cursor)).await
    }

    pub async fn fetch_since(&self, since: Option<i64>) -> Result<ListResponse, FetchError> {
        self.run(self.options.live_request(since)).await
    }

    async fn run(&self, request: ListRequest) -> Result<ListResponse, FetchError> {
        match tokio::time::timeout(self.timeout, self.source.list(&request)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::new(
                FailureKind::Timeout,
                format!("no response within {:?}", self.timeout),
            )),
        }
    }
}
