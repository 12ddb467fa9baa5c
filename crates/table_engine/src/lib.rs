//! Table engine: async effect execution for the table core.
mod fetcher;
mod loader;
mod poller;
mod source;

pub use fetcher::{build_fetcher, PageFetcher};
pub use loader::{LoaderContext, LoaderHandle, LoaderSettings, NoopUrlSink, UrlSink};
pub use poller::LivePoller;
pub use source::{HttpPageSource, PageSource, SourceSettings};
pub use table_core::{FailureKind, FetchError};
