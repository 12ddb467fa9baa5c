use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use table_core::{
    update, Effect, FilterSchema, FilterState, Msg, RequestId, Row, TableState, TableViewModel,
};
use table_logging::{table_debug, table_info};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::fetcher::build_fetcher;
use crate::poller::LivePoller;
use crate::source::PageSource;

#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Upper bound on a single page or live request.
    pub page_timeout: Duration,
    pub poll_interval: Duration,
    /// Prepend live rows as they arrive instead of staging them.
    pub auto_merge: bool,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(5),
            auto_merge: false,
        }
    }
}

/// Routing layer hook for rewriting the address bar.
pub trait UrlSink: Send + Sync {
    fn replace(&self, query: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUrlSink;

impl UrlSink for NoopUrlSink {
    fn replace(&self, query: &str) {
        table_debug!("Ignoring URL rewrite to {:?}", query);
    }
}

/// Everything a loader needs from its surroundings.
#[derive(Clone)]
pub struct LoaderContext {
    pub scope: String,
    pub schema: Arc<FilterSchema>,
    pub source: Arc<dyn PageSource>,
    pub url_sink: Arc<dyn UrlSink>,
    pub settings: LoaderSettings,
}

impl LoaderContext {
    pub fn new(
        scope: impl Into<String>,
        schema: Arc<FilterSchema>,
        source: Arc<dyn PageSource>,
    ) -> Self {
        Self {
            scope: scope.into(),
            schema,
            source,
            url_sink: Arc::new(NoopUrlSink),
            settings: LoaderSettings::default(),
        }
    }

    pub fn with_url_sink(mut self, url_sink: Arc<dyn UrlSink>) -> Self {
        self.url_sink = url_sink;
        self
    }

    pub fn with_settings(mut self, settings: LoaderSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Handle to a running loader. Intents are queued to the owner task; views
/// come back through a watch channel. Dropping the handle stops the loader.
pub struct LoaderHandle {
    msg_tx: mpsc::UnboundedSender<Msg>,
    view_rx: watch::Receiver<TableViewModel>,
    shutdown: CancellationToken,
}

impl LoaderHandle {
    /// Spawns the owner task on the current tokio runtime.
    pub fn spawn(context: LoaderContext) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let state = TableState::new(context.scope.clone(), context.schema.clone())
            .with_auto_merge(context.settings.auto_merge);
        let (view_tx, view_rx) = watch::channel(state.view());
        let shutdown = CancellationToken::new();

        let task = LoaderTask {
            state,
            context,
            msg_tx: msg_tx.clone(),
            view_tx,
            in_flight: HashMap::new(),
            poller: None,
            shutdown: shutdown.clone(),
        };
        tokio::spawn(task.run(msg_rx));

        Self {
            msg_tx,
            view_rx,
            shutdown,
        }
    }

    pub fn navigate(&self, query: impl Into<String>) {
        self.send(Msg::Navigated(query.into()));
    }

    pub fn set_filter_state(&self, next: FilterState) {
        self.send(Msg::FilterStateChanged(next));
    }

    pub fn load_next(&self) {
        self.send(Msg::LoadNextRequested);
    }

    pub fn refresh(&self) {
        self.send(Msg::RefreshRequested);
    }

    pub fn retry(&self) {
        self.send(Msg::RetryRequested);
    }

    pub fn set_live_mode(&self, on: bool) {
        self.send(Msg::LiveModeToggled(on));
    }

    pub fn set_auto_merge(&self, on: bool) {
        self.send(Msg::AutoMergeToggled(on));
    }

    pub fn merge_staged(&self) {
        self.send(Msg::MergeStagedRequested);
    }

    /// Inserts rows below earlier live rows and above the fetched pages,
    /// skipping ids already present.
    pub fn prepend(&self, rows: Vec<Row>) {
        self.send(Msg::RowsPrepended(rows));
    }

    pub fn select(&self, row_id: Option<String>) {
        self.send(Msg::RowSelected(row_id));
    }

    /// Latest published view.
    pub fn view(&self) -> TableViewModel {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TableViewModel> {
        self.view_rx.clone()
    }

    /// Waits until a published view satisfies `predicate`. Returns `None` if
    /// the loader stopped first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&TableViewModel) -> bool,
    ) -> Option<TableViewModel> {
        let mut rx = self.view_rx.clone();
        let view = rx.wait_for(predicate).await.ok()?;
        Some(view.clone())
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, msg: Msg) {
        let _ = self.msg_tx.send(msg);
    }
}

impl Drop for LoaderHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct LoaderTask {
    state: TableState,
    context: LoaderContext,
    msg_tx: mpsc::UnboundedSender<Msg>,
    view_tx: watch::Sender<TableViewModel>,
    in_flight: HashMap<RequestId, CancellationToken>,
    poller: Option<LivePoller>,
    shutdown: CancellationToken,
}

impl LoaderTask {
    async fn run(mut self, mut msg_rx: mpsc::UnboundedReceiver<Msg>) {
        table_info!(scope: self.context.scope; "Loader started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                msg = msg_rx.recv() => match msg {
                    Some(msg) => self.dispatch(msg),
                    None => break,
                },
            }
        }
        for (_, token) in self.in_flight.drain() {
            token.cancel();
        }
        self.poller = None;
        table_info!(scope: self.context.scope; "Loader stopped");
    }

    fn dispatch(&mut self, msg: Msg) {
        if let Msg::PageLoaded { request_id, .. } | Msg::LiveRowsLoaded { request_id, .. } = &msg {
            self.in_flight.remove(request_id);
        }

        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        let was_dirty = state.consume_dirty();
        self.state = state;

        for effect in effects {
            self.run_effect(effect);
        }
        if was_dirty {
            self.view_tx.send_replace(self.state.view());
        }
    }

    fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::FetchPage {
                request_id,
                generation,
                purpose,
                options,
                cursor,
            } => {
                let fetcher = build_fetcher(
                    options,
                    self.context.source.clone(),
                    self.context.settings.page_timeout,
                );
                let token = self.track(request_id);
                let msg_tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            table_debug!("{:?} page request {} aborted", purpose, request_id);
                        }
                        result = fetcher.fetch_page(cursor) => {
                            let _ = msg_tx.send(Msg::PageLoaded { request_id, generation, result });
                        }
                    }
                });
            }
            Effect::FetchLive {
                request_id,
                generation,
                options,
                since,
            } => {
                let fetcher = build_fetcher(
                    options,
                    self.context.source.clone(),
                    self.context.settings.page_timeout,
                );
                let token = self.track(request_id);
                let msg_tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {
                            table_debug!("Live request {} aborted", request_id);
                        }
                        result = fetcher.fetch_since(since) => {
                            let _ = msg_tx.send(Msg::LiveRowsLoaded { request_id, generation, result });
                        }
                    }
                });
            }
            Effect::CancelRequest { request_id } => {
                if let Some(token) = self.in_flight.remove(&request_id) {
                    token.cancel();
                }
            }
            Effect::ReplaceUrl { query } => self.context.url_sink.replace(&query),
            Effect::StartPolling => {
                if self.poller.is_none() {
                    self.poller = Some(LivePoller::start(
                        self.context.settings.poll_interval,
                        self.msg_tx.clone(),
                        self.shutdown.child_token(),
                    ));
                }
            }
            Effect::StopPolling => {
                if let Some(poller) = self.poller.take() {
                    poller.stop();
                }
            }
        }
    }

    fn track(&mut self, request_id: RequestId) -> CancellationToken {
        let token = self.shutdown.child_token();
        self.in_flight.insert(request_id, token.clone());
        token
    }
}
