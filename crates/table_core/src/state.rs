use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use table_logging::{table_debug, table_warn};

use crate::codec::SearchParamCodec;
use crate::effect::Effect;
use crate::error::FetchError;
use crate::filter::FilterState;
use crate::live::{LiveMode, LiveState, PendingPoll};
use crate::page::{Cursor, ListResponse, Page, PageOrigin, Row};
use crate::query::{QueryKey, QueryOptions};
use crate::schema::FilterSchema;
use crate::view_model::{ErrorBanner, LiveView, TableViewModel};

/// Pagination epoch. Bumped whenever loaded pages or cursors are invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(pub u64);

impl Generation {
    fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    #[default]
    Idle,
    LoadingFirstPage,
    Ready,
    LoadingNextPage,
    Refreshing,
    Error,
}

impl LoadStatus {
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            LoadStatus::LoadingFirstPage | LoadStatus::LoadingNextPage | LoadStatus::Refreshing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePurpose {
    /// Page 1 after a filter change, the initial load or a retry.
    First,
    Next,
    /// Page 1 replacing what is on screen.
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingPage {
    id: RequestId,
    generation: Generation,
    purpose: PagePurpose,
}

/// Failure of one page request. Loaded pages are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadError {
    pub request_id: RequestId,
    pub purpose: PagePurpose,
    pub error: FetchError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    scope: String,
    codec: SearchParamCodec,
    filter: FilterState,
    options: QueryOptions,
    generation: Generation,
    next_request_id: u64,
    status: LoadStatus,
    pages: Vec<Page>,
    cursor: Option<Cursor>,
    has_more: bool,
    pending: Option<PendingPage>,
    error: Option<LoadError>,
    total_count: Option<u64>,
    live: LiveState,
    selected: Option<String>,
    head_shift: usize,
    dirty: bool,
}

impl Default for TableState {
    fn default() -> Self {
        Self::new("rows", Arc::new(FilterSchema::default()))
    }
}

impl TableState {
    pub fn new(scope: impl Into<String>, schema: Arc<FilterSchema>) -> Self {
        let scope = scope.into();
        let codec = SearchParamCodec::new(schema);
        let filter = FilterState::defaults(codec.schema());
        let options = QueryOptions::new(&scope, &codec, &filter);
        Self {
            scope,
            codec,
            filter,
            options,
            generation: Generation::default(),
            next_request_id: 1,
            status: LoadStatus::Idle,
            pages: Vec::new(),
            cursor: None,
            has_more: true,
            pending: None,
            error: None,
            total_count: None,
            live: LiveState::default(),
            selected: None,
            head_shift: 0,
            dirty: false,
        }
    }

    pub fn with_auto_merge(mut self, auto_merge: bool) -> Self {
        self.live.set_auto_merge(auto_merge);
        self
    }

    pub fn codec(&self) -> &SearchParamCodec {
        &self.codec
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }

    pub fn query_key(&self) -> &QueryKey {
        self.options.key()
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.pages.iter().flat_map(|page| page.rows().iter())
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn error(&self) -> Option<&LoadError> {
        self.error.as_ref()
    }

    pub fn live(&self) -> &LiveState {
        &self.live
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The page request currently awaited, if any.
    pub fn pending_request(&self) -> Option<(RequestId, Generation, PagePurpose)> {
        self.pending
            .map(|pending| (pending.id, pending.generation, pending.purpose))
    }

    /// The live poll currently awaited, if any.
    pub fn pending_poll(&self) -> Option<(RequestId, Generation)> {
        self.live
            .pending
            .map(|pending| (pending.id, pending.generation))
    }

    pub fn view(&self) -> TableViewModel {
        TableViewModel {
            rows: self.rows().cloned().collect(),
            status: self.status,
            is_loading: self.status.is_loading(),
            has_more: self.has_more,
            error: self.error.as_ref().map(|error| ErrorBanner {
                message: error.error.to_string(),
                kind: error.error.kind.clone(),
                purpose: error.purpose,
                retryable: error.error.kind.is_retryable(),
            }),
            live: LiveView {
                enabled: self.live.is_polling(),
                auto_merge: self.live.auto_merge(),
                staged_count: self.live.staged().len(),
                error: self.live.last_error().map(ToString::to_string),
            },
            selected: self.selected.clone(),
            total_count: self.total_count,
            query: self.options.key().canonical().to_string(),
            query_key: self.options.key().to_string(),
            head_shift: self.head_shift,
        }
    }

    /// Returns whether the view changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn contains_row(&self, id: &str) -> bool {
        self.rows().any(|row| row.id == id)
    }

    /// Newest timestamp among loaded and staged rows; the live `since` boundary.
    pub fn newest_known_timestamp(&self) -> Option<i64> {
        let loaded = self.pages.iter().filter_map(Page::newest_timestamp).max();
        loaded.max(self.live.newest_staged())
    }

    /// Inserts `rows` as a new `Live` page above the fetched pages, skipping
    /// ids already loaded. Earlier live pages stay above it, so the head reads
    /// in arrival order. Returns how many rows were inserted.
    pub fn prepend(&mut self, rows: Vec<Row>) -> usize {
        let mut seen = HashSet::new();
        let fresh: Vec<Row> = rows
            .into_iter()
            .filter(|row| !self.contains_row(&row.id) && seen.insert(row.id.clone()))
            .collect();
        if fresh.is_empty() {
            return 0;
        }
        let inserted = fresh.len();
        let at = self
            .pages
            .iter()
            .position(|page| page.origin() == PageOrigin::Fetched)
            .unwrap_or(self.pages.len());
        self.pages.insert(at, Page::live(fresh));
        self.head_shift += inserted;
        self.mark_dirty();
        inserted
    }

    fn allocate_request_id(&mut self) -> RequestId {
        let id = RequestId(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    pub(crate) fn begin_page(&mut self, purpose: PagePurpose) -> Effect {
        let request_id = self.allocate_request_id();
        let cursor = match purpose {
            PagePurpose::Next => self.cursor.clone(),
            PagePurpose::First | PagePurpose::Refresh => None,
        };
        self.status = match purpose {
            PagePurpose::First => LoadStatus::LoadingFirstPage,
            PagePurpose::Next => LoadStatus::LoadingNextPage,
            PagePurpose::Refresh => LoadStatus::Refreshing,
        };
        self.pending = Some(PendingPage {
            id: request_id,
            generation: self.generation,
            purpose,
        });
        self.mark_dirty();
        table_debug!(
            scope: self.scope;
            "Requesting {:?} page {} under {} (cursor {:?})",
            purpose,
            request_id,
            self.generation,
            cursor
        );
        Effect::FetchPage {
            request_id,
            generation: self.generation,
            purpose,
            options: self.options.clone(),
            cursor,
        }
    }

    /// Starts a new pagination epoch; replies tagged with the old one are stale.
    pub(crate) fn bump_generation(&mut self) {
        self.generation = self.generation.next();
        self.cursor = None;
    }

    pub(crate) fn cancel_pending_page(&mut self) -> Option<Effect> {
        self.pending
            .take()
            .map(|pending| Effect::CancelRequest {
                request_id: pending.id,
            })
    }

    pub(crate) fn cancel_pending_poll(&mut self) -> Option<Effect> {
        self.live
            .pending
            .take()
            .map(|pending| Effect::CancelRequest {
                request_id: pending.id,
            })
    }

    /// Swaps in a new filter state and restarts from page 1.
    pub(crate) fn restart(&mut self, next: FilterState) -> Vec<Effect> {
        let mut effects: Vec<Effect> = self
            .cancel_pending_page()
            .into_iter()
            .chain(self.cancel_pending_poll())
            .collect();

        self.options = QueryOptions::new(&self.scope, &self.codec, &next);
        self.filter = next;
        self.bump_generation();
        self.pages.clear();
        self.has_more = true;
        self.error = None;
        self.total_count = None;
        self.selected = None;
        self.head_shift = 0;
        self.live.take_staged();
        self.live.set_error(None);

        effects.push(self.begin_page(PagePurpose::First));
        effects
    }

    pub(crate) fn apply_page_reply(
        &mut self,
        request_id: RequestId,
        generation: Generation,
        result: Result<ListResponse, FetchError>,
    ) {
        let pending = match self.pending {
            Some(pending)
                if pending.id == request_id
                    && pending.generation == generation
                    && generation == self.generation =>
            {
                pending
            }
            _ => {
                table_debug!(
                    scope: self.scope;
                    "Dropping stale page reply {} from {} (current {})",
                    request_id,
                    generation,
                    self.generation
                );
                return;
            }
        };
        self.pending = None;

        match result {
            Ok(response) => {
                if response.total_count.is_some() {
                    self.total_count = response.total_count;
                }
                let page = Page::fetched(response.rows, response.next_cursor);
                self.cursor = page.next_cursor().cloned();
                self.has_more = !page.is_last();
                match pending.purpose {
                    PagePurpose::First | PagePurpose::Refresh => {
                        self.pages = vec![page];
                        self.head_shift = 0;
                        // Page 1 already contains anything live mode had staged.
                        self.live.take_staged();
                        if let Some(selected) = self.selected.take() {
                            if self.contains_row(&selected) {
                                self.selected = Some(selected);
                            }
                        }
                    }
                    PagePurpose::Next => self.pages.push(page),
                }
                self.status = LoadStatus::Ready;
                self.error = None;
            }
            Err(error) => {
                table_warn!(
                    scope: self.scope;
                    "{:?} page request {} failed: {}",
                    pending.purpose,
                    request_id,
                    error
                );
                self.status = LoadStatus::Error;
                self.error = Some(LoadError {
                    request_id,
                    purpose: pending.purpose,
                    error,
                });
            }
        }
        self.mark_dirty();
    }

    pub(crate) fn set_live_mode(&mut self, on: bool) -> Vec<Effect> {
        if on == self.live.is_polling() {
            return Vec::new();
        }
        self.mark_dirty();
        if on {
            self.live.set_mode(LiveMode::Polling);
            vec![Effect::StartPolling]
        } else {
            self.live.set_mode(LiveMode::Off);
            self.live.take_staged();
            self.live.set_error(None);
            let mut effects: Vec<Effect> = self.cancel_pending_poll().into_iter().collect();
            effects.push(Effect::StopPolling);
            effects
        }
    }

    pub(crate) fn set_auto_merge(&mut self, on: bool) {
        self.live.set_auto_merge(on);
        if on {
            self.merge_staged();
        }
        self.mark_dirty();
    }

    pub(crate) fn merge_staged(&mut self) {
        let staged = self.live.take_staged();
        if !staged.is_empty() {
            self.prepend(staged);
        }
    }

    pub(crate) fn begin_poll(&mut self) -> Option<Effect> {
        if !self.live.is_polling() || self.live.pending.is_some() {
            return None;
        }
        if !matches!(
            self.status,
            LoadStatus::Ready | LoadStatus::LoadingNextPage | LoadStatus::Error
        ) {
            return None;
        }
        let request_id = self.allocate_request_id();
        let since = self.newest_known_timestamp();
        self.live.pending = Some(PendingPoll {
            id: request_id,
            generation: self.generation,
        });
        Some(Effect::FetchLive {
            request_id,
            generation: self.generation,
            options: self.options.clone(),
            since,
        })
    }

    pub(crate) fn apply_live_reply(
        &mut self,
        request_id: RequestId,
        generation: Generation,
        result: Result<ListResponse, FetchError>,
    ) {
        match self.live.pending {
            Some(pending)
                if pending.id == request_id
                    && pending.generation == generation
                    && generation == self.generation => {}
            _ => {
                table_debug!(
                    scope: self.scope;
                    "Dropping stale live reply {} from {} (current {})",
                    request_id,
                    generation,
                    self.generation
                );
                return;
            }
        }
        self.live.pending = None;

        match result {
            Ok(response) => {
                let had_error = self.live.last_error().is_some();
                self.live.set_error(None);
                let mut seen = HashSet::new();
                let fresh: Vec<Row> = response
                    .rows
                    .into_iter()
                    .filter(|row| {
                        !self.contains_row(&row.id)
                            && !self.live.is_staged(&row.id)
                            && seen.insert(row.id.clone())
                    })
                    .collect();
                if fresh.is_empty() {
                    if had_error {
                        self.mark_dirty();
                    }
                    return;
                }
                table_debug!(scope: self.scope; "Live poll {} found {} new rows", request_id, fresh.len());
                if self.live.auto_merge() {
                    self.prepend(fresh);
                } else {
                    self.live.stage(fresh);
                    self.mark_dirty();
                }
            }
            Err(error) => {
                table_warn!(scope: self.scope; "Live poll {} failed: {}", request_id, error);
                self.live.set_error(Some(error));
                self.mark_dirty();
            }
        }
    }

    pub(crate) fn select(&mut self, row_id: Option<String>) {
        if self.selected != row_id {
            self.selected = row_id;
            self.mark_dirty();
        }
    }

    pub(crate) fn has_fetched_page(&self) -> bool {
        self.pages
            .iter()
            .any(|page| page.origin() == PageOrigin::Fetched)
    }
}
