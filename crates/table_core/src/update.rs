use table_logging::table_debug;

use crate::{Effect, FilterState, LoadStatus, Msg, PagePurpose, TableState};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: TableState, msg: Msg) -> (TableState, Vec<Effect>) {
    let effects = match msg {
        Msg::Navigated(raw) => {
            let outcome = state.codec().parse(&raw);
            let mut effects = Vec::new();
            if outcome.is_rewritten() {
                effects.push(Effect::ReplaceUrl {
                    query: outcome.normalized_query.clone(),
                });
            }
            effects.extend(apply_filter_state(&mut state, outcome.state));
            effects
        }
        Msg::FilterStateChanged(next) => {
            let next = next.normalize(state.codec().schema());
            if is_current(&state, &next) {
                Vec::new()
            } else {
                let query = state.codec().serialize(&next);
                let mut effects = vec![Effect::ReplaceUrl { query }];
                effects.extend(state.restart(next));
                effects
            }
        }
        Msg::LoadNextRequested => match state.status() {
            LoadStatus::Idle => vec![state.begin_page(PagePurpose::First)],
            LoadStatus::LoadingFirstPage | LoadStatus::LoadingNextPage | LoadStatus::Refreshing => {
                Vec::new()
            }
            LoadStatus::Error => {
                // Resume a failed next page with its cursor; anything else starts over.
                let resumable = state
                    .error()
                    .is_some_and(|error| error.purpose == PagePurpose::Next);
                if resumable {
                    vec![state.begin_page(PagePurpose::Next)]
                } else {
                    vec![state.begin_page(PagePurpose::First)]
                }
            }
            LoadStatus::Ready => {
                if !state.has_fetched_page() {
                    vec![state.begin_page(PagePurpose::First)]
                } else if state.has_more() {
                    vec![state.begin_page(PagePurpose::Next)]
                } else {
                    Vec::new()
                }
            }
        },
        Msg::RefreshRequested => match state.status() {
            LoadStatus::LoadingFirstPage | LoadStatus::Refreshing => {
                table_debug!("Refresh already in flight; coalescing");
                Vec::new()
            }
            LoadStatus::Idle => vec![state.begin_page(PagePurpose::First)],
            LoadStatus::Ready | LoadStatus::LoadingNextPage | LoadStatus::Error => {
                let mut effects: Vec<Effect> = state
                    .cancel_pending_page()
                    .into_iter()
                    .chain(state.cancel_pending_poll())
                    .collect();
                state.bump_generation();
                effects.push(state.begin_page(PagePurpose::Refresh));
                effects
            }
        },
        Msg::RetryRequested => {
            if state.status() == LoadStatus::Error {
                let mut effects: Vec<Effect> = state.cancel_pending_poll().into_iter().collect();
                state.bump_generation();
                effects.push(state.begin_page(PagePurpose::First));
                effects
            } else {
                Vec::new()
            }
        }
        Msg::PageLoaded {
            request_id,
            generation,
            result,
        } => {
            state.apply_page_reply(request_id, generation, result);
            Vec::new()
        }
        Msg::LiveModeToggled(on) => state.set_live_mode(on),
        Msg::AutoMergeToggled(on) => {
            state.set_auto_merge(on);
            Vec::new()
        }
        Msg::PollTick => state.begin_poll().into_iter().collect(),
        Msg::LiveRowsLoaded {
            request_id,
            generation,
            result,
        } => {
            state.apply_live_reply(request_id, generation, result);
            Vec::new()
        }
        Msg::MergeStagedRequested => {
            state.merge_staged();
            Vec::new()
        }
        Msg::RowsPrepended(rows) => {
            state.prepend(rows);
            Vec::new()
        }
        Msg::RowSelected(row_id) => {
            state.select(row_id);
            Vec::new()
        }
    };

    (state, effects)
}

/// An equal state never refetches, so a URL rewrite echoing back is harmless.
fn apply_filter_state(state: &mut TableState, next: FilterState) -> Vec<Effect> {
    if is_current(state, &next) {
        return Vec::new();
    }
    state.restart(next)
}

fn is_current(state: &TableState, next: &FilterState) -> bool {
    state.status() != LoadStatus::Idle && state.filter_state() == next
}
