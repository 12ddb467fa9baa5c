use std::sync::{Arc, Once};

use pretty_assertions::assert_eq;
use table_core::{
    update, Cursor, Effect, FailureKind, FetchError, FieldSpec, FilterSchema, FilterState,
    FilterValue, Generation, ListResponse, LoadStatus, Msg, PagePurpose, RequestId, Row,
    TableState,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(table_logging::initialize_for_tests);
}

fn new_state() -> TableState {
    let schema = FilterSchema::builder()
        .field(FieldSpec::enum_set("level", ["error", "warn", "info"]))
        .field(FieldSpec::text("host"))
        .build()
        .unwrap();
    TableState::new("requests", Arc::new(schema))
}

struct Fetch {
    request_id: RequestId,
    generation: Generation,
    purpose: PagePurpose,
    cursor: Option<Cursor>,
}

fn single_fetch(effects: &[Effect]) -> Fetch {
    let fetches: Vec<Fetch> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::FetchPage {
                request_id,
                generation,
                purpose,
                cursor,
                ..
            } => Some(Fetch {
                request_id: *request_id,
                generation: *generation,
                purpose: *purpose,
                cursor: cursor.clone(),
            }),
            _ => None,
        })
        .collect();
    assert_eq!(fetches.len(), 1, "expected exactly one fetch in {effects:?}");
    fetches.into_iter().next().unwrap()
}

fn page(prefix: &str, count: usize, next: Option<&str>) -> ListResponse {
    let rows = (0..count)
        .map(|i| Row::new(format!("{prefix}{i}"), 1_000 - i as i64))
        .collect();
    ListResponse::new(rows, next.map(Cursor::new))
}

fn reply(state: TableState, fetch: &Fetch, result: Result<ListResponse, FetchError>) -> TableState {
    let (state, effects) = update(
        state,
        Msg::PageLoaded {
            request_id: fetch.request_id,
            generation: fetch.generation,
            result,
        },
    );
    assert!(effects.is_empty());
    state
}

fn loaded_state() -> (TableState, Fetch) {
    let (state, effects) = update(new_state(), Msg::Navigated(String::new()));
    let first = single_fetch(&effects);
    let state = reply(state, &first, Ok(page("a", 3, Some("c2"))));
    (state, first)
}

#[test]
fn navigation_from_idle_loads_the_first_page() {
    init_logging();
    let state = new_state();
    assert_eq!(state.status(), LoadStatus::Idle);

    let (mut state, effects) = update(state, Msg::Navigated(String::new()));
    let fetch = single_fetch(&effects);
    assert_eq!(fetch.purpose, PagePurpose::First);
    assert_eq!(fetch.cursor, None);
    assert_eq!(state.status(), LoadStatus::LoadingFirstPage);
    assert!(state.view().is_loading);
    assert!(state.consume_dirty());

    let mut state = reply(state, &fetch, Ok(page("a", 3, Some("c2"))));
    let view = state.view();
    assert_eq!(view.status, LoadStatus::Ready);
    assert_eq!(view.row_ids(), vec!["a0", "a1", "a2"]);
    assert!(view.has_more);
    assert!(view.error.is_none());
    assert!(state.consume_dirty());
}

#[test]
fn load_next_stops_at_end_of_data() {
    init_logging();
    let (state, _) = loaded_state();

    let (state, effects) = update(state, Msg::LoadNextRequested);
    let second = single_fetch(&effects);
    assert_eq!(second.purpose, PagePurpose::Next);
    assert_eq!(second.cursor, Some(Cursor::new("c2")));
    let state = reply(state, &second, Ok(page("b", 3, Some("c3"))));
    assert!(state.has_more());

    let (state, effects) = update(state, Msg::LoadNextRequested);
    let third = single_fetch(&effects);
    assert_eq!(third.cursor, Some(Cursor::new("c3")));
    let mut state = reply(state, &third, Ok(page("c", 2, None)));

    let view = state.view();
    assert!(!view.has_more);
    assert_eq!(view.rows.len(), 8);
    assert!(state.consume_dirty());

    let (mut state, effects) = update(state, Msg::LoadNextRequested);
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
    assert_eq!(state.view().rows.len(), 8);
}

#[test]
fn load_next_is_ignored_while_a_page_is_in_flight() {
    init_logging();
    let (state, _) = loaded_state();
    let (state, effects) = update(state, Msg::LoadNextRequested);
    assert_eq!(single_fetch(&effects).purpose, PagePurpose::Next);
    assert_eq!(state.status(), LoadStatus::LoadingNextPage);

    let (_state, effects) = update(state, Msg::LoadNextRequested);
    assert!(effects.is_empty());
}

#[test]
fn failed_next_page_keeps_loaded_rows() {
    init_logging();
    let (state, _) = loaded_state();
    let (state, effects) = update(state, Msg::LoadNextRequested);
    let second = single_fetch(&effects);

    let state = reply(
        state,
        &second,
        Err(FetchError::new(FailureKind::HttpStatus(503), "unavailable")),
    );
    let view = state.view();
    assert_eq!(view.status, LoadStatus::Error);
    assert_eq!(view.row_ids(), vec!["a0", "a1", "a2"]);
    let banner = view.error.expect("error banner");
    assert_eq!(banner.kind, FailureKind::HttpStatus(503));
    assert_eq!(banner.purpose, PagePurpose::Next);
    assert!(banner.retryable);
    assert_eq!(
        state.error().map(|error| error.request_id),
        Some(second.request_id)
    );

    // Scrolling again resumes with the same cursor.
    let (state, effects) = update(state, Msg::LoadNextRequested);
    let again = single_fetch(&effects);
    assert_eq!(again.purpose, PagePurpose::Next);
    assert_eq!(again.cursor, Some(Cursor::new("c2")));
    let state = reply(state, &again, Ok(page("b", 1, None)));
    assert_eq!(state.view().row_ids(), vec!["a0", "a1", "a2", "b0"]);
    assert!(state.view().error.is_none());
}

#[test]
fn retry_restarts_from_page_one_without_blanking() {
    init_logging();
    let (state, first) = loaded_state();
    let (state, effects) = update(state, Msg::LoadNextRequested);
    let second = single_fetch(&effects);
    let state = reply(
        state,
        &second,
        Err(FetchError::new(FailureKind::Timeout, "no response")),
    );

    let (state, effects) = update(state, Msg::RetryRequested);
    let retry = single_fetch(&effects);
    assert_eq!(retry.purpose, PagePurpose::First);
    assert_eq!(retry.cursor, None);
    assert!(retry.generation > first.generation);
    assert_eq!(state.status(), LoadStatus::LoadingFirstPage);
    assert_eq!(state.view().rows.len(), 3);

    let state = reply(state, &retry, Ok(page("r", 2, Some("c2"))));
    assert_eq!(state.view().row_ids(), vec!["r0", "r1"]);
    assert_eq!(state.status(), LoadStatus::Ready);

    let (_state, effects) = update(state, Msg::RetryRequested);
    assert!(effects.is_empty());
}

#[test]
fn refresh_coalesces_concurrent_requests() {
    init_logging();
    let (state, _) = loaded_state();
    let (state, effects) = update(state, Msg::LoadNextRequested);
    let second = single_fetch(&effects);
    let state = reply(state, &second, Ok(page("b", 3, Some("c3"))));
    assert_eq!(state.pages().len(), 2);

    let (state, effects) = update(state, Msg::RefreshRequested);
    let refresh = single_fetch(&effects);
    assert_eq!(refresh.purpose, PagePurpose::Refresh);
    assert_eq!(refresh.cursor, None);
    assert_eq!(state.status(), LoadStatus::Refreshing);
    // Rendered rows stay until the replacement arrives.
    assert_eq!(state.view().rows.len(), 6);

    let (state, effects) = update(state, Msg::RefreshRequested);
    assert!(effects.is_empty());
    assert_eq!(state.pending_request().map(|p| p.0), Some(refresh.request_id));

    let state = reply(state, &refresh, Ok(page("n", 2, Some("n2"))));
    assert_eq!(state.pages().len(), 1);
    assert_eq!(state.view().row_ids(), vec!["n0", "n1"]);
    assert_eq!(state.status(), LoadStatus::Ready);
}

#[test]
fn refresh_cancels_an_in_flight_next_page() {
    init_logging();
    let (state, _) = loaded_state();
    let (state, effects) = update(state, Msg::LoadNextRequested);
    let next = single_fetch(&effects);

    let (state, effects) = update(state, Msg::RefreshRequested);
    assert_eq!(
        effects[0],
        Effect::CancelRequest {
            request_id: next.request_id
        }
    );
    let refresh = single_fetch(&effects);

    // The next page answers anyway; it must not land.
    let state = reply(state, &next, Ok(page("late", 3, Some("x"))));
    assert_eq!(state.status(), LoadStatus::Refreshing);
    assert_eq!(state.view().row_ids(), vec!["a0", "a1", "a2"]);

    let state = reply(state, &refresh, Ok(page("n", 1, None)));
    assert_eq!(state.view().row_ids(), vec!["n0"]);
    assert!(!state.has_more());
}

#[test]
fn stale_response_is_dropped_after_filter_change() {
    init_logging();
    let (state, effects) = update(new_state(), Msg::Navigated("level=error".to_string()));
    let fetch_a = single_fetch(&effects);

    let filter_b = state
        .filter_state()
        .clone()
        .with_filter("level", FilterValue::many(["warn"]));
    let (state, effects) = update(state, Msg::FilterStateChanged(filter_b.clone()));
    assert_eq!(
        effects[0],
        Effect::ReplaceUrl {
            query: "level=warn".to_string()
        }
    );
    assert!(effects.contains(&Effect::CancelRequest {
        request_id: fetch_a.request_id
    }));
    let fetch_b = single_fetch(&effects);
    assert!(fetch_b.generation > fetch_a.generation);

    let state = reply(state, &fetch_a, Ok(page("a", 3, Some("a-next"))));
    assert!(state.view().rows.is_empty());
    assert_eq!(state.status(), LoadStatus::LoadingFirstPage);

    let state = reply(state, &fetch_b, Ok(page("b", 2, None)));
    let view = state.view();
    assert_eq!(view.row_ids(), vec!["b0", "b1"]);
    assert_eq!(state.filter_state(), &filter_b);
    assert_eq!(view.query, "level=warn");
}

#[test]
fn filter_change_clears_pages_and_cursor() {
    init_logging();
    let (state, _) = loaded_state();
    let (state, _) = update(state, Msg::RowSelected(Some("a1".to_string())));

    let next = FilterState::default().with_filter("host", FilterValue::single("api"));
    let (state, effects) = update(state, Msg::FilterStateChanged(next));
    let fetch = single_fetch(&effects);
    assert_eq!(fetch.cursor, None);
    let view = state.view();
    assert!(view.rows.is_empty());
    assert!(view.selected.is_none());
    assert!(view.has_more);
}

#[test]
fn url_rewrite_does_not_refetch() {
    init_logging();
    let (state, effects) = update(
        new_state(),
        Msg::Navigated("?bogus=1&level=ERROR&size=50".to_string()),
    );
    assert_eq!(
        effects[0],
        Effect::ReplaceUrl {
            query: "level=error".to_string()
        }
    );
    let fetch = single_fetch(&effects);

    // The router echoes the rewrite back.
    let (state, effects) = update(state, Msg::Navigated("level=error".to_string()));
    assert!(effects.is_empty());
    assert_eq!(state.pending_request().map(|p| p.0), Some(fetch.request_id));
}

#[test]
fn equal_filter_state_is_a_no_op() {
    init_logging();
    let (mut state, _) = loaded_state();
    state.consume_dirty();
    let same = state.filter_state().clone();
    let (mut state, effects) = update(state, Msg::FilterStateChanged(same));
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
}

#[test]
fn selection_survives_refresh_only_if_the_row_remains() {
    init_logging();
    let (state, _) = loaded_state();
    let (state, _) = update(state, Msg::RowSelected(Some("a1".to_string())));

    let (state, effects) = update(state, Msg::RefreshRequested);
    let refresh = single_fetch(&effects);
    let state = reply(state, &refresh, Ok(page("a", 2, None)));
    assert_eq!(state.selected(), Some("a1"));

    let (state, _) = update(state, Msg::RowSelected(Some("a0".to_string())));
    let (state, effects) = update(state, Msg::RefreshRequested);
    let refresh = single_fetch(&effects);
    let state = reply(state, &refresh, Ok(page("z", 2, None)));
    assert_eq!(state.selected(), None);
}

#[test]
fn total_count_is_reported() {
    init_logging();
    let (state, effects) = update(new_state(), Msg::LoadNextRequested);
    let fetch = single_fetch(&effects);
    let mut response = page("a", 2, Some("c2"));
    response.total_count = Some(42);
    let state = reply(state, &fetch, Ok(response));
    assert_eq!(state.view().total_count, Some(42));
}

#[test]
fn failed_first_page_can_be_refreshed() {
    init_logging();
    let (state, effects) = update(new_state(), Msg::Navigated(String::new()));
    let fetch = single_fetch(&effects);
    let state = reply(
        state,
        &fetch,
        Err(FetchError::new(FailureKind::Network, "connection refused")),
    );
    assert_eq!(state.status(), LoadStatus::Error);
    assert!(state.view().rows.is_empty());

    let (state, effects) = update(state, Msg::LoadNextRequested);
    let again = single_fetch(&effects);
    assert_eq!(again.purpose, PagePurpose::First);
    let state = reply(state, &again, Ok(page("a", 1, None)));
    assert_eq!(state.view().row_ids(), vec!["a0"]);
}
