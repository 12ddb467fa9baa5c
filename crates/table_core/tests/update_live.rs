use std::sync::{Arc, Once};

use pretty_assertions::assert_eq;
use table_core::{
    update, Cursor, Effect, FailureKind, FetchError, FieldSpec, FilterSchema, FilterValue,
    Generation, ListResponse, Msg, PageOrigin, RequestId, Row, TableState,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(table_logging::initialize_for_tests);
}

fn new_state(auto_merge: bool) -> TableState {
    let schema = FilterSchema::builder()
        .field(FieldSpec::enum_set("level", ["error", "warn"]))
        .build()
        .unwrap();
    TableState::new("requests", Arc::new(schema)).with_auto_merge(auto_merge)
}

fn rows(specs: &[(&str, i64)]) -> Vec<Row> {
    specs.iter().map(|(id, ts)| Row::new(*id, *ts)).collect()
}

/// Loads page 1 (`p1` at 100, `p2` at 90) and turns live mode on.
fn live_state(auto_merge: bool) -> TableState {
    let (state, effects) = update(new_state(auto_merge), Msg::Navigated(String::new()));
    let (request_id, generation) = match &effects[..] {
        [Effect::FetchPage {
            request_id,
            generation,
            ..
        }] => (*request_id, *generation),
        other => panic!("unexpected effects {other:?}"),
    };
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request_id,
            generation,
            result: Ok(ListResponse::new(
                rows(&[("p1", 100), ("p2", 90)]),
                Some(Cursor::new("c2")),
            )),
        },
    );
    let (state, effects) = update(state, Msg::LiveModeToggled(true));
    assert_eq!(effects, vec![Effect::StartPolling]);
    state
}

fn tick(state: TableState) -> (TableState, RequestId, Generation, Option<i64>) {
    let (state, effects) = update(state, Msg::PollTick);
    match &effects[..] {
        [Effect::FetchLive {
            request_id,
            generation,
            since,
            ..
        }] => (state, *request_id, *generation, *since),
        other => panic!("expected one live fetch, got {other:?}"),
    }
}

fn deliver(
    state: TableState,
    request_id: RequestId,
    generation: Generation,
    result: Result<ListResponse, FetchError>,
) -> TableState {
    let (state, effects) = update(
        state,
        Msg::LiveRowsLoaded {
            request_id,
            generation,
            result,
        },
    );
    assert!(effects.is_empty());
    state
}

fn found(specs: &[(&str, i64)]) -> Result<ListResponse, FetchError> {
    Ok(ListResponse::new(rows(specs), None))
}

#[test]
fn polling_waits_for_the_first_page() {
    init_logging();
    let (state, _) = update(new_state(false), Msg::LiveModeToggled(true));
    let (state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());

    let (_state, effects) = update(state, Msg::Navigated(String::new()));
    assert!(matches!(effects[..], [Effect::FetchPage { .. }]));
}

#[test]
fn auto_merge_keeps_live_batches_in_arrival_order() {
    init_logging();
    let state = live_state(true);

    let (state, id, generation, since) = tick(state);
    assert_eq!(since, Some(100));
    let state = deliver(state, id, generation, found(&[("n1", 110)]));

    let (state, id, generation, since) = tick(state);
    assert_eq!(since, Some(110));
    let state = deliver(state, id, generation, found(&[("n3", 130), ("n2", 120)]));

    let view = state.view();
    assert_eq!(view.row_ids(), vec!["n1", "n3", "n2", "p1", "p2"]);
    assert_eq!(view.head_shift, 3);
    assert_eq!(view.live.staged_count, 0);
    assert_eq!(state.pages()[0].origin(), PageOrigin::Live);
    assert_eq!(state.pages()[1].origin(), PageOrigin::Live);
    assert_eq!(state.pages()[2].origin(), PageOrigin::Fetched);
    assert_eq!(state.pages().last().unwrap().origin(), PageOrigin::Fetched);
    // The cursor for older rows is untouched.
    assert!(state.has_more());
}

#[test]
fn staged_rows_wait_for_an_explicit_merge() {
    init_logging();
    let state = live_state(false);

    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("n1", 110)]));
    let (state, id, generation, since) = tick(state);
    // Staged rows count as known, so they are not fetched again.
    assert_eq!(since, Some(110));
    let state = deliver(state, id, generation, found(&[("n2", 120), ("n1", 110)]));

    let view = state.view();
    assert_eq!(view.row_ids(), vec!["p1", "p2"]);
    assert_eq!(view.live.staged_count, 2);
    assert_eq!(state.live().staged()[0].id, "n1");

    let (state, _) = update(state, Msg::MergeStagedRequested);
    let view = state.view();
    assert_eq!(view.row_ids(), vec!["n1", "n2", "p1", "p2"]);
    assert_eq!(view.live.staged_count, 0);
}

#[test]
fn enabling_auto_merge_flushes_staged_rows() {
    init_logging();
    let state = live_state(false);
    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("n1", 110)]));

    let (state, effects) = update(state, Msg::AutoMergeToggled(true));
    assert!(effects.is_empty());
    assert_eq!(state.view().row_ids(), vec!["n1", "p1", "p2"]);
}

#[test]
fn staged_rows_are_dropped_when_filters_change() {
    init_logging();
    let state = live_state(false);
    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("n1", 110)]));
    assert_eq!(state.live().staged().len(), 1);

    let next = state
        .filter_state()
        .clone()
        .with_filter("level", FilterValue::many(["error"]));
    let (state, _) = update(state, Msg::FilterStateChanged(next));
    assert!(state.live().staged().is_empty());
    assert!(state.live().is_polling());
}

#[test]
fn staged_rows_are_dropped_when_live_mode_stops() {
    init_logging();
    let state = live_state(false);
    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("n1", 110)]));

    let (state, id, _generation, _) = tick(state);
    let (state, effects) = update(state, Msg::LiveModeToggled(false));
    assert_eq!(
        effects,
        vec![
            Effect::CancelRequest { request_id: id },
            Effect::StopPolling
        ]
    );
    assert!(state.live().staged().is_empty());
    assert_eq!(state.newest_known_timestamp(), Some(100));

    let (_state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
}

#[test]
fn live_reply_from_an_old_generation_is_dropped() {
    init_logging();
    let state = live_state(true);
    let (state, id, generation, _) = tick(state);

    let next = state
        .filter_state()
        .clone()
        .with_filter("level", FilterValue::many(["warn"]));
    let (state, effects) = update(state, Msg::FilterStateChanged(next));
    assert!(effects.contains(&Effect::CancelRequest { request_id: id }));

    let state = deliver(state, id, generation, found(&[("old", 500)]));
    assert!(state.view().rows.is_empty());
    assert!(state.live().staged().is_empty());
}

#[test]
fn one_poll_at_a_time() {
    init_logging();
    let state = live_state(true);
    let (state, _, _, _) = tick(state);
    let (_state, effects) = update(state, Msg::PollTick);
    assert!(effects.is_empty());
}

#[test]
fn failed_poll_keeps_rows_and_polls_again() {
    init_logging();
    let state = live_state(true);
    let (state, id, generation, _) = tick(state);
    let state = deliver(
        state,
        id,
        generation,
        Err(FetchError::new(FailureKind::HttpStatus(502), "bad gateway")),
    );
    let view = state.view();
    assert_eq!(view.row_ids(), vec!["p1", "p2"]);
    assert!(view.live.error.is_some());
    assert!(view.error.is_none());

    let (state, id, generation, since) = tick(state);
    assert_eq!(since, Some(100));
    let state = deliver(state, id, generation, found(&[]));
    assert!(state.view().live.error.is_none());
}

#[test]
fn refresh_absorbs_staged_rows() {
    init_logging();
    let state = live_state(false);
    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("n1", 110)]));

    let (state, effects) = update(state, Msg::RefreshRequested);
    let (request_id, generation) = match &effects[..] {
        [Effect::FetchPage {
            request_id,
            generation,
            ..
        }] => (*request_id, *generation),
        other => panic!("unexpected effects {other:?}"),
    };
    let (state, _) = update(
        state,
        Msg::PageLoaded {
            request_id,
            generation,
            result: Ok(ListResponse::new(
                rows(&[("n1", 110), ("p1", 100), ("p2", 90)]),
                None,
            )),
        },
    );
    assert!(state.live().staged().is_empty());
    assert_eq!(state.view().row_ids(), vec!["n1", "p1", "p2"]);
    assert_eq!(state.view().head_shift, 0);
}

#[test]
fn prepend_skips_known_rows_and_keeps_existing_pages() {
    init_logging();
    let mut state = live_state(false);
    let before = state.pages().to_vec();

    let inserted = state.prepend(rows(&[("p1", 100), ("x", 150), ("x", 150)]));
    assert_eq!(inserted, 1);
    assert_eq!(state.pages().len(), before.len() + 1);
    assert_eq!(&state.pages()[1..], &before[..]);
    assert_eq!(state.view().row_ids(), vec!["x", "p1", "p2"]);

    assert_eq!(state.prepend(rows(&[("x", 150)])), 0);
    assert_eq!(state.pages().len(), before.len() + 1);
}

#[test]
fn selection_survives_live_merges() {
    init_logging();
    let state = live_state(true);
    let (state, _) = update(state, Msg::RowSelected(Some("p2".to_string())));
    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("n1", 110)]));
    assert_eq!(state.view().selected.as_deref(), Some("p2"));
}

#[test]
fn pushed_rows_enter_through_prepend() {
    init_logging();
    let mut state = live_state(false);
    state.consume_dirty();

    let pushed = rows(&[("w1", 120), ("p2", 90)]);
    let (mut state, effects) = update(state, Msg::RowsPrepended(pushed));
    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    assert_eq!(state.view().row_ids(), vec!["w1", "p1", "p2"]);
    assert_eq!(state.newest_known_timestamp(), Some(120));

    let (mut state, _) = update(state, Msg::RowsPrepended(rows(&[("w1", 120)])));
    assert!(!state.consume_dirty());
}

#[test]
fn pushed_rows_land_below_earlier_live_rows() {
    init_logging();
    let state = live_state(true);
    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("a1", 110)]));
    let (state, id, generation, _) = tick(state);
    let state = deliver(state, id, generation, found(&[("b1", 130), ("b2", 120)]));

    let (state, _) = update(state, Msg::RowsPrepended(rows(&[("c1", 140)])));
    assert_eq!(
        state.view().row_ids(),
        vec!["a1", "b1", "b2", "c1", "p1", "p2"]
    );
    assert_eq!(state.view().head_shift, 4);
}
