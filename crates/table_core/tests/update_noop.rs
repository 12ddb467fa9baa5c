use table_core::{update, Msg, TableState};

#[test]
fn retry_outside_error_is_ignored() {
    let state = TableState::default();
    let (next, effects) = update(state.clone(), Msg::RetryRequested);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn load_reply_without_request_is_ignored() {
    let state = TableState::default();
    let (next, effects) = update(
        state.clone(),
        Msg::PageLoaded {
            request_id: table_core::RequestId(9),
            generation: table_core::Generation(0),
            result: Ok(table_core::ListResponse::default()),
        },
    );

    assert_eq!(state, next);
    assert!(effects.is_empty());
}
