use studio_core::{Connection, DbKind, OperationResult, RowState, TableOperation, Value};
use studio_grid::{
    CommitError, CommitOutcome, GridConfig, GridError, GridEvent, RowChange, TableState,
};
use studio_test_support::fixtures::{
    column, int_cell, record, table_result, text_cell, users_result, users_schema,
};
use studio_test_support::{FakeConnection, FakeUpdateOutcome, init_test_logging};

fn users(count: usize) -> TableState {
    TableState::new(&users_result(count), GridConfig::default()).with_schema(users_schema())
}

fn snapshot(state: &TableState) -> Vec<(usize, RowChange)> {
    state
        .changed_rows()
        .into_iter()
        .map(|(row, change)| (row, change.clone()))
        .collect()
}

#[tokio::test]
async fn successful_commit_applies_returned_rows_and_clears_overlay() {
    init_test_logging();

    let mut state = users(5);
    state.set_value(2, 1, text_cell("Alice"));
    state.mark_row_removed(4).expect("remove");
    let inserted = state.insert_row(&record(&[("name", text_cell("Bob"))]));
    assert_eq!(inserted, 5);

    let connection = FakeConnection::new(DbKind::Sqlite).with_next_rowid(100);
    let outcome = state
        .commit(&connection, &users_schema())
        .await
        .expect("commit should succeed");

    let CommitOutcome::Committed(summary) = outcome else {
        panic!("expected a committed outcome");
    };
    assert_eq!((summary.inserted, summary.updated, summary.deleted), (1, 1, 1));
    assert_eq!(summary.rows, vec![2, 4, 5]);

    assert!(state.changed_rows().is_empty());
    assert_eq!(state.row_count(), 5);
    assert_eq!(state.value(2, 1), Some(&text_cell("Alice")));
    assert_eq!(state.value(4, 0), Some(&int_cell(100)));
    assert_eq!(state.value(4, 1), Some(&text_cell("Bob")));
    assert!(!state.is_new_row(4));
    assert_eq!(state.row_status(4).state, RowState::Clean);

    let calls = connection.stats().update_calls;
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0],
        vec![
            TableOperation::update(
                record(&[("id", int_cell(3))]),
                record(&[("name", text_cell("Alice"))]),
            ),
            TableOperation::delete(record(&[("id", int_cell(5))])),
            TableOperation::insert(
                record(&[("name", text_cell("Bob"))]),
                Some("id".to_string()),
            ),
        ]
    );
}

#[tokio::test]
async fn failed_commit_keeps_overlay_and_retry_resends_same_plan() {
    init_test_logging();

    let mut state = users(3);
    state.set_value(0, 2, text_cell("dup@example.com"));
    state.mark_row_removed(1).expect("remove");
    let before = snapshot(&state);

    let connection = FakeConnection::new(DbKind::Turso).with_update_outcome(
        FakeUpdateOutcome::Error("UNIQUE constraint failed: users.email".to_string()),
    );

    let error = state
        .commit(&connection, &users_schema())
        .await
        .expect_err("driver rejects the batch");

    assert!(error.to_string().contains("UNIQUE"));
    assert_eq!(error.rows(), &[0, 1]);
    assert_eq!(snapshot(&state), before);
    assert!(!state.is_commit_in_flight());
    assert!(
        state
            .row_status(0)
            .state
            .error_message()
            .is_some_and(|m| m.contains("UNIQUE"))
    );

    state
        .commit(&connection, &users_schema())
        .await
        .expect("retry succeeds");

    let calls = connection.stats().update_calls;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    assert!(state.changed_rows().is_empty());
    assert_eq!(state.row_count(), 2);
}

#[tokio::test]
async fn short_response_is_a_hard_failure() {
    let mut state = users(3);
    state.set_value(0, 1, text_cell("A"));
    state.set_value(2, 1, text_cell("C"));
    let before = snapshot(&state);

    let connection =
        FakeConnection::new(DbKind::Rqlite).with_update_outcome(FakeUpdateOutcome::Truncated);

    let error = state
        .commit(&connection, &users_schema())
        .await
        .expect_err("truncated response");

    assert!(matches!(
        error,
        CommitError::ResultMismatch {
            expected: 2,
            actual: 1,
            ..
        }
    ));
    assert_eq!(snapshot(&state), before);
    assert_eq!(state.base_value(0, 1), Some(&text_cell("user1")));
}

#[tokio::test]
async fn result_for_replaced_state_is_discarded() {
    let mut state = users(4);
    state.set_value(1, 1, text_cell("stale"));

    let connection = FakeConnection::new(DbKind::Sqlite);
    let ticket = state.begin_commit(&users_schema()).expect("ticket");

    state.reload(&users_result(2));
    assert!(!state.is_commit_in_flight());

    let result = ticket.send(&connection).await;
    let outcome = state.finish_commit(ticket, result).expect("discarded");

    assert_eq!(outcome, CommitOutcome::Discarded);
    assert_eq!(state.row_count(), 2);
    assert_eq!(state.value(1, 1), Some(&text_cell("user2")));
    assert!(!state.has_pending_changes());
}

#[tokio::test]
async fn edits_made_while_in_flight_survive_reconciliation() {
    let mut state = users(4);
    state.set_value(0, 1, text_cell("A"));
    state.set_value(1, 1, text_cell("B"));

    let connection = FakeConnection::new(DbKind::Sqlite);
    let ticket = state.begin_commit(&users_schema()).expect("ticket");
    assert_eq!(state.row_status(1).state, RowState::Saving);

    state.set_value(0, 1, text_cell("A2"));
    state.set_value(3, 1, text_cell("D"));
    assert!(matches!(
        state.append_rows(Vec::new()),
        Err(GridError::CommitInFlight)
    ));
    assert!(matches!(
        state.begin_commit(&users_schema()),
        Err(CommitError::InFlight)
    ));

    let result = ticket.send(&connection).await;
    state.finish_commit(ticket, result).expect("commit");

    let pending: Vec<usize> = state.changed_rows().iter().map(|(row, _)| *row).collect();
    assert_eq!(pending, vec![0, 3]);
    assert_eq!(state.base_value(0, 1), Some(&text_cell("A")));
    assert_eq!(state.value(0, 1), Some(&text_cell("A2")));
    assert_eq!(state.base_value(1, 1), Some(&text_cell("B")));
    assert_eq!(state.row_status(1).state, RowState::Clean);
    assert_eq!(state.row_status(0).state, RowState::Dirty);
}

#[tokio::test]
async fn pending_inserts_are_pinned_while_in_flight() {
    let mut state = users(2);
    let row = state.insert_row(&record(&[("name", text_cell("Bob"))]));

    let connection = FakeConnection::new(DbKind::CloudflareD1)
        .with_update_outcome(FakeUpdateOutcome::Error("network down".to_string()));
    let ticket = state.begin_commit(&users_schema()).expect("ticket");

    assert!(matches!(
        state.mark_row_removed(row),
        Err(GridError::CommitInFlight)
    ));
    assert!(matches!(
        state.discard_changes(None),
        Err(GridError::CommitInFlight)
    ));

    let result = ticket.send(&connection).await;
    assert!(state.finish_commit(ticket, result).is_err());
    assert!(state.is_new_row(row));
    assert!(state.row_status(row).state.is_error());

    state.mark_row_removed(row).expect("removal allowed again");
    assert_eq!(state.row_count(), 2);
    assert!(!state.has_pending_changes());
}

#[tokio::test]
async fn sql_backed_commit_reselects_canonical_rows() {
    init_test_logging();

    let canonical = |id: i64, name: &str, email: &str| {
        table_result(
            vec![
                column("id", "INTEGER", false),
                column("name", "TEXT", true),
                column("email", "TEXT", true),
            ],
            vec![vec![int_cell(id), text_cell(name), text_cell(email)]],
        )
    };

    let connection = FakeConnection::new(DbKind::Sqlite)
        .with_update_outcome(FakeUpdateOutcome::Sql)
        .with_next_rowid(6)
        .with_query_result(
            "SELECT * FROM \"users\" WHERE \"id\" = 2 LIMIT 1",
            canonical(2, "Robert", "user2@example.com"),
        )
        .with_query_result(
            "SELECT * FROM \"users\" WHERE \"id\" = 6 LIMIT 1",
            canonical(6, "Bob", "bob@example.com"),
        );

    let mut state = users(3);
    state.set_value(1, 1, text_cell("Robert"));
    let inserted = state.insert_row(&record(&[
        ("id", Value::Null),
        ("name", text_cell("Bob")),
    ]));

    let preview = state
        .plan(&users_schema())
        .expect("plan")
        .to_sql(connection.dialect(), None, "users");
    assert_eq!(
        preview,
        vec![
            "UPDATE \"users\" SET \"name\" = 'Robert' WHERE \"id\" = 2".to_string(),
            "INSERT INTO \"users\" (\"name\") VALUES ('Bob')".to_string(),
        ]
    );

    state
        .commit(&connection, &users_schema())
        .await
        .expect("commit");

    assert_eq!(state.value(inserted, 0), Some(&int_cell(6)));
    assert_eq!(state.value(inserted, 2), Some(&text_cell("bob@example.com")));
    assert_eq!(connection.stats().transactions[0], preview);
}

#[tokio::test]
async fn commit_lifecycle_is_published_on_the_bus() {
    let bus = studio_grid::EventBus::new();
    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(move |event| {
        if matches!(
            event,
            GridEvent::CommitStarted { .. }
                | GridEvent::CommitFinished { .. }
                | GridEvent::CommitFailed { .. }
        ) && let Ok(mut events) = sink.lock()
        {
            events.push(event.clone());
        }
    });

    let mut state = users(2).with_event_bus(bus);
    state.set_value(0, 1, text_cell("x"));

    let connection = FakeConnection::new(DbKind::MySql).with_update_outcome(
        FakeUpdateOutcome::Results(vec![OperationResult::with_record(record(&[
            ("id", int_cell(1)),
            ("name", text_cell("x")),
        ]))]),
    );
    state
        .commit(&connection, &users_schema())
        .await
        .expect("commit");

    let events = seen.lock().map(|e| e.clone()).unwrap_or_default();
    assert_eq!(
        events,
        vec![
            GridEvent::CommitStarted { rows: vec![0] },
            GridEvent::CommitFinished { rows: vec![0] },
        ]
    );
}

#[tokio::test]
async fn insert_returned_without_key_is_flagged_instead_of_keyed_by_default() {
    init_test_logging();

    let mut state = users(1);
    let row = state.insert_row(&record(&[("name", text_cell("Bob"))]));

    let connection = FakeConnection::new(DbKind::Postgres).with_update_outcome(
        FakeUpdateOutcome::Results(vec![OperationResult::empty()]),
    );
    let outcome = state
        .commit(&connection, &users_schema())
        .await
        .expect("commit");

    let CommitOutcome::Committed(summary) = outcome else {
        panic!("expected a committed outcome");
    };
    assert_eq!(summary.unresolved, vec![row]);
    assert!(!state.is_new_row(row));
    assert_eq!(state.value(row, 1), Some(&text_cell("Bob")));
    assert!(state.row_status(row).state.is_error());

    state.set_value(row, 1, text_cell("Robert"));
    let error = state.plan(&users_schema()).expect_err("key is unknown");
    assert!(matches!(error, CommitError::UnresolvedKey { row: r, .. } if r == row));
    assert_eq!(error.rows(), &[row]);

    assert!(state.commit(&connection, &users_schema()).await.is_err());
    assert_eq!(connection.stats().update_calls.len(), 1);
}

#[tokio::test]
async fn removal_requested_while_updating_stays_pending() {
    let mut state = users(3);
    state.set_value(1, 1, text_cell("B"));

    let connection = FakeConnection::new(DbKind::Sqlite);
    let ticket = state.begin_commit(&users_schema()).expect("ticket");
    state.mark_row_removed(1).expect("mark");

    let result = ticket.send(&connection).await;
    state.finish_commit(ticket, result).expect("commit");

    assert_eq!(state.row_count(), 3);
    assert_eq!(state.base_value(1, 1), Some(&text_cell("B")));
    assert!(state.is_row_removed(1));
    assert!(!state.row_status(1).is_dirty);
}
