//! Dispatch tests for [`TicketExecutor`] against a mocked backend.

use std::sync::Arc;

use rstest::{fixture, rstest};

use crate::audit::AuditAction;
use crate::backend::{BackendFault, LookupError, ModifyError, TicketModification, TicketRow};
use crate::command::{CommandExecutor, CommandKind};
use crate::tickets::TicketExecutor;

use super::support::{MockTicketStore, RecordingAuditSink, ResponseBuffer, parse_entity};

struct Harness {
    audit: Arc<RecordingAuditSink>,
    executor: TicketExecutor<ResponseBuffer>,
}

fn harness(store: MockTicketStore) -> Harness {
    let audit = Arc::new(RecordingAuditSink::default());
    let executor = TicketExecutor::new(
        Arc::new(store),
        audit.clone(),
        10,
        ResponseBuffer::default(),
    );
    Harness { audit, executor }
}

#[fixture]
fn untouched() -> MockTicketStore {
    let mut store = MockTicketStore::new();
    store.expect_tickets().never();
    store.expect_create_ticket().never();
    store.expect_copy_ticket().never();
    store.expect_modify_ticket().never();
    store
}

fn run(harness: &mut Harness, xml: &str) {
    let command = parse_entity(xml);
    let kind = CommandKind::from_element(command.name());
    harness
        .executor
        .execute(kind, command)
        .expect("response delivered");
}

#[rstest]
fn unknown_command_is_bogus(untouched: MockTicketStore) {
    let mut harness = harness(untouched);
    run(&mut harness, "<help/>");
    assert_eq!(
        harness.executor.sink().text(),
        "<gmp_response status=\"400\" status_text=\"Bogus command name\"/>"
    );
    assert_eq!(harness.executor.sink().flushes(), 1);
}

#[rstest]
fn create_without_result_skips_backend_and_audit(untouched: MockTicketStore) {
    let mut harness = harness(untouched);
    run(
        &mut harness,
        "<create_ticket><assigned_to><user id=\"U1\"/></assigned_to></create_ticket>",
    );
    assert!(harness.executor.sink().text().contains("status=\"400\""));
    assert!(harness.audit.records().is_empty());
}

#[rstest]
fn each_command_is_flushed(untouched: MockTicketStore) {
    let mut harness = harness(untouched);
    run(&mut harness, "<modify_ticket/>");
    harness.executor.sink_mut().clear();
    run(&mut harness, "<help/>");
    assert_eq!(harness.executor.sink().flushes(), 2);
    assert!(harness.executor.sink().text().starts_with("<gmp_response"));
}

#[test]
fn internal_modify_failure_is_audited_and_reported() {
    let mut store = MockTicketStore::new();
    store
        .expect_modify_ticket()
        .withf(|modification: &TicketModification| modification.ticket_id == "T1")
        .times(1)
        .returning(|_| Err(ModifyError::Internal(BackendFault::new("disk full"))));
    let mut harness = harness(store);

    run(
        &mut harness,
        "<modify_ticket ticket_id=\"T1\"><comment>x</comment></modify_ticket>",
    );

    assert_eq!(
        harness.executor.sink().text(),
        "<modify_ticket_response status=\"500\" status_text=\"Internal error\"/>"
    );
    let records = harness.audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Modified);
    assert_eq!(records[0].resource_id.as_deref(), Some("T1"));
}

#[test]
fn listing_fault_after_rows_closes_the_response() {
    let mut store = MockTicketStore::new();
    store.expect_tickets().times(1).returning(|_| {
        let rows: Vec<Result<TicketRow, BackendFault>> = vec![
            Ok(TicketRow {
                id: "T1".to_owned(),
                ..TicketRow::default()
            }),
            Err(BackendFault::new("cursor lost")),
        ];
        Ok(Box::new(rows.into_iter()))
    });
    store
        .expect_ticket_results()
        .returning(|_, _| Ok(Box::new(std::iter::empty())));
    store.expect_ticket_count().never();
    let mut harness = harness(store);

    run(&mut harness, "<get_tickets/>");

    let text = harness.executor.sink().text();
    assert!(text.contains("<ticket id=\"T1\">"), "{text}");
    assert!(
        text.ends_with(
            "<error status=\"500\" status_text=\"Internal error\"/></get_tickets_response>"
        ),
        "{text}"
    );
}

#[test]
fn listing_denied_by_backend() {
    let mut store = MockTicketStore::new();
    store
        .expect_tickets()
        .times(1)
        .returning(|_| Err(LookupError::PermissionDenied));
    let mut harness = harness(store);

    run(&mut harness, "<get_tickets/>");

    assert_eq!(
        harness.executor.sink().text(),
        "<get_tickets_response status=\"403\" status_text=\"Permission denied\"/>"
    );
}
