//! Shared doubles and helpers for the daemon test suites.

use std::io::{self, Read};
use std::sync::Mutex;

use mockall::mock;

use crate::audit::{AuditRecord, AuditSink};
use crate::backend::{
    BackendFault, CopyError, CreateError, Cursor, LookupError, ModifyError, NewTicket,
    TicketManager, TicketModification, TicketQuery, TicketRow,
};
use crate::command::response::ResponseSink;
use crate::command::{TransportError, TreeBuilder, XmlTokenizer};
use crate::entity::Entity;

/// Parses a complete command document into its tree.
pub(crate) fn parse_entity(xml: &str) -> Entity {
    let mut builder = TreeBuilder::unbounded();
    XmlTokenizer::new(xml.as_bytes())
        .run(&mut builder)
        .expect("well-formed command");
    assert!(builder.is_done(), "command should be complete: {xml}");
    builder.take_root().expect("root element")
}

mock! {
    pub TicketStore {}

    impl TicketManager for TicketStore {
        fn tickets(&self, query: &TicketQuery) -> Result<Cursor<TicketRow>, LookupError>;
        fn ticket_count(&self, query: &TicketQuery) -> Result<u64, BackendFault>;
        fn ticket_results(&self, ticket_id: &str, trash: bool) -> Result<Cursor<String>, BackendFault>;
        fn stored_filter(&self, filter_id: &str) -> Result<String, LookupError>;
        fn create_ticket(&self, ticket: &NewTicket) -> Result<String, CreateError>;
        fn copy_ticket(&self, comment: &str, source_id: &str) -> Result<String, CopyError>;
        fn modify_ticket(&self, modification: &TicketModification) -> Result<(), ModifyError>;
        fn result_tickets(&self, result_id: &str) -> Result<Cursor<String>, BackendFault>;
    }
}

/// Audit sink keeping every record for assertions.
#[derive(Debug, Default)]
pub(crate) struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub(crate) fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records
            .lock()
            .expect("audit mutex poisoned")
            .push(record.clone());
    }
}

/// Response sink concatenating fragments in order.
#[derive(Debug, Default)]
pub(crate) struct ResponseBuffer {
    text: String,
    flushes: usize,
}

impl ResponseBuffer {
    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn flushes(&self) -> usize {
        self.flushes
    }

    pub(crate) fn clear(&mut self) {
        self.text.clear();
    }
}

impl ResponseSink for ResponseBuffer {
    fn send(&mut self, fragment: &str) -> Result<(), TransportError> {
        self.text.push_str(fragment);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.flushes += 1;
        Ok(())
    }
}

/// Reader handing out at most `chunk` bytes per call, like a slow socket.
pub(crate) struct ChunkedReader<'a> {
    bytes: &'a [u8],
    chunk: usize,
}

impl<'a> ChunkedReader<'a> {
    pub(crate) fn new(bytes: &'a [u8], chunk: usize) -> Self {
        Self {
            bytes,
            chunk: chunk.max(1),
        }
    }
}

impl Read for ChunkedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let take = self.chunk.min(buf.len()).min(self.bytes.len());
        let (head, tail) = self.bytes.split_at(take);
        buf[..take].copy_from_slice(head);
        self.bytes = tail;
        Ok(take)
    }
}
