//! `get_tickets`.

use crate::backend::{BackendFault, Cursor, LookupError, TicketManager, TicketQuery, TicketRow};
use crate::command::TransportError;
use crate::command::response::{ResponseSink, error_response, id_element, text_element};
use crate::entity::Entity;
use crate::listing::{ListingQuery, ListingReport, ListingRequest, ListingSource, run_listing};

use super::TICKET_SCHEMA;

const COMMAND: &str = "get_tickets";

/// Ticket collection as seen by the listing protocol.
pub struct TicketListing<'a> {
    manager: &'a dyn TicketManager,
}

impl<'a> TicketListing<'a> {
    /// Lists tickets held by `manager`.
    pub fn new(manager: &'a dyn TicketManager) -> Self {
        Self { manager }
    }
}

fn ticket_query(query: &ListingQuery, first: u64) -> TicketQuery {
    TicketQuery {
        ticket_id: query.id.clone(),
        filter: query.filter.clone(),
        trash: query.trash,
        first,
    }
}

fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

impl ListingSource for TicketListing<'_> {
    type Row = TicketRow;

    fn element(&self) -> &'static str {
        "ticket"
    }

    fn nested_element(&self) -> &'static str {
        "result"
    }

    fn open(&self, query: &ListingQuery, first: u64) -> Result<Cursor<TicketRow>, LookupError> {
        self.manager.tickets(&ticket_query(query, first))
    }

    fn filtered_count(&self, query: &ListingQuery) -> Result<u64, BackendFault> {
        self.manager.ticket_count(&ticket_query(query, query.first))
    }

    fn row_id<'row>(&self, row: &'row TicketRow) -> &'row str {
        &row.id
    }

    fn write_fields(&self, row: &TicketRow, out: &mut String) {
        out.push_str("<owner>");
        out.push_str(&text_element("name", row.owner.as_str()));
        out.push_str("</owner>");
        for (name, text) in [
            ("name", row.name.as_str()),
            ("comment", row.comment.as_str()),
            ("creation_time", row.creation_time.as_str()),
            ("modification_time", row.modification_time.as_str()),
            ("writable", flag(row.writable)),
            ("in_use", flag(row.in_use)),
        ] {
            out.push_str(&text_element(name, text));
        }

        out.push_str("<assigned_to>");
        out.push_str(&id_element("user", row.assigned_to.as_str()));
        out.push_str("</assigned_to>");
        out.push_str(&id_element("task", row.task_id.as_str()));
        out.push_str(&id_element("report", row.report_id.as_str()));
        out.push_str(&text_element("severity", &format!("{:.1}", row.severity)));
        for (name, text) in [
            ("host", row.host.as_str()),
            ("location", row.location.as_str()),
            ("solution_type", row.solution_type.as_str()),
            ("status", row.status.as_str()),
            ("open_time", row.open_time.as_str()),
        ] {
            out.push_str(&text_element(name, text));
        }

        if let Some(solved_time) = row.solved_time.as_deref().filter(|time| !time.is_empty()) {
            out.push_str(&text_element("solved_time", solved_time));
            out.push_str(&text_element("solved_comment", row.solved_comment.as_str()));
        }
        if let Some(closed_time) = row.closed_time.as_deref().filter(|time| !time.is_empty()) {
            out.push_str(&text_element("closed_time", closed_time));
            out.push_str(&text_element("closed_comment", row.closed_comment.as_str()));
        }
        if let Some(confirmed_time) = row
            .confirmed_time
            .as_deref()
            .filter(|time| !time.is_empty())
        {
            out.push_str(&text_element("confirmed_time", confirmed_time));
            if let Some(report_id) = &row.confirmed_report_id {
                out.push_str("<confirmed_report>");
                out.push_str(&id_element("report", report_id));
                out.push_str("</confirmed_report>");
            }
        }
    }

    fn nested(&self, row: &TicketRow, query: &ListingQuery) -> Result<Cursor<String>, BackendFault> {
        self.manager.ticket_results(&row.id, query.trash)
    }
}

/// Runs `get_tickets`.
///
/// # Errors
///
/// Returns [`TransportError`] when the response cannot be delivered.
pub fn get_tickets<S>(
    manager: &dyn TicketManager,
    default_rows: u32,
    command: &Entity,
    sink: &mut S,
) -> Result<ListingReport, TransportError>
where
    S: ResponseSink + ?Sized,
{
    let request = ListingRequest::from_entity(command, "ticket_id");
    match request.resolve(manager, &TICKET_SCHEMA, default_rows) {
        Ok(query) => run_listing(&TicketListing::new(manager), &query, COMMAND, sink),
        Err(error) => {
            sink.send(&error_response(COMMAND, &error))?;
            Ok(ListingReport::Failed(error))
        }
    }
}
