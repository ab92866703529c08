//! Streaming of paginated listings.
//!
//! The protocol sends the response opening tag and filter echo, then one
//! element per row with the row's nested sub-items, then the sort echo and a
//! summary carrying the number of rows sent and the filtered total. Rows are
//! rendered into a one-row buffer and sent before the cursor advances, so a
//! failed send stops the listing with no further backend calls.

use tracing::warn;

use crate::backend::{BackendFault, Cursor, LookupError};
use crate::command::response::{ResponseSink, close_response, error_response, open_response};
use crate::command::{DISPATCH_TARGET, TransportError};
use crate::entity::escape_xml;
use crate::outcome::{ProtocolError, Referent};

use super::request::ListingQuery;

/// A resource collection that can be listed.
pub trait ListingSource {
    /// Row type yielded by the cursor.
    type Row;

    /// Element name of one row, e.g. `ticket`.
    fn element(&self) -> &'static str;

    /// Element name of one nested sub-item, e.g. `result`.
    fn nested_element(&self) -> &'static str;

    /// Opens the cursor starting at the 1-based row `first`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the selection cannot be listed.
    fn open(&self, query: &ListingQuery, first: u64) -> Result<Cursor<Self::Row>, LookupError>;

    /// Counts every row matching the filter.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFault`] when the store cannot answer.
    fn filtered_count(&self, query: &ListingQuery) -> Result<u64, BackendFault>;

    /// Identifier of a row.
    fn row_id<'row>(&self, row: &'row Self::Row) -> &'row str;

    /// Appends the row's fields to `out`.
    fn write_fields(&self, row: &Self::Row, out: &mut String);

    /// Opens the cursor over a row's sub-item identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFault`] when the store cannot answer.
    fn nested(&self, row: &Self::Row, query: &ListingQuery) -> Result<Cursor<String>, BackendFault>;
}

/// Totals reported at the end of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingSummary {
    /// Rows sent.
    pub count: u64,
    /// Rows matching the filter; 1 when a single resource was selected.
    pub filtered: u64,
    /// 1-based index of the first row sent.
    pub first: u64,
    /// Page size echo, `-1` for unbounded pages.
    pub rows: i64,
}

/// How a listing ended when the connection stayed usable.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingReport {
    /// Every row in the window was sent along with the summary.
    Completed(ListingSummary),
    /// The listing was answered with an error.
    Failed(ProtocolError),
}

/// Streams a listing to `sink`.
///
/// # Errors
///
/// Returns [`TransportError`] when a send fails. Cursors are dropped before
/// returning on every path.
pub fn run_listing<L, S>(
    source: &L,
    query: &ListingQuery,
    command: &str,
    sink: &mut S,
) -> Result<ListingReport, TransportError>
where
    L: ListingSource,
    S: ResponseSink + ?Sized,
{
    let mut first = query.first;
    let (mut cursor, mut pending) = match open_window(source, query, first) {
        Ok(window) => window,
        Err(error) => return fail(sink, command, error),
    };
    if pending.is_none() && first > 1 {
        first = 1;
        (cursor, pending) = match open_window(source, query, first) {
            Ok(window) => window,
            Err(error) => return fail(sink, command, error),
        };
    }

    sink.send(&open_response(command))?;
    sink.send(&filters_echo(query))?;

    let limit = query.rows.limit();
    let mut count = 0_u64;
    let mut buffer = String::new();
    while limit.is_none_or(|limit| count < limit) {
        let Some(row) = pending.take().or_else(|| cursor.next()) else {
            break;
        };
        let row = match row {
            Ok(row) => row,
            Err(fault) => return abort_stream(sink, command, &fault),
        };
        buffer.clear();
        if let Err(fault) = render_row(source, &row, query, &mut buffer) {
            return abort_stream(sink, command, &fault);
        }
        sink.send(&buffer)?;
        count += 1;
    }
    drop(cursor);

    let filtered = match &query.id {
        Some(_) => 1,
        None => match source.filtered_count(query) {
            Ok(filtered) => filtered,
            Err(fault) => return abort_stream(sink, command, &fault),
        },
    };
    let summary = ListingSummary {
        count,
        filtered,
        first,
        rows: query.rows.echo(),
    };
    sink.send(&sort_echo(query))?;
    sink.send(&format!(
        "<{element}_count count=\"{count}\" filtered=\"{filtered}\" first=\"{first}\" rows=\"{rows}\"/>",
        element = source.element(),
        rows = summary.rows,
    ))?;
    sink.send(&close_response(command))?;
    Ok(ListingReport::Completed(summary))
}

type Window<T> = (Cursor<T>, Option<Result<T, BackendFault>>);

fn open_window<L: ListingSource>(
    source: &L,
    query: &ListingQuery,
    first: u64,
) -> Result<Window<L::Row>, ProtocolError> {
    let mut cursor = source
        .open(query, first)
        .map_err(|error| lookup_failure(&error, query))?;
    let pending = cursor.next();
    Ok((cursor, pending))
}

fn lookup_failure(error: &LookupError, query: &ListingQuery) -> ProtocolError {
    if let LookupError::Internal(fault) = error {
        warn!(target: DISPATCH_TARGET, error = %fault, "listing query failed");
    }
    let id = match error {
        LookupError::NotFound(Referent::Filter) => query.filt_id.as_deref(),
        _ => query.id.as_deref(),
    };
    error.to_protocol(id.unwrap_or_default())
}

fn render_row<L: ListingSource>(
    source: &L,
    row: &L::Row,
    query: &ListingQuery,
    out: &mut String,
) -> Result<(), BackendFault> {
    let element = source.element();
    out.push_str(&format!("<{element} id=\"{}\">", escape_xml(source.row_id(row))));
    source.write_fields(row, out);
    let nested_element = source.nested_element();
    for item in source.nested(row, query)? {
        out.push_str(&format!("<{nested_element} id=\"{}\"/>", escape_xml(&item?)));
    }
    out.push_str(&format!("</{element}>"));
    Ok(())
}

fn filters_echo(query: &ListingQuery) -> String {
    format!(
        "<filters id=\"{}\"><term>{}</term></filters>",
        escape_xml(query.filt_id.as_deref().unwrap_or_default()),
        escape_xml(query.filter.source()),
    )
}

fn sort_echo(query: &ListingQuery) -> String {
    let sort = query.filter.sort();
    format!(
        "<sort><field>{}<order>{}</order></field></sort>",
        escape_xml(&sort.field),
        sort.order,
    )
}

fn fail<S>(sink: &mut S, command: &str, error: ProtocolError) -> Result<ListingReport, TransportError>
where
    S: ResponseSink + ?Sized,
{
    sink.send(&error_response(command, &error))?;
    Ok(ListingReport::Failed(error))
}

fn abort_stream<S>(
    sink: &mut S,
    command: &str,
    fault: &BackendFault,
) -> Result<ListingReport, TransportError>
where
    S: ResponseSink + ?Sized,
{
    warn!(target: DISPATCH_TARGET, error = %fault, "listing aborted mid-stream");
    let error = ProtocolError::Internal;
    sink.send(&format!(
        "<error status=\"{}\" status_text=\"{error}\"/>",
        error.status_code()
    ))?;
    sink.send(&close_response(command))?;
    Ok(ListingReport::Failed(error))
}
