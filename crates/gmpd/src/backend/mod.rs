//! Contract between the command layer and the ticket store.
//!
//! The command layer never inspects storage. It asks a [`TicketManager`] for
//! cursors and mutations and receives tagged outcomes, one enum per
//! operation, which [`crate::outcome`] maps onto protocol errors.

mod memory;

use std::sync::Arc;

use thiserror::Error;

use crate::listing::Filter;
use crate::outcome::Referent;

pub use self::memory::{MemoryTicketManager, Permissions, ScanResult};

/// Forward-only sequence of backend rows. Dropping the cursor releases it.
pub type Cursor<T> = Box<dyn Iterator<Item = Result<T, BackendFault>> + Send>;

/// Opaque backend failure. The message is logged, never sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("backend fault: {message}")]
pub struct BackendFault {
    message: String,
}

impl BackendFault {
    /// Creates a fault with a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Diagnostic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome of opening a listing or resolving a stored filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("{0} not found")]
    NotFound(Referent),
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Internal(#[from] BackendFault),
}

/// Outcome of creating a ticket from a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CreateError {
    #[error("ticket already exists")]
    AlreadyExists,
    #[error("assigned user not found")]
    UserNotFound,
    #[error("result not found")]
    ResultNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Internal(#[from] BackendFault),
}

/// Outcome of copying an existing ticket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CopyError {
    #[error("ticket already exists")]
    AlreadyExists,
    #[error("source ticket not found")]
    SourceNotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Internal(#[from] BackendFault),
}

/// Outcome of modifying a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModifyError {
    #[error("ticket already exists")]
    AlreadyExists,
    #[error("ticket not found")]
    TicketNotFound,
    #[error("assigned user not found")]
    UserNotFound,
    #[error("invalid status")]
    InvalidStatus,
    #[error("solved status requires a solved comment")]
    MissingSolvedComment,
    #[error("closed status requires a closed comment")]
    MissingClosedComment,
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Internal(#[from] BackendFault),
}

/// Selection of tickets for a listing.
///
/// `first` is the 1-based index of the first row to yield after filtering and
/// sorting. The page size is not part of the query: the listing stops pulling
/// once the page is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketQuery {
    /// Selects exactly one ticket when set.
    pub ticket_id: Option<String>,
    /// Filter terms and sort order.
    pub filter: Filter,
    /// Lists trashed tickets instead of live ones.
    pub trash: bool,
    /// 1-based index of the first row.
    pub first: u64,
}

/// One ticket as streamed by a listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TicketRow {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub comment: String,
    pub creation_time: String,
    pub modification_time: String,
    pub writable: bool,
    pub in_use: bool,
    /// Identifier of the assigned user.
    pub assigned_to: String,
    pub task_id: String,
    pub report_id: String,
    pub severity: f64,
    pub host: String,
    pub location: String,
    pub solution_type: String,
    pub status: String,
    pub open_time: String,
    pub solved_time: Option<String>,
    pub solved_comment: String,
    pub closed_time: Option<String>,
    pub closed_comment: String,
    pub confirmed_time: Option<String>,
    pub confirmed_report_id: Option<String>,
}

/// Input for [`TicketManager::create_ticket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    /// Free-form comment, empty when the command carried none.
    pub comment: String,
    pub result_id: String,
    /// Identifier of the user the ticket is assigned to.
    pub user_id: String,
}

/// Change requested for an optional text field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    /// The command did not mention the field.
    #[default]
    Unchanged,
    /// The command carried the field with no content.
    Clear,
    /// The command carried a new value.
    Set(T),
}

impl<T> FieldUpdate<T> {
    /// Returns the new value when one was given.
    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(value) => Some(value),
            Self::Unchanged | Self::Clear => None,
        }
    }

    /// True when the command did not mention the field.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }
}

/// Input for [`TicketManager::modify_ticket`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketModification {
    pub ticket_id: String,
    pub comment: FieldUpdate<String>,
    pub status: FieldUpdate<String>,
    pub solved_comment: FieldUpdate<String>,
    pub closed_comment: FieldUpdate<String>,
    /// New assignee, when the command carried `assigned_to/user`.
    pub user_id: Option<String>,
}

/// Ticket store consumed by the command layer.
///
/// Calls block until the store has answered.
pub trait TicketManager: Send + Sync {
    /// Opens a cursor over the tickets selected by `query`.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] when `query.ticket_id` names no ticket,
    /// [`LookupError::PermissionDenied`] when listing is not allowed.
    fn tickets(&self, query: &TicketQuery) -> Result<Cursor<TicketRow>, LookupError>;

    /// Counts tickets matching the filter, ignoring the window.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFault`] when the store cannot answer.
    fn ticket_count(&self, query: &TicketQuery) -> Result<u64, BackendFault>;

    /// Opens a cursor over the result identifiers linked to a ticket.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFault`] when the store cannot answer.
    fn ticket_results(&self, ticket_id: &str, trash: bool) -> Result<Cursor<String>, BackendFault>;

    /// Resolves a stored filter to its term.
    ///
    /// # Errors
    ///
    /// [`LookupError::NotFound`] with [`Referent::Filter`] for unknown ids.
    fn stored_filter(&self, filter_id: &str) -> Result<String, LookupError>;

    /// Creates a ticket and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns the [`CreateError`] describing why the store refused.
    fn create_ticket(&self, ticket: &NewTicket) -> Result<String, CreateError>;

    /// Copies an existing ticket and returns the identifier of the copy.
    ///
    /// # Errors
    ///
    /// Returns the [`CopyError`] describing why the store refused.
    fn copy_ticket(&self, comment: &str, source_id: &str) -> Result<String, CopyError>;

    /// Applies a modification.
    ///
    /// # Errors
    ///
    /// Returns the [`ModifyError`] describing why the store refused.
    fn modify_ticket(&self, modification: &TicketModification) -> Result<(), ModifyError>;

    /// Opens a cursor over the tickets linked to a result.
    ///
    /// # Errors
    ///
    /// Returns [`BackendFault`] when the store cannot answer.
    fn result_tickets(&self, result_id: &str) -> Result<Cursor<String>, BackendFault>;
}

impl<T> TicketManager for Arc<T>
where
    T: TicketManager + ?Sized,
{
    fn tickets(&self, query: &TicketQuery) -> Result<Cursor<TicketRow>, LookupError> {
        (**self).tickets(query)
    }

    fn ticket_count(&self, query: &TicketQuery) -> Result<u64, BackendFault> {
        (**self).ticket_count(query)
    }

    fn ticket_results(&self, ticket_id: &str, trash: bool) -> Result<Cursor<String>, BackendFault> {
        (**self).ticket_results(ticket_id, trash)
    }

    fn stored_filter(&self, filter_id: &str) -> Result<String, LookupError> {
        (**self).stored_filter(filter_id)
    }

    fn create_ticket(&self, ticket: &NewTicket) -> Result<String, CreateError> {
        (**self).create_ticket(ticket)
    }

    fn copy_ticket(&self, comment: &str, source_id: &str) -> Result<String, CopyError> {
        (**self).copy_ticket(comment, source_id)
    }

    fn modify_ticket(&self, modification: &TicketModification) -> Result<(), ModifyError> {
        (**self).modify_ticket(modification)
    }

    fn result_tickets(&self, result_id: &str) -> Result<Cursor<String>, BackendFault> {
        (**self).result_tickets(result_id)
    }
}
