//! Ticket commands: `get_tickets`, `create_ticket` and `modify_ticket`.

mod create;
mod get;
mod modify;
mod result_tickets;

use std::error::Error;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::audit::AuditSink;
use crate::backend::TicketManager;
use crate::command::response::{ResponseSink, error_response};
use crate::command::{CommandExecutor, CommandKind, DISPATCH_TARGET, TransportError};
use crate::entity::Entity;
use crate::listing::FilterSchema;
use crate::outcome::ProtocolError;

pub use self::create::{CreateRequest, create_ticket};
pub use self::get::{TicketListing, get_tickets};
pub use self::modify::{modify_request, modify_ticket};
pub use self::result_tickets::result_tickets_xml;

/// Resource kind used in audit records.
pub const TICKET_RESOURCE: &str = "ticket";

/// Columns accepted in ticket filters.
pub const TICKET_SCHEMA: FilterSchema = FilterSchema {
    columns: &[
        "uuid",
        "name",
        "comment",
        "owner",
        "status",
        "severity",
        "host",
        "location",
        "solution_type",
        "assigned_to",
        "task",
        "report",
        "created",
        "modified",
        "open_time",
        "solved_time",
        "closed_time",
        "confirmed_time",
    ],
    default_sort: "name",
};

/// Executes ticket commands against a [`TicketManager`], writing responses
/// to the connection's sink.
pub struct TicketExecutor<S> {
    manager: Arc<dyn TicketManager>,
    audit: Arc<dyn AuditSink>,
    default_rows: u32,
    sink: S,
}

impl<S: ResponseSink> TicketExecutor<S> {
    /// Builds an executor. `default_rows` sizes listing pages whose filter
    /// sets no `rows`.
    pub fn new(
        manager: Arc<dyn TicketManager>,
        audit: Arc<dyn AuditSink>,
        default_rows: u32,
        sink: S,
    ) -> Self {
        Self {
            manager,
            audit,
            default_rows,
            sink,
        }
    }

    /// Borrows the response sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutably borrows the response sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

impl<S: ResponseSink> CommandExecutor for TicketExecutor<S> {
    fn execute(&mut self, kind: CommandKind, command: Entity) -> Result<(), TransportError> {
        debug!(target: DISPATCH_TARGET, command = %kind, "executing command");
        match kind {
            CommandKind::GetTickets => {
                get_tickets(
                    self.manager.as_ref(),
                    self.default_rows,
                    &command,
                    &mut self.sink,
                )?;
            }
            CommandKind::CreateTicket => {
                create_ticket(
                    self.manager.as_ref(),
                    self.audit.as_ref(),
                    &command,
                    &mut self.sink,
                )?;
            }
            CommandKind::ModifyTicket => {
                modify_ticket(
                    self.manager.as_ref(),
                    self.audit.as_ref(),
                    &command,
                    &mut self.sink,
                )?;
            }
            CommandKind::Unknown => {
                debug!(
                    target: DISPATCH_TARGET,
                    element = command.name(),
                    "unknown command"
                );
                let error = ProtocolError::validation("Bogus command name");
                self.sink.send(&error_response(kind.as_str(), &error))?;
            }
        }
        self.sink.flush()
    }
}

/// Logs a backend refusal and passes the protocol error through.
fn backend_failure(command: &str, cause: &dyn Error, error: ProtocolError) -> ProtocolError {
    if error.is_internal() {
        warn!(target: DISPATCH_TARGET, command, error = %cause, "backend failure");
    } else {
        debug!(target: DISPATCH_TARGET, command, error = %cause, "backend refused command");
    }
    error
}
