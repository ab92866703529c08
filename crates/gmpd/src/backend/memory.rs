//! In-memory ticket store.
//!
//! Serves the daemon when no external store is configured and backs the
//! behavioural tests. Cursors are snapshots taken when the query runs.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

use crate::listing::{Filter, FilterOp, FilterTerm, SortOrder};
use crate::outcome::Referent;

use super::{
    BackendFault, CopyError, CreateError, Cursor, FieldUpdate, LookupError, ModifyError,
    NewTicket, TicketManager, TicketModification, TicketQuery, TicketRow,
};

const STATUS_OPEN: &str = "Open";
const STATUS_FIXED: &str = "Fixed";
const STATUS_VERIFIED: &str = "Fix Verified";
const STATUS_CLOSED: &str = "Closed";

/// Operations the store allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub list: bool,
    pub create: bool,
    pub modify: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            list: true,
            create: true,
            modify: true,
        }
    }
}

/// Scan result a ticket can be raised from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanResult {
    pub id: String,
    /// Name of the finding; becomes the ticket name.
    pub name: String,
    pub task_id: String,
    pub report_id: String,
    pub host: String,
    pub location: String,
    pub severity: f64,
    pub solution_type: String,
}

#[derive(Debug, Clone)]
struct StoredTicket {
    row: TicketRow,
    results: Vec<String>,
    trashed: bool,
}

#[derive(Debug)]
struct State {
    owner: String,
    permissions: Permissions,
    users: Vec<String>,
    results: HashMap<String, ScanResult>,
    filters: HashMap<String, String>,
    tickets: Vec<StoredTicket>,
}

/// [`TicketManager`] keeping every ticket in process memory.
#[derive(Debug)]
pub struct MemoryTicketManager {
    state: RwLock<State>,
}

impl Default for MemoryTicketManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTicketManager {
    /// Creates an empty store owned by `admin`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_owner("admin")
    }

    /// Creates an empty store whose tickets are owned by `owner`.
    #[must_use]
    pub fn with_owner(owner: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(State {
                owner: owner.into(),
                permissions: Permissions::default(),
                users: Vec::new(),
                results: HashMap::new(),
                filters: HashMap::new(),
                tickets: Vec::new(),
            }),
        }
    }

    /// Registers a user tickets can be assigned to.
    pub fn add_user(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut state = self.state_mut();
        if !state.users.contains(&user_id) {
            state.users.push(user_id);
        }
    }

    /// Registers a scan result.
    pub fn add_result(&self, result: ScanResult) {
        self.state_mut().results.insert(result.id.clone(), result);
    }

    /// Stores a filter term under an identifier.
    pub fn add_filter(&self, filter_id: impl Into<String>, term: impl Into<String>) {
        self.state_mut().filters.insert(filter_id.into(), term.into());
    }

    /// Replaces the allowed operations.
    pub fn set_permissions(&self, permissions: Permissions) {
        self.state_mut().permissions = permissions;
    }

    /// Moves a ticket to the trash. Returns false for unknown tickets.
    pub fn trash_ticket(&self, ticket_id: &str) -> bool {
        let mut state = self.state_mut();
        match find_live_mut(&mut state.tickets, ticket_id) {
            Some(ticket) => {
                ticket.trashed = true;
                true
            }
            None => false,
        }
    }

    /// Records that a later report confirmed the fix. Returns false for
    /// unknown tickets.
    pub fn confirm_ticket(&self, ticket_id: &str, report_id: impl Into<String>) -> bool {
        let now = timestamp().unwrap_or_default();
        let mut state = self.state_mut();
        match find_live_mut(&mut state.tickets, ticket_id) {
            Some(ticket) => {
                ticket.row.status = STATUS_VERIFIED.to_owned();
                ticket.row.confirmed_time = Some(now.clone());
                ticket.row.confirmed_report_id = Some(report_id.into());
                ticket.row.modification_time = now;
                true
            }
            None => false,
        }
    }

    fn state(&self) -> Result<RwLockReadGuard<'_, State>, BackendFault> {
        self.state
            .read()
            .map_err(|_| BackendFault::new("ticket store lock poisoned"))
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_state_mut(&self) -> Result<RwLockWriteGuard<'_, State>, BackendFault> {
        self.state
            .write()
            .map_err(|_| BackendFault::new("ticket store lock poisoned"))
    }
}

impl TicketManager for MemoryTicketManager {
    fn tickets(&self, query: &TicketQuery) -> Result<Cursor<TicketRow>, LookupError> {
        let state = self.state()?;
        if !state.permissions.list {
            return Err(LookupError::PermissionDenied);
        }
        if let Some(ticket_id) = &query.ticket_id {
            let row = state
                .tickets
                .iter()
                .find(|ticket| ticket.trashed == query.trash && ticket.row.id == *ticket_id)
                .map(|ticket| ticket.row.clone())
                .ok_or(LookupError::NotFound(Referent::Ticket))?;
            return Ok(Box::new(std::iter::once(Ok(row))));
        }

        let mut rows = matching(&state, query);
        sort_rows(&mut rows, &query.filter);
        let skip = usize::try_from(query.first.saturating_sub(1)).unwrap_or(usize::MAX);
        let rows: Vec<_> = rows.into_iter().skip(skip).map(Ok).collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn ticket_count(&self, query: &TicketQuery) -> Result<u64, BackendFault> {
        let state = self.state()?;
        Ok(matching(&state, query).len() as u64)
    }

    fn ticket_results(&self, ticket_id: &str, trash: bool) -> Result<Cursor<String>, BackendFault> {
        let state = self.state()?;
        let results = state
            .tickets
            .iter()
            .find(|ticket| ticket.trashed == trash && ticket.row.id == ticket_id)
            .map(|ticket| ticket.results.clone())
            .unwrap_or_default();
        Ok(Box::new(results.into_iter().map(Ok)))
    }

    fn stored_filter(&self, filter_id: &str) -> Result<String, LookupError> {
        let state = self.state()?;
        state
            .filters
            .get(filter_id)
            .cloned()
            .ok_or(LookupError::NotFound(Referent::Filter))
    }

    fn create_ticket(&self, ticket: &NewTicket) -> Result<String, CreateError> {
        let now = timestamp()?;
        let mut state = self.try_state_mut()?;
        if !state.permissions.create {
            return Err(CreateError::PermissionDenied);
        }
        if !state.users.contains(&ticket.user_id) {
            return Err(CreateError::UserNotFound);
        }
        let result = state
            .results
            .get(&ticket.result_id)
            .cloned()
            .ok_or(CreateError::ResultNotFound)?;

        let id = Uuid::new_v4().to_string();
        if state.tickets.iter().any(|stored| stored.row.id == id) {
            return Err(CreateError::AlreadyExists);
        }
        let row = TicketRow {
            id: id.clone(),
            owner: state.owner.clone(),
            name: result.name,
            comment: ticket.comment.clone(),
            creation_time: now.clone(),
            modification_time: now.clone(),
            writable: true,
            in_use: false,
            assigned_to: ticket.user_id.clone(),
            task_id: result.task_id,
            report_id: result.report_id,
            severity: result.severity,
            host: result.host,
            location: result.location,
            solution_type: result.solution_type,
            status: STATUS_OPEN.to_owned(),
            open_time: now,
            solved_time: None,
            solved_comment: String::new(),
            closed_time: None,
            closed_comment: String::new(),
            confirmed_time: None,
            confirmed_report_id: None,
        };
        state.tickets.push(StoredTicket {
            row,
            results: vec![ticket.result_id.clone()],
            trashed: false,
        });
        Ok(id)
    }

    fn copy_ticket(&self, comment: &str, source_id: &str) -> Result<String, CopyError> {
        let now = timestamp()?;
        let mut state = self.try_state_mut()?;
        if !state.permissions.create {
            return Err(CopyError::PermissionDenied);
        }
        let mut copy = state
            .tickets
            .iter()
            .find(|ticket| !ticket.trashed && ticket.row.id == source_id)
            .cloned()
            .ok_or(CopyError::SourceNotFound)?;

        let id = Uuid::new_v4().to_string();
        if state.tickets.iter().any(|stored| stored.row.id == id) {
            return Err(CopyError::AlreadyExists);
        }
        copy.row.id.clone_from(&id);
        if !comment.is_empty() {
            comment.clone_into(&mut copy.row.comment);
        }
        copy.row.creation_time.clone_from(&now);
        copy.row.modification_time = now;
        copy.row.in_use = false;
        state.tickets.push(copy);
        Ok(id)
    }

    fn modify_ticket(&self, modification: &TicketModification) -> Result<(), ModifyError> {
        let now = timestamp()?;
        let mut state = self.try_state_mut()?;
        if !state.permissions.modify {
            return Err(ModifyError::PermissionDenied);
        }
        if let Some(user_id) = &modification.user_id
            && !state.users.contains(user_id)
        {
            return Err(ModifyError::UserNotFound);
        }
        let status = match &modification.status {
            FieldUpdate::Unchanged => None,
            FieldUpdate::Clear => return Err(ModifyError::InvalidStatus),
            FieldUpdate::Set(status) => Some(canonical_status(status)?),
        };
        let ticket = find_live_mut(&mut state.tickets, &modification.ticket_id)
            .ok_or(ModifyError::TicketNotFound)?;

        let mut updated = ticket.row.clone();
        apply_text(&mut updated.comment, &modification.comment);
        apply_text(&mut updated.solved_comment, &modification.solved_comment);
        apply_text(&mut updated.closed_comment, &modification.closed_comment);
        if let Some(user_id) = &modification.user_id {
            updated.assigned_to.clone_from(user_id);
        }
        match status {
            Some(STATUS_FIXED) => {
                if modification.solved_comment.as_set().is_none_or(String::is_empty) {
                    return Err(ModifyError::MissingSolvedComment);
                }
                updated.solved_time = Some(now.clone());
            }
            Some(STATUS_CLOSED) => {
                if modification.closed_comment.as_set().is_none_or(String::is_empty) {
                    return Err(ModifyError::MissingClosedComment);
                }
                updated.closed_time = Some(now.clone());
            }
            Some(_) => {
                updated.solved_time = None;
                updated.closed_time = None;
                updated.confirmed_time = None;
                updated.confirmed_report_id = None;
            }
            None => {}
        }
        if let Some(status) = status {
            status.clone_into(&mut updated.status);
        }
        updated.modification_time = now;
        ticket.row = updated;
        Ok(())
    }

    fn result_tickets(&self, result_id: &str) -> Result<Cursor<String>, BackendFault> {
        let state = self.state()?;
        let ids: Vec<_> = state
            .tickets
            .iter()
            .filter(|ticket| !ticket.trashed && ticket.results.iter().any(|id| id == result_id))
            .map(|ticket| Ok(ticket.row.id.clone()))
            .collect();
        Ok(Box::new(ids.into_iter()))
    }
}

fn timestamp() -> Result<String, BackendFault> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|error| BackendFault::new(format!("failed to format timestamp: {error}")))
}

fn find_live_mut<'a>(tickets: &'a mut [StoredTicket], ticket_id: &str) -> Option<&'a mut StoredTicket> {
    tickets
        .iter_mut()
        .find(|ticket| !ticket.trashed && ticket.row.id == ticket_id)
}

fn canonical_status(status: &str) -> Result<&'static str, ModifyError> {
    match status.trim().to_ascii_lowercase().as_str() {
        "open" => Ok(STATUS_OPEN),
        "fixed" | "solved" => Ok(STATUS_FIXED),
        "closed" => Ok(STATUS_CLOSED),
        _ => Err(ModifyError::InvalidStatus),
    }
}

fn apply_text(field: &mut String, update: &FieldUpdate<String>) {
    match update {
        FieldUpdate::Unchanged => {}
        FieldUpdate::Clear => field.clear(),
        FieldUpdate::Set(value) => value.clone_into(field),
    }
}

fn matching(state: &State, query: &TicketQuery) -> Vec<TicketRow> {
    state
        .tickets
        .iter()
        .filter(|ticket| ticket.trashed == query.trash)
        .filter(|ticket| query.filter.terms().iter().all(|term| term_matches(&ticket.row, term)))
        .map(|ticket| ticket.row.clone())
        .collect()
}

fn column_value(row: &TicketRow, column: &str) -> Option<String> {
    let value = match column {
        "uuid" => row.id.clone(),
        "name" => row.name.clone(),
        "comment" => row.comment.clone(),
        "owner" => row.owner.clone(),
        "status" => row.status.clone(),
        "severity" => format!("{:.1}", row.severity),
        "host" => row.host.clone(),
        "location" => row.location.clone(),
        "solution_type" => row.solution_type.clone(),
        "assigned_to" => row.assigned_to.clone(),
        "task" => row.task_id.clone(),
        "report" => row.report_id.clone(),
        "created" => row.creation_time.clone(),
        "modified" => row.modification_time.clone(),
        "open_time" => row.open_time.clone(),
        "solved_time" => row.solved_time.clone().unwrap_or_default(),
        "closed_time" => row.closed_time.clone().unwrap_or_default(),
        "confirmed_time" => row.confirmed_time.clone().unwrap_or_default(),
        _ => return None,
    };
    Some(value)
}

fn term_matches(row: &TicketRow, term: &FilterTerm) -> bool {
    let needle = term.value.to_lowercase();
    let Some(column) = &term.column else {
        return [&row.name, &row.comment, &row.host, &row.location]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
    };
    let Some(value) = column_value(row, column) else {
        return false;
    };
    match term.op {
        FilterOp::Equals => value.to_lowercase() == needle,
        FilterOp::Contains | FilterOp::Text => value.to_lowercase().contains(&needle),
        FilterOp::Greater => compare(&value, &term.value) == Ordering::Greater,
        FilterOp::Less => compare(&value, &term.value) == Ordering::Less,
    }
}

fn compare(left: &str, right: &str) -> Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(left), Ok(right)) => left.total_cmp(&right),
        _ => left.cmp(right),
    }
}

fn sort_rows(rows: &mut [TicketRow], filter: &Filter) {
    let sort = filter.sort();
    rows.sort_by(|left, right| {
        let ordering = compare(
            &column_value(left, &sort.field).unwrap_or_default(),
            &column_value(right, &sort.field).unwrap_or_default(),
        );
        match sort.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}
