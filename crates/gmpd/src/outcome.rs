//! Client-visible protocol errors and the mapping from backend outcomes.
//!
//! Backends report tagged outcomes per operation ([`CreateError`],
//! [`CopyError`], [`ModifyError`], [`LookupError`]). Clients only ever see
//! the closed [`ProtocolError`] taxonomy: validation, conflict, not-found,
//! permission-denied and internal errors. Every mapping below is an
//! exhaustive `match`, so a new backend outcome cannot be left unmapped.

use std::fmt;

use thiserror::Error;

use crate::backend::{CopyError, CreateError, LookupError, ModifyError, NewTicket};

/// Kinds of objects a command can refer to by identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Referent {
    /// A ticket.
    Ticket,
    /// A user account.
    User,
    /// A scan result.
    Result,
    /// A stored filter.
    Filter,
}

impl Referent {
    /// Lowercase name used in protocol messages.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::User => "user",
            Self::Result => "result",
            Self::Filter => "filter",
        }
    }
}

impl fmt::Display for Referent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Errors reported to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Missing or malformed command structure, rejected before any backend
    /// call, or a field-specific rejection from the backend.
    #[error("{message}")]
    Validation { message: String },
    /// The resource already exists.
    #[error("{message}")]
    Conflict { message: String },
    /// A referenced object could not be resolved.
    #[error("Failed to find {referent} '{id}'")]
    NotFound { referent: Referent, id: String },
    /// The caller may not perform the operation.
    #[error("Permission denied")]
    PermissionDenied,
    /// The backend failed in a way the client cannot act on.
    #[error("Internal error")]
    Internal,
}

impl ProtocolError {
    /// Protocol status code for the error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } | Self::Conflict { .. } => 400,
            Self::PermissionDenied => 403,
            Self::NotFound { .. } => 404,
            Self::Internal => 500,
        }
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a not-found error naming the unresolved referent.
    pub fn not_found(referent: Referent, id: impl Into<String>) -> Self {
        Self::NotFound {
            referent,
            id: id.into(),
        }
    }

    /// True for errors that indicate a backend fault rather than a client
    /// mistake.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal)
    }
}

const TICKET_EXISTS: &str = "Ticket exists already";

impl CreateError {
    /// Maps a creation outcome onto the protocol taxonomy.
    #[must_use]
    pub fn to_protocol(&self, ticket: &NewTicket) -> ProtocolError {
        match self {
            Self::AlreadyExists => ProtocolError::conflict(TICKET_EXISTS),
            Self::UserNotFound => ProtocolError::not_found(Referent::User, &ticket.user_id),
            Self::ResultNotFound => ProtocolError::not_found(Referent::Result, &ticket.result_id),
            Self::PermissionDenied => ProtocolError::PermissionDenied,
            Self::Internal(_) => ProtocolError::Internal,
        }
    }
}

impl CopyError {
    /// Maps a copy outcome onto the protocol taxonomy.
    #[must_use]
    pub fn to_protocol(&self, source_id: &str) -> ProtocolError {
        match self {
            Self::AlreadyExists => ProtocolError::conflict(TICKET_EXISTS),
            Self::SourceNotFound => ProtocolError::not_found(Referent::Ticket, source_id),
            Self::PermissionDenied => ProtocolError::PermissionDenied,
            Self::Internal(_) => ProtocolError::Internal,
        }
    }
}

impl ModifyError {
    /// Maps a modification outcome onto the protocol taxonomy.
    #[must_use]
    pub fn to_protocol(&self, ticket_id: &str, user_id: Option<&str>) -> ProtocolError {
        match self {
            Self::AlreadyExists => ProtocolError::conflict(TICKET_EXISTS),
            Self::TicketNotFound => ProtocolError::not_found(Referent::Ticket, ticket_id),
            Self::UserNotFound => {
                ProtocolError::not_found(Referent::User, user_id.unwrap_or_default())
            }
            Self::InvalidStatus => ProtocolError::validation("Error in status"),
            Self::MissingSolvedComment => {
                ProtocolError::validation("Solved STATUS requires a SOLVED_COMMENT")
            }
            Self::MissingClosedComment => {
                ProtocolError::validation("Closed STATUS requires a CLOSED_COMMENT")
            }
            Self::PermissionDenied => ProtocolError::PermissionDenied,
            Self::Internal(_) => ProtocolError::Internal,
        }
    }
}

impl LookupError {
    /// Maps a lookup outcome onto the protocol taxonomy. `id` is the
    /// identifier the caller asked the backend to resolve.
    #[must_use]
    pub fn to_protocol(&self, id: &str) -> ProtocolError {
        match self {
            Self::NotFound(referent) => ProtocolError::not_found(*referent, id),
            Self::PermissionDenied => ProtocolError::PermissionDenied,
            Self::Internal(_) => ProtocolError::Internal,
        }
    }
}
