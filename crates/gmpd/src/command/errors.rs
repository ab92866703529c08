//! Error types for command parsing and the per-command lifecycle.
//!
//! These errors concern the connection, not the client's command content:
//! a malformed command is answered with a protocol error response, while the
//! variants here end the connection.

use std::io;
use std::str::Utf8Error;

use thiserror::Error;

use super::kind::CommandKind;

/// Violations of the element event contract detected while building a tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// An element opened after the root element had already closed.
    #[error("element <{name}> opened after the command was complete")]
    AlreadyComplete { name: String },
    /// A close event arrived with no element open.
    #[error("closing tag </{name}> without an open element")]
    UnbalancedClose { name: String },
    /// A close event named a different element than the innermost open one.
    #[error("closing tag </{found}> does not match open element <{expected}>")]
    MismatchedClose { expected: String, found: String },
    /// The command grew beyond the configured byte budget.
    #[error("command exceeds the {max_bytes} byte limit")]
    TooLarge { max_bytes: usize },
}

/// Failure to deliver response bytes to the client.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Writing or flushing the connection failed.
    #[error("failed to send response: {0}")]
    Io(#[from] io::Error),
}

/// Errors that terminate command processing on a connection.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The event stream broke the builder contract.
    #[error("malformed command: {0}")]
    Build(#[from] BuildError),
    /// A new command started while another one was still in flight.
    #[error("command {running} is still in flight")]
    Busy { running: CommandKind },
    /// A text or close event arrived with no command in flight.
    #[error("no command in flight for </{name}>")]
    NoCommand { name: String },
    /// The response could not be delivered.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CommandError {
    /// Returns true when the client broke the protocol and should be told so
    /// before the connection closes.
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        match self {
            Self::Build(_) | Self::NoCommand { .. } => true,
            Self::Busy { .. } | Self::Transport(_) => false,
        }
    }
}

/// Errors raised while tokenizing a connection's byte stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The bytes were not well-formed XML or the read failed.
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// An element name was not valid UTF-8.
    #[error("invalid UTF-8 in element name: {0}")]
    Utf8(#[from] Utf8Error),
    /// The command layer rejected an event.
    #[error(transparent)]
    Command(#[from] CommandError),
}

impl StreamError {
    /// Returns true when the failure was caused by the client's input.
    #[must_use]
    pub fn is_client_fault(&self) -> bool {
        match self {
            Self::Xml(quick_xml::Error::Io(_)) => false,
            Self::Xml(_) | Self::Utf8(_) => true,
            Self::Command(error) => error.is_client_fault(),
        }
    }
}
