//! Command identification by root element name.

use std::fmt;

/// Commands recognised by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Paginated ticket listing.
    GetTickets,
    /// Ticket creation from a result, or copy of an existing ticket.
    CreateTicket,
    /// Ticket modification.
    ModifyTicket,
    /// Any other root element; answered with a syntax error once complete.
    Unknown,
}

impl CommandKind {
    /// Maps a root element name to a command kind. Names are case-sensitive,
    /// as in the protocol.
    #[must_use]
    pub fn from_element(name: &str) -> Self {
        match name {
            "get_tickets" => Self::GetTickets,
            "create_ticket" => Self::CreateTicket,
            "modify_ticket" => Self::ModifyTicket,
            _ => Self::Unknown,
        }
    }

    /// Root element name of the command, `gmp` for unknown commands.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetTickets => "get_tickets",
            Self::CreateTicket => "create_ticket",
            Self::ModifyTicket => "modify_ticket",
            Self::Unknown => "gmp",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("get_tickets", CommandKind::GetTickets)]
    #[case("create_ticket", CommandKind::CreateTicket)]
    #[case("modify_ticket", CommandKind::ModifyTicket)]
    #[case("GET_TICKETS", CommandKind::Unknown)]
    #[case("delete_ticket", CommandKind::Unknown)]
    fn maps_root_elements(#[case] name: &str, #[case] expected: CommandKind) {
        assert_eq!(CommandKind::from_element(name), expected);
    }
}
