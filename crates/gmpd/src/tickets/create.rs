//! `create_ticket`: raise a ticket from a result, or copy an existing one.

use crate::audit::{AuditAction, AuditRecord, AuditSink};
use crate::backend::{NewTicket, TicketManager};
use crate::command::TransportError;
use crate::command::response::{ResponseSink, created_response, error_response};
use crate::entity::Entity;
use crate::outcome::ProtocolError;

use super::{TICKET_RESOURCE, backend_failure};

const COMMAND: &str = "create_ticket";

/// What a `create_ticket` command asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateRequest {
    /// Copy the ticket named by the `copy` element's text.
    Copy { comment: String, source_id: String },
    /// Raise a new ticket.
    New(NewTicket),
}

impl CreateRequest {
    /// Extracts the request from the command tree.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first missing element or
    /// identifier.
    pub fn from_entity(command: &Entity) -> Result<Self, ProtocolError> {
        let comment = command
            .child("comment")
            .map(|comment| comment.text().to_owned())
            .unwrap_or_default();

        if let Some(copy) = command.child("copy") {
            return Ok(Self::Copy {
                comment,
                source_id: copy.text().to_owned(),
            });
        }

        let result = command
            .child("result")
            .ok_or_else(|| ProtocolError::validation("CREATE_TICKET requires a RESULT"))?;
        let assigned_to = command.child("assigned_to").ok_or_else(|| {
            ProtocolError::validation("CREATE_TICKET requires an ASSIGNED_TO element")
        })?;
        let user = assigned_to.child("user").ok_or_else(|| {
            ProtocolError::validation("CREATE_TICKET requires USER in ASSIGNED_TO")
        })?;

        let result_id = non_empty_id(result).ok_or_else(|| {
            ProtocolError::validation("CREATE_TICKET RESULT must have an id attribute")
        })?;
        let user_id = non_empty_id(user).ok_or_else(|| {
            ProtocolError::validation("CREATE_TICKET USER must have an id attribute")
        })?;

        Ok(Self::New(NewTicket {
            comment,
            result_id: result_id.to_owned(),
            user_id: user_id.to_owned(),
        }))
    }
}

fn non_empty_id(entity: &Entity) -> Option<&str> {
    entity.attribute("id").filter(|id| !id.is_empty())
}

/// Runs `create_ticket`.
///
/// Requests that fail validation are answered without calling the backend
/// or writing an audit record. Every backend attempt is audited once before
/// the response is sent.
///
/// # Errors
///
/// Returns [`TransportError`] when the response cannot be delivered.
pub fn create_ticket<S>(
    manager: &dyn TicketManager,
    audit: &dyn AuditSink,
    command: &Entity,
    sink: &mut S,
) -> Result<(), TransportError>
where
    S: ResponseSink + ?Sized,
{
    let request = match CreateRequest::from_entity(command) {
        Ok(request) => request,
        Err(error) => return sink.send(&error_response(COMMAND, &error)),
    };

    let outcome = match &request {
        CreateRequest::Copy { comment, source_id } => manager
            .copy_ticket(comment, source_id)
            .map_err(|error| backend_failure(COMMAND, &error, error.to_protocol(source_id))),
        CreateRequest::New(ticket) => manager
            .create_ticket(ticket)
            .map_err(|error| backend_failure(COMMAND, &error, error.to_protocol(ticket))),
    };

    match outcome {
        Ok(id) => {
            audit.record(&AuditRecord::success(
                TICKET_RESOURCE,
                id.as_str(),
                AuditAction::Created,
            ));
            sink.send(&created_response(COMMAND, &id))
        }
        Err(error) => {
            audit.record(&AuditRecord::failure(
                TICKET_RESOURCE,
                None,
                AuditAction::Created,
            ));
            sink.send(&error_response(COMMAND, &error))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(xml: &str) -> Entity {
        crate::tests::support::parse_entity(xml)
    }

    #[rstest]
    #[case("<create_ticket/>", "CREATE_TICKET requires a RESULT")]
    #[case(
        "<create_ticket><result id=\"R1\"/></create_ticket>",
        "CREATE_TICKET requires an ASSIGNED_TO element"
    )]
    #[case(
        "<create_ticket><result id=\"R1\"/><assigned_to/></create_ticket>",
        "CREATE_TICKET requires USER in ASSIGNED_TO"
    )]
    #[case(
        "<create_ticket><result/><assigned_to><user id=\"U1\"/></assigned_to></create_ticket>",
        "CREATE_TICKET RESULT must have an id attribute"
    )]
    #[case(
        "<create_ticket><result id=\"R1\"/><assigned_to><user id=\"\"/></assigned_to></create_ticket>",
        "CREATE_TICKET USER must have an id attribute"
    )]
    fn structural_requirements(#[case] xml: &str, #[case] message: &str) {
        assert_eq!(
            CreateRequest::from_entity(&parse(xml)),
            Err(ProtocolError::validation(message))
        );
    }

    #[test]
    fn copy_takes_precedence() {
        let request = CreateRequest::from_entity(&parse(
            "<create_ticket><comment>again</comment><copy>T1</copy><result id=\"R1\"/></create_ticket>",
        ))
        .expect("copy request");
        assert_eq!(
            request,
            CreateRequest::Copy {
                comment: "again".to_owned(),
                source_id: "T1".to_owned(),
            }
        );
    }

    #[test]
    fn comment_defaults_to_empty() {
        let request = CreateRequest::from_entity(&parse(
            "<create_ticket><result id=\"R1\"/><assigned_to><user id=\"U1\"/></assigned_to></create_ticket>",
        ))
        .expect("new request");
        assert_eq!(
            request,
            CreateRequest::New(NewTicket {
                comment: String::new(),
                result_id: "R1".to_owned(),
                user_id: "U1".to_owned(),
            })
        );
    }
}
