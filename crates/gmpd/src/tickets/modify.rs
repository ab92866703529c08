//! `modify_ticket`.

use crate::audit::{AuditAction, AuditRecord, AuditSink};
use crate::backend::{FieldUpdate, TicketManager, TicketModification};
use crate::command::TransportError;
use crate::command::response::{ResponseSink, error_response, ok_response};
use crate::entity::Entity;
use crate::outcome::ProtocolError;

use super::{TICKET_RESOURCE, backend_failure};

const COMMAND: &str = "modify_ticket";

/// Extracts the modification from the command tree.
///
/// Optional text fields are [`FieldUpdate::Unchanged`] when absent,
/// [`FieldUpdate::Clear`] when present but empty and [`FieldUpdate::Set`]
/// otherwise.
///
/// # Errors
///
/// Returns a validation error for an incomplete `assigned_to` or a missing
/// `ticket_id`.
pub fn modify_request(command: &Entity) -> Result<TicketModification, ProtocolError> {
    let user_id = match command.child("assigned_to") {
        Some(assigned_to) => {
            let user = assigned_to.child("user").ok_or_else(|| {
                ProtocolError::validation("MODIFY_TICKET requires USER in ASSIGNED_TO")
            })?;
            let id = user.attribute("id").filter(|id| !id.is_empty()).ok_or_else(|| {
                ProtocolError::validation("MODIFY_TICKET USER must have an id attribute")
            })?;
            Some(id.to_owned())
        }
        None => None,
    };

    let ticket_id = command
        .attribute("ticket_id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProtocolError::validation("MODIFY_TICKET requires a ticket_id attribute"))?;

    Ok(TicketModification {
        ticket_id: ticket_id.to_owned(),
        comment: field(command, "comment"),
        status: field(command, "status"),
        solved_comment: field(command, "solved_comment"),
        closed_comment: field(command, "closed_comment"),
        user_id,
    })
}

fn field(command: &Entity, name: &str) -> FieldUpdate<String> {
    match command.child(name) {
        None => FieldUpdate::Unchanged,
        Some(child) if child.text().is_empty() => FieldUpdate::Clear,
        Some(child) => FieldUpdate::Set(child.text().to_owned()),
    }
}

/// Runs `modify_ticket`.
///
/// # Errors
///
/// Returns [`TransportError`] when the response cannot be delivered.
pub fn modify_ticket<S>(
    manager: &dyn TicketManager,
    audit: &dyn AuditSink,
    command: &Entity,
    sink: &mut S,
) -> Result<(), TransportError>
where
    S: ResponseSink + ?Sized,
{
    let modification = match modify_request(command) {
        Ok(modification) => modification,
        Err(error) => return sink.send(&error_response(COMMAND, &error)),
    };

    let outcome = manager.modify_ticket(&modification).map_err(|error| {
        let mapped = error.to_protocol(&modification.ticket_id, modification.user_id.as_deref());
        backend_failure(COMMAND, &error, mapped)
    });

    match outcome {
        Ok(()) => {
            audit.record(&AuditRecord::success(
                TICKET_RESOURCE,
                modification.ticket_id.as_str(),
                AuditAction::Modified,
            ));
            sink.send(&ok_response(COMMAND))
        }
        Err(error) => {
            audit.record(&AuditRecord::failure(
                TICKET_RESOURCE,
                Some(modification.ticket_id.clone()),
                AuditAction::Modified,
            ));
            sink.send(&error_response(COMMAND, &error))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::tests::support::parse_entity;

    #[test]
    fn reads_tri_state_fields() {
        let modification = modify_request(&parse_entity(
            "<modify_ticket ticket_id=\"T1\">\
               <comment/>\
               <status>Fixed</status>\
               <solved_comment>Patched.</solved_comment>\
             </modify_ticket>",
        ))
        .expect("modification");
        assert_eq!(
            modification,
            TicketModification {
                ticket_id: "T1".to_owned(),
                comment: FieldUpdate::Clear,
                status: FieldUpdate::Set("Fixed".to_owned()),
                solved_comment: FieldUpdate::Set("Patched.".to_owned()),
                closed_comment: FieldUpdate::Unchanged,
                user_id: None,
            }
        );
    }

    #[test]
    fn field_text_is_taken_verbatim() {
        let modification = modify_request(&parse_entity(
            "<modify_ticket ticket_id=\"T1\">\
               <comment>Fixed in <![CDATA[v2]]> soon</comment>\
               <solved_comment> </solved_comment>\
             </modify_ticket>",
        ))
        .expect("modification");
        assert_eq!(
            modification.comment,
            FieldUpdate::Set("Fixed in v2 soon".to_owned())
        );
        assert_eq!(modification.solved_comment, FieldUpdate::Set(" ".to_owned()));
    }

    #[rstest]
    #[case("<modify_ticket/>", "MODIFY_TICKET requires a ticket_id attribute")]
    #[case("<modify_ticket ticket_id=\"\"/>", "MODIFY_TICKET requires a ticket_id attribute")]
    #[case(
        "<modify_ticket ticket_id=\"T1\"><assigned_to/></modify_ticket>",
        "MODIFY_TICKET requires USER in ASSIGNED_TO"
    )]
    #[case(
        "<modify_ticket ticket_id=\"T1\"><assigned_to><user/></assigned_to></modify_ticket>",
        "MODIFY_TICKET USER must have an id attribute"
    )]
    fn structural_requirements(#[case] xml: &str, #[case] message: &str) {
        assert_eq!(
            modify_request(&parse_entity(xml)),
            Err(ProtocolError::validation(message))
        );
    }

    #[test]
    fn assignment_change_carries_user() {
        let modification = modify_request(&parse_entity(
            "<modify_ticket ticket_id=\"T1\"><assigned_to><user id=\"U2\"/></assigned_to></modify_ticket>",
        ))
        .expect("modification");
        assert_eq!(modification.user_id.as_deref(), Some("U2"));
        assert!(modification.status.is_unchanged());
    }
}
