//! Ticket references embedded in result listings.

use crate::backend::{BackendFault, TicketManager};
use crate::command::response::id_element;

/// Renders `<tickets><ticket id=".."/>...</tickets>` for the tickets linked
/// to a result.
///
/// # Errors
///
/// Returns [`BackendFault`] when the cursor cannot be opened or advanced.
pub fn result_tickets_xml(manager: &dyn TicketManager, result_id: &str) -> Result<String, BackendFault> {
    let mut xml = String::from("<tickets>");
    for ticket_id in manager.result_tickets(result_id)? {
        xml.push_str(&id_element("ticket", &ticket_id?));
    }
    xml.push_str("</tickets>");
    Ok(xml)
}
