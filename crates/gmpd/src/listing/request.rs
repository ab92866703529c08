//! Listing parameters carried by a command's root attributes.

use crate::backend::TicketManager;
use crate::entity::Entity;
use crate::outcome::ProtocolError;

use super::filter::{Filter, FilterSchema, PageSize};

/// Attributes of a listing command before filter resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRequest {
    /// Identifier of the single resource to list.
    pub id: Option<String>,
    /// Inline filter term.
    pub filter: Option<String>,
    /// Identifier of a stored filter.
    pub filt_id: Option<String>,
    /// Lists trashed resources.
    pub trash: bool,
}

/// A listing request with its filter resolved and window fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    pub id: Option<String>,
    pub filt_id: Option<String>,
    pub filter: Filter,
    pub trash: bool,
    /// 1-based index of the first row.
    pub first: u64,
    pub rows: PageSize,
}

impl ListingRequest {
    /// Reads the request from the listing command's root element.
    ///
    /// `id_attribute` names the attribute selecting a single resource, for
    /// example `ticket_id`. Empty values and a `filt_id` of `0` count as
    /// absent.
    #[must_use]
    pub fn from_entity(command: &Entity, id_attribute: &str) -> Self {
        let present = |key: &str| {
            command
                .attribute(key)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };
        Self {
            id: present(id_attribute),
            filter: present("filter"),
            filt_id: present("filt_id").filter(|id| id != "0"),
            trash: command.attribute("trash") == Some("1"),
        }
    }

    /// Resolves the filter term and fixes the listing window.
    ///
    /// An inline filter takes precedence over a stored one.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown stored filters and a validation
    /// error for unusable filter terms.
    pub fn resolve(
        &self,
        manager: &dyn TicketManager,
        schema: &FilterSchema,
        default_rows: u32,
    ) -> Result<ListingQuery, ProtocolError> {
        let term = match (&self.filter, &self.filt_id) {
            (Some(filter), _) => filter.clone(),
            (None, Some(filt_id)) => manager
                .stored_filter(filt_id)
                .map_err(|error| error.to_protocol(filt_id))?,
            (None, None) => String::new(),
        };
        let filter =
            Filter::parse(&term, schema).map_err(|error| ProtocolError::validation(error.to_string()))?;
        let first = filter.first().unwrap_or(1);
        let rows = filter
            .rows()
            .unwrap_or(PageSize::Rows(u64::from(default_rows.max(1))));
        Ok(ListingQuery {
            id: self.id.clone(),
            filt_id: self.filt_id.clone(),
            filter,
            trash: self.trash,
            first,
            rows,
        })
    }
}
