//! Filtered, paginated resource listings.

mod filter;
mod protocol;
mod request;

pub use self::filter::{
    Filter, FilterError, FilterOp, FilterSchema, FilterTerm, PageSize, Sort, SortOrder,
};
pub use self::protocol::{ListingReport, ListingSource, ListingSummary, run_listing};
pub use self::request::{ListingQuery, ListingRequest};
