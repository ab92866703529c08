//! Ticket management over the XML management protocol.
//!
//! `gmpd` accepts connections on a Unix or TCP socket and answers a stream
//! of XML commands per connection. Bytes arrive in arbitrary fragments; the
//! [`command`] layer tokenizes them, assembles each command into an
//! [`Entity`] tree and executes it once its root element closes. Ticket
//! commands (`get_tickets`, `create_ticket`, `modify_ticket`) run against a
//! [`TicketManager`] backend and answer with `<{command}_response>`
//! elements. Listings stream one row at a time under the paging rules in
//! [`listing`]; mutations write exactly one [`AuditRecord`] per backend
//! attempt.
//!
//! The binary bootstraps configuration from [`gmp_config`], installs
//! structured telemetry, serves an in-memory backend and stops on a
//! termination signal.

pub mod audit;
pub mod backend;
mod bootstrap;
pub mod command;
pub mod entity;
mod health;
pub mod listing;
pub mod outcome;
pub mod shutdown;
pub mod telemetry;
pub mod tickets;
pub mod transport;

pub use audit::{AuditAction, AuditOutcome, AuditRecord, AuditSink, TracingAuditSink};
pub use backend::{MemoryTicketManager, TicketManager};
pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use entity::Entity;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use outcome::ProtocolError;
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
