//! Command intake for protocol connections.
//!
//! A connection carries a stream of XML commands. The stream is read in
//! arbitrary fragments and tokenized into element events, which a
//! [`Session`] routes into one command at a time:
//!
//! ```xml
//! <get_tickets filter="rows=2"/>
//! <create_ticket>
//!   <result id="R1"/>
//!   <assigned_to><user id="U1"/></assigned_to>
//! </create_ticket>
//! ```
//!
//! Each command is assembled into an [`Entity`](crate::entity::Entity) tree,
//! executed exactly once when its root element closes, and answered with a
//! `<{command}_response>` element. A connection handles commands strictly
//! in order; a new command only starts after the previous one completed.

mod builder;
mod errors;
mod handler;
mod kind;
mod lifecycle;
pub mod response;
mod session;
mod tokenizer;

pub use self::builder::TreeBuilder;
pub use self::errors::{BuildError, CommandError, StreamError, TransportError};
pub use self::handler::GmpConnectionHandler;
pub use self::kind::CommandKind;
pub use self::lifecycle::{CommandController, CommandExecutor, LifecycleState, Progress};
pub use self::session::Session;
pub use self::tokenizer::{ElementEvents, XmlTokenizer};

/// Tracing target for command dispatch.
pub const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
