//! Socket listener for the protocol endpoint.
//!
//! The transport module binds the configured socket and accepts connections
//! on a background thread, handing each one to a [`ConnectionHandler`] on its
//! own thread.

mod errors;
mod handler;
mod listener;

pub use self::errors::ListenerError;
pub use self::handler::{ConnectionHandler, ConnectionStream};
pub use self::listener::{ListenerHandle, SocketListener};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
