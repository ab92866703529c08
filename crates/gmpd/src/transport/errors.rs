//! Listener failures.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use gmp_config::SocketEndpoint;

/// Reasons the protocol socket could not be bound or served.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The TCP host did not resolve to a usable address.
    #[error("cannot resolve {endpoint}: {source}")]
    Resolve {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    #[error("cannot listen on {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[cfg(unix)]
    #[error("cannot listen on {endpoint}: {source}")]
    BindUnix {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    #[cfg(not(unix))]
    #[error("{endpoint} needs unix domain sockets")]
    UnsupportedUnix { endpoint: SocketEndpoint },
    /// Another process still accepts connections on the socket file.
    #[cfg(unix)]
    #[error("{endpoint} is already served by another daemon")]
    UnixInUse { endpoint: SocketEndpoint },
    #[cfg(unix)]
    #[error("{endpoint} points at a file that is not a socket")]
    UnixNotSocket { endpoint: SocketEndpoint },
    /// Inspecting, probing or removing a leftover socket file failed.
    #[cfg(unix)]
    #[error("cannot clear leftover socket for {endpoint}: {source}")]
    StaleSocket {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    #[error("cannot switch {endpoint} to non-blocking accepts: {source}")]
    NonBlocking {
        endpoint: SocketEndpoint,
        #[source]
        source: io::Error,
    },
    #[error("accept loop thread panicked")]
    ThreadPanic,
}
