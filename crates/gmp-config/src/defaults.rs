#[cfg(unix)]
use std::env;

#[cfg(unix)]
use camino::Utf8PathBuf;
#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9390;

/// Log filter expression applied when nothing else is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Page size used by listings whose filter does not carry `rows=`.
pub const DEFAULT_ROWS: u32 = 10;

/// Upper bound on the bytes a single command may accumulate while parsing.
pub const DEFAULT_MAX_COMMAND_BYTES: usize = 1024 * 1024;

/// Default log filter expression used by the daemon.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default socket endpoint for the daemon.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    let runtime = runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok());
    let (mut base, namespaced) = match runtime {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("gmpd");
    if namespaced {
        // SAFETY: geteuid has no preconditions and cannot fail.
        let uid = unsafe { geteuid() };
        base.push(format!("uid-{uid}"));
    }

    SocketEndpoint::unix(base.join("gmpd.sock"))
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}
