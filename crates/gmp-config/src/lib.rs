//! Shared configuration for the management protocol daemon.
//!
//! Values are layered by `ortho_config`: built-in defaults, then a
//! configuration file, then `GMPD_*` environment variables, then command-line
//! flags. The daemon reads the socket endpoint, the telemetry settings, the
//! listing page size and the per-command size limit from here.

mod defaults;
mod logging;
mod socket;

use std::ffi::OsString;

use ortho_config::{OrthoConfig, OrthoResult};
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_MAX_COMMAND_BYTES, DEFAULT_ROWS, DEFAULT_TCP_PORT,
    default_log_filter, default_log_format, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "GMPD")]
pub struct Config {
    /// Socket the daemon listens on.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter directive.
    #[ortho_config(default = DEFAULT_LOG_FILTER.to_owned())]
    pub log_filter: String,
    /// Output format for log lines.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Page size for listings whose filter has no `rows=` term.
    #[ortho_config(default = DEFAULT_ROWS)]
    pub default_rows: u32,
    /// Maximum bytes a single command may carry before the connection is
    /// dropped.
    #[ortho_config(default = DEFAULT_MAX_COMMAND_BYTES)]
    pub max_command_bytes: usize,
}

impl Config {
    /// Loads the configuration from the process arguments, environment and
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when any layer fails to parse.
    pub fn load() -> OrthoResult<Self> {
        <Self as OrthoConfig>::load()
    }

    /// Loads the configuration using `args` in place of the process
    /// arguments.
    ///
    /// # Errors
    ///
    /// Returns the `ortho_config` error when any layer fails to parse.
    pub fn load_from_iter<I, T>(args: I) -> OrthoResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Socket endpoint the daemon binds.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// Log filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Listing page size used when a filter does not specify one.
    #[must_use]
    pub fn default_rows(&self) -> u32 {
        self.default_rows
    }

    /// Per-command byte budget.
    #[must_use]
    pub fn max_command_bytes(&self) -> usize {
        self.max_command_bytes
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
            default_rows: DEFAULT_ROWS,
            max_command_bytes: DEFAULT_MAX_COMMAND_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration_uses_documented_values() {
        let config = Config::default();
        assert_eq!(config.log_filter(), "info");
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.default_rows(), 10);
        assert_eq!(config.max_command_bytes(), 1024 * 1024);
    }
}
