//! Shared configuration for the sweep daemon.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an optional
//! TOML file (`--config-path` or `SWEEP_CONFIG_PATH`), then `SWEEP_*`
//! environment variables, then command-line flags.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_MAX_FRAME_BYTES,
    DEFAULT_PROGRESS_QUEUE_DEPTH, default_log_filter, default_log_filter_string,
    default_log_format, default_socket_path,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketPath, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "SWEEP")]
pub struct Config {
    /// Filesystem path of the daemon's Unix domain socket.
    #[ortho_config(default = default_socket_path())]
    pub daemon_socket: Utf8PathBuf,
    /// `tracing` filter expression applied to daemon logs.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for daemon logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Seconds a connection may sit silent between requests.
    #[ortho_config(default = DEFAULT_IDLE_TIMEOUT_SECS)]
    pub idle_timeout_secs: u64,
    /// Largest accepted request line, excluding the newline.
    #[ortho_config(default = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
    /// Capacity of the queue between an operation and the connection writer.
    #[ortho_config(default = DEFAULT_PROGRESS_QUEUE_DEPTH)]
    pub progress_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_path(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            progress_queue_depth: DEFAULT_PROGRESS_QUEUE_DEPTH,
        }
    }
}

impl Config {
    /// Socket the daemon listens on.
    #[must_use]
    pub fn daemon_socket(&self) -> SocketPath {
        SocketPath::new(self.daemon_socket.clone())
    }

    /// Configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Configured log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Idle timeout armed before every connection read.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Maximum request line length in bytes.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// Bounded progress queue capacity.
    #[must_use]
    pub const fn progress_queue_depth(&self) -> usize {
        self.progress_queue_depth
    }

    /// Rejects values the daemon cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first zero-valued limit.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "idle_timeout_secs",
            });
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_frame_bytes",
            });
        }
        if self.progress_queue_depth == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "progress_queue_depth",
            });
        }
        Ok(())
    }
}

/// Errors reported by [`Config::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A limit that must be positive was configured as zero.
    #[error("configuration value '{field}' must be greater than zero")]
    ZeroLimit {
        /// Name of the offending field.
        field: &'static str,
    },
}
