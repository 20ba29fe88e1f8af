use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Five minutes of silence closes a connection.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 5 * 60;

/// One mebibyte per request line.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Progress values buffered between an operation and the socket writer.
pub const DEFAULT_PROGRESS_QUEUE_DEPTH: usize = 32;

const SOCKET_DIRECTORY: &str = "sweep";
const SOCKET_FILE: &str = "sweepd.sock";

/// Default log filter expression used by the daemon.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the daemon.
#[must_use]
pub const fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Computes the default socket path under the system temporary directory.
///
/// The path is namespaced by effective user id so two users on one machine
/// never contend for the same socket.
#[must_use]
pub fn default_socket_path() -> Utf8PathBuf {
    let mut base = temp_base_directory();
    base.push(SOCKET_DIRECTORY);
    if let Some(namespace) = user_namespace() {
        base.push(namespace);
    }
    base.join(SOCKET_FILE)
}

fn temp_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> Option<String> {
    // SAFETY: `geteuid` has no preconditions and cannot fail.
    let uid = unsafe { geteuid() };
    Some(format!("uid-{uid}"))
}

#[cfg(not(unix))]
fn user_namespace() -> Option<String> {
    None
}
