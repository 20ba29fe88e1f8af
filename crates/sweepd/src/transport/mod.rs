//! Unix socket transport for the daemon.
//!
//! The listener owns the socket file: it recovers stale sockets at startup,
//! serves one connection at a time through a [`ConnectionHandler`] and removes
//! the file when it stops. [`ServerControl`] ties the accept loop, the active
//! connection and in-flight operations to one shutdown switch.

mod control;
mod errors;
mod handler;
mod listener;
mod supervisor;

pub use self::control::ServerControl;
pub use self::errors::ListenerError;
pub use self::handler::ConnectionHandler;
pub use self::listener::{ListenerHandle, SocketListener};
pub use self::supervisor::{ConnectionSupervisor, SessionLimits};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
