//! Request dispatch for the daemon's NDJSON protocol.
//!
//! The dispatcher maps a decoded [`Request`](crate::protocol::Request) onto an
//! engine operation. Long-running methods stream `event` frames through a
//! bounded queue and finish with one `result` or `error` frame; the connection
//! context is checked before starting, before each event and before the
//! terminal frame, and once it is cancelled nothing more is written.

mod errors;
mod handler;
mod stream;
mod tasks;

pub use self::errors::DispatchError;
pub use self::handler::Dispatcher;
pub use self::tasks::OperationTracker;

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
