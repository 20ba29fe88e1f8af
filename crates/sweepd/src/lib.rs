//! Local cleanup daemon for the sweep desktop front-end.
//!
//! `sweepd` listens on a Unix domain socket and speaks newline-delimited JSON.
//! A client asks which cleanup categories exist, scans some of them, and then
//! redeems the scan's one-time token to delete what the scan found. Scan and
//! cleanup stream progress events before their final result, run one at a
//! time, and stop producing output as soon as the client goes away.
//!
//! The crate is layered bottom-up:
//!
//! - [`codec`] frames JSON documents on a byte stream.
//! - [`protocol`] defines the request and response envelopes.
//! - [`engine`] owns scan sources, the cleanup executor and the scan token.
//! - [`dispatch`] routes requests onto the engine and relays progress.
//! - [`transport`] owns the socket, the per-connection read loop and shutdown.
//!
//! [`run_daemon`] wires these together behind configuration loading,
//! telemetry and signal handling.

mod bootstrap;
pub mod codec;
pub mod dispatch;
pub mod engine;
mod health;
mod process;
pub mod protocol;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SignalWatcher, SystemShutdownSignal, run_daemon,
};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
