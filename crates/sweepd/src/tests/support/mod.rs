//! Test harness utilities shared by unit and behavioural suites.

mod buffer;
mod fixtures;
mod reporter;
mod server;

pub use buffer::SharedBuffer;
pub use fixtures::{FixtureTree, GatedSource};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use server::{Client, TestServer, socket_in};
