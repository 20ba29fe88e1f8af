//! Entry point for the `sweepd` daemon.

use std::process::ExitCode;

#[expect(
    clippy::print_stderr,
    reason = "bootstrap failures may precede telemetry and must still reach the operator"
)]
fn main() -> ExitCode {
    match sweepd::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("sweepd: {error}");
            ExitCode::FAILURE
        }
    }
}
