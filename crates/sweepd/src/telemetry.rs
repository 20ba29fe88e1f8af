//! Structured log output for the daemon.
//!
//! A bare level such as `info` scopes to the daemon's own targets
//! (`sweepd::transport`, `sweepd::dispatch`, `sweepd::engine` and friends);
//! dependencies stay at `warn`. Any other expression is used verbatim.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing::{Subscriber, debug, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use sweep_config::{Config, LogFormat};

const DAEMON_CRATE: &str = env!("CARGO_CRATE_NAME");
const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");
const DEPENDENCY_LEVEL: LevelFilter = LevelFilter::WARN;

static ACTIVE: OnceCell<TelemetryHandle> = OnceCell::new();

/// Settings of the subscriber installed for this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
    directives: String,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Filter directives after scoping a bare level to the daemon.
    #[must_use]
    pub fn directives(&self) -> &str {
        &self.directives
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter does not parse.
    #[error("invalid log filter '{expression}': {message}")]
    Filter {
        /// Expression as configured.
        expression: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber was installed first.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global subscriber on first use.
///
/// Later calls hand back the settings already in force; a different
/// configuration is logged and otherwise ignored.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter does not parse or another
/// subscriber is already installed.
pub fn initialise(config: &Config) -> Result<&'static TelemetryHandle, TelemetryError> {
    let mut installed_now = false;
    let active = ACTIVE.get_or_try_init(|| {
        installed_now = true;
        install_subscriber(config)
    })?;
    if !installed_now && active.format != config.log_format() {
        debug!(
            target: TELEMETRY_TARGET,
            active = %active.format,
            requested = %config.log_format(),
            "telemetry already initialised"
        );
    }
    Ok(active)
}

/// Expands a bare level into daemon-scoped directives.
fn daemon_directives(expression: &str) -> String {
    expression.trim().parse::<LevelFilter>().map_or_else(
        |_| expression.to_owned(),
        |level| format!("{DEPENDENCY_LEVEL},{DAEMON_CRATE}={level}"),
    )
}

fn daemon_filter(expression: &str) -> Result<(EnvFilter, String), TelemetryError> {
    let directives = daemon_directives(expression);
    EnvFilter::try_new(&directives)
        .map(|filter| (filter, directives))
        .map_err(|error| TelemetryError::Filter {
            expression: expression.to_owned(),
            message: error.to_string(),
        })
}

fn install_subscriber(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let (filter, directives) = daemon_filter(config.log_filter())?;

    // Operation threads are named after their request, so thread names
    // attribute engine events to a client request.
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(
            builder
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish(),
        ),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)?;
    Ok(TelemetryHandle {
        format: config.log_format(),
        directives,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::bare_level("info", "warn,sweepd=info")]
    #[case::padded_level(" debug ", "warn,sweepd=debug")]
    #[case::explicit("sweepd::engine=trace", "sweepd::engine=trace")]
    #[case::mixed("warn,sweepd::transport=debug", "warn,sweepd::transport=debug")]
    fn bare_levels_scope_to_the_daemon(#[case] expression: &str, #[case] expected: &str) {
        assert_eq!(daemon_directives(expression), expected);
    }

    #[test]
    fn rejects_unparseable_filters() {
        let error = daemon_filter("sweepd=notalevel").expect_err("invalid level");
        assert!(matches!(
            error,
            TelemetryError::Filter { ref expression, .. } if expression == "sweepd=notalevel"
        ));
    }

    #[test]
    fn later_calls_keep_the_first_settings() {
        let first = initialise(&Config::default()).expect("first initialise");
        let compact = Config {
            log_format: LogFormat::Compact,
            ..Config::default()
        };
        let second = initialise(&compact).expect("second initialise");
        assert!(std::ptr::eq(first, second));
    }
}
