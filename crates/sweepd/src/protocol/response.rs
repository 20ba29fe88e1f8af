//! Response frames written back to clients.

use serde::Serialize;
use serde_json::Value;

use crate::engine::{CategoryInfo, CleanupEvent, CleanupTally, ScanEvent, ScanReport};

/// Version reported by `ping`.
pub const SERVICE_VERSION: &str = match option_env!("SWEEP_BUILD_VERSION") {
    Some(version) => version,
    None => "dev",
};

/// One response frame.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// Id of the request this answers.
    pub id: String,
    /// Kind-tagged payload.
    #[serde(flatten)]
    pub body: ResponseBody,
}

/// Response kinds, tagged on the wire by `type`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBody {
    /// Terminal success.
    Result {
        /// Method-specific result.
        result: ResultPayload,
    },
    /// Streamed progress.
    Event {
        /// Method-specific progress value.
        event: EventPayload,
    },
    /// Terminal failure.
    Error {
        /// Human-readable failure text.
        error: String,
    },
}

impl Response {
    /// Builds a terminal result.
    #[must_use]
    pub fn result(id: impl Into<String>, result: impl Into<ResultPayload>) -> Self {
        Self {
            id: id.into(),
            body: ResponseBody::Result {
                result: result.into(),
            },
        }
    }

    /// Builds a progress event.
    #[must_use]
    pub fn event(id: impl Into<String>, event: impl Into<EventPayload>) -> Self {
        Self {
            id: id.into(),
            body: ResponseBody::Event {
                event: event.into(),
            },
        }
    }

    /// Builds a terminal error from anything displayable.
    #[must_use]
    pub fn error(id: impl Into<String>, error: &impl ToString) -> Self {
        Self {
            id: id.into(),
            body: ResponseBody::Error {
                error: error.to_string(),
            },
        }
    }
}

/// Result of `ping`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PingResult {
    /// Always `ok`.
    pub status: &'static str,
    /// Daemon build version.
    pub version: &'static str,
}

impl Default for PingResult {
    fn default() -> Self {
        Self {
            status: "ok",
            version: SERVICE_VERSION,
        }
    }
}

/// Result of `shutdown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownResult {
    /// Always `shutting_down`.
    pub status: &'static str,
}

impl Default for ShutdownResult {
    fn default() -> Self {
        Self {
            status: "shutting_down",
        }
    }
}

/// Result payloads by method, with a passthrough for anything else.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    /// Answer to `ping`.
    Ping(PingResult),
    /// Answer to `categories`.
    Categories(Vec<CategoryInfo>),
    /// Final frame of `scan`.
    Scan(ScanReport),
    /// Final frame of `cleanup`.
    Cleanup(CleanupTally),
    /// Answer to `shutdown`.
    Shutdown(ShutdownResult),
    /// Any other JSON value, serialised as is.
    Other(Value),
}

/// Event payloads by method, with a passthrough for anything else.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    /// Progress through a scan.
    Scan(ScanEvent),
    /// One processed cleanup entry.
    Cleanup(CleanupEvent),
    /// Any other JSON value, serialised as is.
    Other(Value),
}

impl From<PingResult> for ResultPayload {
    fn from(result: PingResult) -> Self {
        Self::Ping(result)
    }
}

impl From<Vec<CategoryInfo>> for ResultPayload {
    fn from(categories: Vec<CategoryInfo>) -> Self {
        Self::Categories(categories)
    }
}

impl From<ScanReport> for ResultPayload {
    fn from(report: ScanReport) -> Self {
        Self::Scan(report)
    }
}

impl From<CleanupTally> for ResultPayload {
    fn from(tally: CleanupTally) -> Self {
        Self::Cleanup(tally)
    }
}

impl From<ShutdownResult> for ResultPayload {
    fn from(result: ShutdownResult) -> Self {
        Self::Shutdown(result)
    }
}

impl From<ScanEvent> for EventPayload {
    fn from(event: ScanEvent) -> Self {
        Self::Scan(event)
    }
}

impl From<CleanupEvent> for EventPayload {
    fn from(event: CleanupEvent) -> Self {
        Self::Cleanup(event)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::engine::EngineError;

    fn wire(response: &Response) -> Value {
        serde_json::to_value(response).expect("serialise response")
    }

    #[test]
    fn ping_result_matches_the_wire_contract() {
        let response = Response::result("1", PingResult::default());
        assert_eq!(
            wire(&response),
            json!({"id": "1", "type": "result", "result": {"status": "ok", "version": SERVICE_VERSION}})
        );
    }

    #[test]
    fn errors_carry_their_display_text() {
        let response = Response::error("4", &EngineError::InvalidToken);
        assert_eq!(
            wire(&response),
            json!({"id": "4", "type": "error", "error": "invalid token"})
        );
    }

    #[test]
    fn events_nest_the_payload() {
        let event = ScanEvent {
            category: "trash".into(),
            fraction: 0.5,
        };
        assert_eq!(
            wire(&Response::event("2", event)),
            json!({"id": "2", "type": "event", "event": {"category": "trash", "fraction": 0.5}})
        );
    }

    #[test]
    fn passthrough_payloads_serialise_verbatim() {
        let response = Response::result("x", ResultPayload::Other(json!({"future": [1, 2]})));
        assert_eq!(wire(&response)["result"], json!({"future": [1, 2]}));
    }
}
