//! Request envelope parsing.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::engine::Selection;

use super::errors::ProtocolError;

/// Keyword selecting every category.
const SELECT_ALL: &str = "all";

/// A decoded request envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    /// Client-chosen correlation id, echoed on every response.
    pub id: String,
    /// Method name as sent.
    pub method: String,
    /// Method-specific payload; `null` when absent.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Interprets a decoded frame as a request.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedRequest`] when `id` or `method` is
    /// missing or not a string.
    pub fn from_value(frame: Value) -> Result<Self, ProtocolError> {
        serde_json::from_value(frame).map_err(|error| ProtocolError::malformed(error.to_string()))
    }

    /// Resolves the method name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMethod`] for names outside the protocol.
    pub fn method(&self) -> Result<Method, ProtocolError> {
        Method::parse(&self.method)
    }

    /// Decodes the params for a method, treating absent params as `{}`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidParams`] when the params do not match.
    pub fn params<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        let params = match &self.params {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(params)
            .map_err(|error| ProtocolError::invalid_params(error.to_string()))
    }
}

/// Best-effort id of a frame that may not be a valid request.
///
/// Returns an empty string when the frame carries no string `id`.
#[must_use]
pub fn correlation_id(frame: &Value) -> String {
    frame
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// Methods understood by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Liveness check.
    Ping,
    /// Lists the registered categories.
    Categories,
    /// Streams a scan and issues a token.
    Scan,
    /// Redeems a token and deletes what its scan found.
    Cleanup,
    /// Stops the daemon.
    Shutdown,
}

impl Method {
    /// Parses a wire method name.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownMethod`] for unrecognised names.
    pub fn parse(name: &str) -> Result<Self, ProtocolError> {
        match name {
            "ping" => Ok(Self::Ping),
            "categories" => Ok(Self::Categories),
            "scan" => Ok(Self::Scan),
            "cleanup" => Ok(Self::Cleanup),
            "shutdown" => Ok(Self::Shutdown),
            other => Err(ProtocolError::unknown_method(other)),
        }
    }

    /// Wire name of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Categories => "categories",
            Self::Scan => "scan",
            Self::Cleanup => "cleanup",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Wire form of a selection: the keyword `"all"` or a list of category ids.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SelectionParam {
    /// A bare keyword; only `all` is accepted.
    Keyword(String),
    /// Explicit category ids.
    Categories(Vec<String>),
}

impl SelectionParam {
    /// Converts to an engine selection.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidParams`] for keywords other than `all`.
    pub fn into_selection(self) -> Result<Selection, ProtocolError> {
        match self {
            Self::Keyword(keyword) if keyword == SELECT_ALL => Ok(Selection::All),
            Self::Keyword(keyword) => Err(ProtocolError::invalid_params(format!(
                "selection must be \"{SELECT_ALL}\" or a list of category ids, got \"{keyword}\""
            ))),
            Self::Categories(ids) => Ok(Selection::Categories(ids)),
        }
    }
}

fn resolve_selection(selection: Option<SelectionParam>) -> Result<Selection, ProtocolError> {
    selection.map_or(Ok(Selection::All), SelectionParam::into_selection)
}

/// Params of `scan`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScanParams {
    /// Categories to scan.
    #[serde(default)]
    pub selection: Option<SelectionParam>,
}

impl ScanParams {
    /// Selection to scan; absent means every category.
    ///
    /// # Errors
    ///
    /// Fails as [`SelectionParam::into_selection`] does.
    pub fn selection(self) -> Result<Selection, ProtocolError> {
        resolve_selection(self.selection)
    }
}

/// Params of `cleanup`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CleanupParams {
    /// Token issued by the most recent scan.
    pub token: String,
    /// Categories to clean within that scan's results.
    #[serde(default)]
    pub selection: Option<SelectionParam>,
}

impl CleanupParams {
    /// Splits into the token and the selection to clean.
    ///
    /// # Errors
    ///
    /// Fails as [`SelectionParam::into_selection`] does.
    pub fn into_parts(self) -> Result<(String, Selection), ProtocolError> {
        Ok((self.token, resolve_selection(self.selection)?))
    }
}
