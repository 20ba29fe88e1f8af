//! Wire types for the daemon's NDJSON protocol.
//!
//! Clients send one request per line:
//!
//! ```json
//! {"id":"7","method":"scan","params":{"selection":["user-cache"]}}
//! ```
//!
//! Every response echoes the request id and carries a `type` of `event`,
//! `result` or `error`. Streaming methods send zero or more events followed by
//! exactly one `result` or `error`:
//!
//! ```json
//! {"id":"7","type":"event","event":{"category":"user-cache","fraction":0.0}}
//! {"id":"7","type":"result","result":{"categories":[],"total_size":0,"token":"..."}}
//! ```

mod errors;
mod request;
mod response;

pub use self::errors::ProtocolError;
pub use self::request::{
    CleanupParams, Method, Request, ScanParams, SelectionParam, correlation_id,
};
pub use self::response::{
    EventPayload, PingResult, Response, ResponseBody, ResultPayload, SERVICE_VERSION,
    ShutdownResult,
};
