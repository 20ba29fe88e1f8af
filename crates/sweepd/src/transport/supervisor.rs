//! Per-connection read loop.
//!
//! A connection is idle while awaiting a frame and dispatching while a request
//! is handed off; scan and cleanup keep streaming on their own thread after
//! the loop goes back to reading. The loop ends on peer EOF, a read error, an
//! idle timeout, a client `shutdown` or server shutdown. It always cancels the
//! connection context on the way out.

use std::fmt;
use std::io::BufReader;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::codec::{FrameReader, FrameWriter};
use crate::dispatch::Dispatcher;
use crate::engine::CancelToken;
use crate::protocol::{Method, Request, Response, ShutdownResult, correlation_id};

use super::{ConnectionHandler, LISTENER_TARGET, ServerControl};

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Longest wait for the next frame.
    pub idle_timeout: Duration,
    /// Longest accepted frame in bytes.
    pub max_frame_bytes: usize,
}

/// Why a connection's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionExit {
    PeerClosed,
    IdleTimeout,
    ReadFailed,
    ShutdownRequested,
    ServerStopping,
}

impl fmt::Display for SessionExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::PeerClosed => "peer closed",
            Self::IdleTimeout => "idle timeout",
            Self::ReadFailed => "read failed",
            Self::ShutdownRequested => "shutdown requested",
            Self::ServerStopping => "server stopping",
        };
        f.write_str(reason)
    }
}

/// Outcome of handling one frame.
enum Flow {
    Continue,
    Shutdown,
}

/// Serves connections by decoding frames and handing requests to the
/// dispatcher.
pub struct ConnectionSupervisor {
    dispatcher: Dispatcher,
    control: Arc<ServerControl>,
    limits: SessionLimits,
}

impl ConnectionSupervisor {
    /// Creates a supervisor that stops with `control`.
    #[must_use]
    pub const fn new(
        dispatcher: Dispatcher,
        control: Arc<ServerControl>,
        limits: SessionLimits,
    ) -> Self {
        Self {
            dispatcher,
            control,
            limits,
        }
    }

    fn serve(&self, stream: &UnixStream) -> Result<SessionExit, std::io::Error> {
        let reader = stream.try_clone()?;
        let writer = FrameWriter::new(stream.try_clone()?);
        self.control.attach(stream.try_clone()?);
        let connection = self.control.lifetime().child();

        let mut frames = FrameReader::new(BufReader::new(reader), self.limits.max_frame_bytes);
        let exit = self.read_loop(stream, &mut frames, &writer, &connection);

        connection.cancel();
        writer.close();
        self.control.detach();
        if let Err(error) = stream.shutdown(Shutdown::Both) {
            debug!(target: LISTENER_TARGET, %error, "connection already shut down");
        }
        Ok(exit)
    }

    fn read_loop(
        &self,
        stream: &UnixStream,
        frames: &mut FrameReader<BufReader<UnixStream>>,
        writer: &FrameWriter<UnixStream>,
        connection: &CancelToken,
    ) -> SessionExit {
        loop {
            if connection.is_cancelled() {
                return SessionExit::ServerStopping;
            }
            if let Err(error) = stream.set_read_timeout(Some(self.limits.idle_timeout)) {
                warn!(target: LISTENER_TARGET, %error, "failed to arm read deadline");
                return SessionExit::ReadFailed;
            }
            let next = frames.read_frame();
            if let Err(error) = stream.set_read_timeout(None) {
                debug!(target: LISTENER_TARGET, %error, "failed to clear read deadline");
            }

            let flow = match next {
                Ok(Some(frame)) => self.handle_frame(frame, writer, connection),
                Ok(None) if connection.is_cancelled() => return SessionExit::ServerStopping,
                Ok(None) => return SessionExit::PeerClosed,
                // The deadline only guards a silent peer between requests.
                Err(error) if error.is_timeout() && self.dispatcher.is_busy() => Flow::Continue,
                Err(error) if error.is_timeout() => return SessionExit::IdleTimeout,
                Err(error) if error.is_recoverable() => {
                    debug!(target: LISTENER_TARGET, %error, "rejecting frame");
                    reply(writer, &Response::error("", &error));
                    Flow::Continue
                }
                Err(_) if connection.is_cancelled() => return SessionExit::ServerStopping,
                Err(error) => {
                    debug!(target: LISTENER_TARGET, %error, "connection read failed");
                    return SessionExit::ReadFailed;
                }
            };
            if matches!(flow, Flow::Shutdown) {
                return SessionExit::ShutdownRequested;
            }
        }
    }

    fn handle_frame(
        &self,
        frame: Value,
        writer: &FrameWriter<UnixStream>,
        connection: &CancelToken,
    ) -> Flow {
        let id = correlation_id(&frame);
        let request = match Request::from_value(frame) {
            Ok(request) => request,
            Err(error) => {
                debug!(target: LISTENER_TARGET, %error, "rejecting request");
                reply(writer, &Response::error(id, &error));
                return Flow::Continue;
            }
        };
        if matches!(request.method(), Ok(Method::Shutdown)) {
            info!(target: LISTENER_TARGET, id = %request.id, "client requested shutdown");
            // Stopping is visible before the acknowledgement reaches the client.
            self.control.mark_stopping();
            connection.cancel();
            reply(writer, &Response::result(&request.id, ShutdownResult::default()));
            return Flow::Shutdown;
        }
        self.dispatcher.dispatch(&request, writer, connection);
        Flow::Continue
    }
}

impl ConnectionHandler for ConnectionSupervisor {
    fn handle(&self, stream: UnixStream) {
        match self.serve(&stream) {
            Ok(exit) => debug!(target: LISTENER_TARGET, %exit, "connection closed"),
            Err(error) => warn!(target: LISTENER_TARGET, %error, "failed to set up connection"),
        }
    }
}

/// Writes a frame from the read loop; write failures only mean the peer left.
fn reply(writer: &FrameWriter<UnixStream>, response: &Response) {
    if let Err(error) = writer.send(response) {
        debug!(target: LISTENER_TARGET, %error, "response not delivered");
    }
}
