//! Request routing onto the operation engine.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::FrameWriter;
use crate::engine::{CancelToken, Engine, ScanOutcome};
use crate::protocol::{CleanupParams, Method, PingResult, Request, Response, ScanParams};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::stream::{finish, stream_progress};
use super::tasks::OperationTracker;

/// Routes decoded requests for one engine.
///
/// `ping` and `categories` are answered inline. `scan` and `cleanup` run on
/// their own thread so the connection's read loop stays responsive; their
/// progress and terminal response reach the client through the shared
/// [`FrameWriter`]. `shutdown` belongs to the connection supervisor.
#[derive(Clone)]
pub struct Dispatcher {
    engine: Arc<Engine>,
    tasks: OperationTracker,
    queue_depth: usize,
}

impl Dispatcher {
    /// Creates a dispatcher whose progress queues hold `queue_depth` events.
    #[must_use]
    pub const fn new(engine: Arc<Engine>, tasks: OperationTracker, queue_depth: usize) -> Self {
        Self {
            engine,
            tasks,
            queue_depth,
        }
    }

    /// Reports whether a scan or cleanup is running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.engine.is_busy()
    }

    /// Handles one request, writing its responses to `writer`.
    ///
    /// Nothing is written once `cancel` has fired.
    pub fn dispatch<W>(&self, request: &Request, writer: &FrameWriter<W>, cancel: &CancelToken)
    where
        W: Write + Send + 'static,
    {
        if cancel.is_cancelled() {
            debug!(
                target: DISPATCH_TARGET,
                id = %request.id,
                "connection cancelled; request ignored"
            );
            return;
        }
        debug!(
            target: DISPATCH_TARGET,
            id = %request.id,
            method = %request.method,
            "dispatching request"
        );
        if let Err(error) = self.route(request, writer, cancel) {
            warn!(target: DISPATCH_TARGET, id = %request.id, %error, "request rejected");
            finish(writer, cancel, &Response::error(&request.id, &error));
        }
    }

    fn route<W>(
        &self,
        request: &Request,
        writer: &FrameWriter<W>,
        cancel: &CancelToken,
    ) -> Result<(), DispatchError>
    where
        W: Write + Send + 'static,
    {
        match request.method()? {
            Method::Ping => {
                finish(writer, cancel, &Response::result(&request.id, PingResult::default()));
                Ok(())
            }
            Method::Categories => {
                finish(writer, cancel, &Response::result(&request.id, self.engine.categories()));
                Ok(())
            }
            Method::Scan => self.start_scan(request, writer, cancel),
            Method::Cleanup => self.start_cleanup(request, writer, cancel),
            Method::Shutdown => Err(DispatchError::unroutable(Method::Shutdown.as_str())),
        }
    }

    fn start_scan<W>(
        &self,
        request: &Request,
        writer: &FrameWriter<W>,
        cancel: &CancelToken,
    ) -> Result<(), DispatchError>
    where
        W: Write + Send + 'static,
    {
        let selection = request.params::<ScanParams>()?.selection()?;
        let permit = self.engine.try_begin()?;
        let engine = Arc::clone(&self.engine);
        let output = writer.clone();
        let context = cancel.clone();
        let id = request.id.clone();
        let depth = self.queue_depth;

        self.tasks.spawn("scan", move || {
            let outcome = stream_progress(&output, &context, &id, depth, |progress| {
                engine.run_scan(&context, &selection, progress)
            });
            // The slot must be free before the client can see the result.
            drop(permit);
            let response = match outcome {
                Ok(ScanOutcome::Completed(report)) => Response::result(&id, report),
                Ok(ScanOutcome::Cancelled) => return,
                Err(error) => Response::error(&id, &error),
            };
            finish(&output, &context, &response);
        })
    }

    fn start_cleanup<W>(
        &self,
        request: &Request,
        writer: &FrameWriter<W>,
        cancel: &CancelToken,
    ) -> Result<(), DispatchError>
    where
        W: Write + Send + 'static,
    {
        let (token, selection) = request.params::<CleanupParams>()?.into_parts()?;
        let permit = self.engine.try_begin()?;
        let engine = Arc::clone(&self.engine);
        let output = writer.clone();
        let context = cancel.clone();
        let id = request.id.clone();
        let depth = self.queue_depth;

        self.tasks.spawn("cleanup", move || {
            let outcome = stream_progress(&output, &context, &id, depth, |progress| {
                engine.run_cleanup(&context, &token, &selection, progress)
            });
            drop(permit);
            let response = outcome.map_or_else(
                |error| Response::error(&id, &error),
                |tally| Response::result(&id, tally),
            );
            finish(&output, &context, &response);
        })
    }
}
