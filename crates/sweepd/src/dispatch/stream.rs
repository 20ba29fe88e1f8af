//! Bridges engine progress callbacks onto the connection's writer.
//!
//! The operation runs on the calling thread and pushes progress into a bounded
//! queue; a scoped relay thread drains the queue into `event` frames. The
//! relay keeps draining after the connection is cancelled or the peer is gone
//! so the producer never blocks on a full queue, but nothing further is
//! written.

use std::io::Write;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use tracing::debug;

use crate::codec::FrameWriter;
use crate::engine::CancelToken;
use crate::protocol::{EventPayload, Response};

use super::DISPATCH_TARGET;

/// Runs `operation`, relaying each progress value as an event for `id`.
///
/// Every event has been written or dropped by the time this returns, so a
/// terminal response written afterwards is always last.
pub(crate) fn stream_progress<W, E, T, F>(
    writer: &FrameWriter<W>,
    cancel: &CancelToken,
    id: &str,
    queue_depth: usize,
    operation: F,
) -> T
where
    W: Write + Send,
    E: Into<EventPayload> + Send,
    F: FnOnce(&mut dyn FnMut(E)) -> T,
{
    let (sender, receiver) = mpsc::sync_channel::<E>(queue_depth);
    thread::scope(|scope| {
        scope.spawn(move || relay(writer, cancel, id, receiver));
        let mut sink = move |event: E| {
            // Only fails if the relay thread panicked.
            if sender.send(event).is_err() {
                debug!(target: DISPATCH_TARGET, id, "progress relay gone");
            }
        };
        let outcome = operation(&mut sink);
        drop(sink);
        outcome
    })
}

fn relay<W, E>(writer: &FrameWriter<W>, cancel: &CancelToken, id: &str, events: Receiver<E>)
where
    W: Write,
    E: Into<EventPayload>,
{
    let mut dropped = 0_usize;
    for event in events {
        if cancel.is_cancelled() || writer.is_closed() {
            dropped += 1;
            continue;
        }
        if let Err(error) = writer.send(&Response::event(id, event)) {
            debug!(target: DISPATCH_TARGET, id, %error, "progress write failed");
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!(target: DISPATCH_TARGET, id, dropped, "progress events not delivered");
    }
}

/// Writes the terminal response unless the connection has been cancelled.
pub(crate) fn finish<W: Write>(
    writer: &FrameWriter<W>,
    cancel: &CancelToken,
    response: &Response,
) {
    if cancel.is_cancelled() {
        debug!(
            target: DISPATCH_TARGET,
            id = %response.id,
            "connection cancelled; terminal response dropped"
        );
        return;
    }
    if let Err(error) = writer.send(response) {
        debug!(
            target: DISPATCH_TARGET,
            id = %response.id,
            %error,
            "terminal response write failed"
        );
    }
}
