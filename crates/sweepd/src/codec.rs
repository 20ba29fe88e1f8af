//! Newline-delimited JSON framing.
//!
//! Each frame is one UTF-8 JSON document followed by `\n`. [`FrameReader`]
//! enforces a per-line byte cap and recovers from oversized or malformed lines
//! without losing stream position. [`FrameWriter`] is cheap to clone and
//! serialises writers behind a lock so concurrent producers never interleave
//! frames.

use std::io::{self, BufRead, Write};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A line exceeded the configured cap. The line has been discarded.
    #[error("frame exceeds {limit} byte limit")]
    FrameTooLarge {
        /// Configured cap in bytes.
        limit: usize,
    },
    /// A line was not valid JSON. The line has been discarded.
    #[error("malformed JSON: {0}")]
    Decode(#[source] serde_json::Error),
    /// A frame could not be serialised.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The peer stopped accepting output earlier.
    #[error("peer disconnected")]
    PeerGone,
}

impl CodecError {
    /// Reports whether the stream itself may continue after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. } | Self::Decode(_))
    }

    /// Reports whether this is a read deadline expiring.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Io(error)
                if matches!(error.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
        )
    }
}

/// Reads capped NDJSON frames from a buffered stream.
///
/// A line interrupted by a read deadline stays buffered, so the next call
/// carries on from where the previous one stopped.
pub struct FrameReader<R> {
    reader: R,
    limit: usize,
    partial: Vec<u8>,
    oversized: bool,
}

impl<R: BufRead> FrameReader<R> {
    /// Wraps `reader`, rejecting lines longer than `limit` bytes.
    #[must_use]
    pub const fn new(reader: R, limit: usize) -> Self {
        Self {
            reader,
            limit,
            partial: Vec::new(),
            oversized: false,
        }
    }

    /// Reads the next non-blank frame.
    ///
    /// Returns `Ok(None)` at end of stream. A final line without a newline is
    /// still decoded.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FrameTooLarge`] or [`CodecError::Decode`] for a
    /// bad line, after which the next call reads the following line.
    /// Returns [`CodecError::Io`] when the stream fails; a timeout keeps the
    /// bytes read so far.
    pub fn read_frame(&mut self) -> Result<Option<Value>, CodecError> {
        loop {
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_slice(trimmed)
                .map(Some)
                .map_err(CodecError::Decode);
        }
    }

    fn read_line(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        loop {
            let (consumed, complete) = {
                let available = match self.reader.fill_buf() {
                    Ok(bytes) => bytes,
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
                    Err(error) => return Err(error.into()),
                };
                if available.is_empty() {
                    return self.take_line().map(|line| (!line.is_empty()).then_some(line));
                }
                let (chunk, terminated) = available
                    .iter()
                    .position(|byte| *byte == b'\n')
                    .map_or((available, false), |end| (available.split_at(end).0, true));
                if !self.oversized {
                    if self.partial.len() + chunk.len() > self.limit {
                        self.oversized = true;
                        self.partial = Vec::new();
                    } else {
                        self.partial.extend_from_slice(chunk);
                    }
                }
                (chunk.len() + usize::from(terminated), terminated)
            };
            self.reader.consume(consumed);
            if complete {
                return self.take_line().map(Some);
            }
        }
    }

    /// Hands back the buffered line and resets for the next one.
    fn take_line(&mut self) -> Result<Vec<u8>, CodecError> {
        let line = mem::take(&mut self.partial);
        if mem::replace(&mut self.oversized, false) {
            return Err(CodecError::FrameTooLarge { limit: self.limit });
        }
        Ok(line)
    }
}

/// Shared, lock-protected NDJSON writer.
pub struct FrameWriter<W> {
    inner: Arc<WriterState<W>>,
}

struct WriterState<W> {
    writer: Mutex<W>,
    closed: AtomicBool,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W: Write> FrameWriter<W> {
    /// Wraps `writer`.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            inner: Arc::new(WriterState {
                writer: Mutex::new(writer),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Serialises `frame` as one line and flushes it.
    ///
    /// A failed write closes the writer; later sends fail fast with
    /// [`CodecError::PeerGone`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PeerGone`] once closed, [`CodecError::Encode`]
    /// when `frame` cannot be serialised and [`CodecError::Io`] when the write
    /// fails.
    pub fn send<T: Serialize>(&self, frame: &T) -> Result<(), CodecError> {
        if self.is_closed() {
            return Err(CodecError::PeerGone);
        }
        let mut line = serde_json::to_vec(frame).map_err(CodecError::Encode)?;
        line.push(b'\n');

        let Ok(mut writer) = self.inner.writer.lock() else {
            self.close();
            return Err(CodecError::PeerGone);
        };
        if let Err(error) = writer.write_all(&line).and_then(|()| writer.flush()) {
            self.close();
            return Err(error.into());
        }
        Ok(())
    }
}

impl<W> FrameWriter<W> {
    /// Stops all further output.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Reports whether output has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::thread;

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn reader(input: &str, limit: usize) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(input.as_bytes().to_vec()), limit)
    }

    #[test]
    fn reads_frames_until_end_of_stream() {
        let mut frames = reader("{\"id\":\"1\"}\n\n  \n{\"id\":\"2\"}  \r\n", 1024);
        assert_eq!(frames.read_frame().expect("first"), Some(json!({"id": "1"})));
        assert_eq!(frames.read_frame().expect("second"), Some(json!({"id": "2"})));
        assert!(frames.read_frame().expect("eof").is_none());
    }

    #[test]
    fn decodes_a_final_line_without_newline() {
        let mut frames = reader("{\"id\":\"tail\"}", 1024);
        assert_eq!(frames.read_frame().expect("tail"), Some(json!({"id": "tail"})));
        assert!(frames.read_frame().expect("eof").is_none());
    }

    #[test]
    fn malformed_lines_do_not_end_the_stream() {
        let mut frames = reader("{not json}\n{\"ok\":true}\n", 1024);
        let error = frames.read_frame().expect_err("malformed");
        assert!(matches!(error, CodecError::Decode(_)));
        assert!(error.is_recoverable());
        assert_eq!(frames.read_frame().expect("next"), Some(json!({"ok": true})));
    }

    #[rstest]
    #[case::buffered(64)]
    #[case::tiny_buffer(3)]
    fn oversized_lines_are_skipped(#[case] capacity: usize) {
        let input = format!("{{\"pad\":\"{}\"}}\n{{\"ok\":1}}\n", "x".repeat(100));
        let cursor = Cursor::new(input.into_bytes());
        let mut frames = FrameReader::new(io::BufReader::with_capacity(capacity, cursor), 32);
        let error = frames.read_frame().expect_err("too large");
        assert!(matches!(error, CodecError::FrameTooLarge { limit: 32 }));
        assert_eq!(frames.read_frame().expect("next"), Some(json!({"ok": 1})));
    }

    #[test]
    fn a_line_cut_by_a_read_deadline_resumes_intact() {
        let script = ScriptedReader::new(vec![
            Ok(b"{\"id\":\"a\",".to_vec()),
            Err(io::ErrorKind::WouldBlock),
            Ok(b"\"method\":\"ping\"}\n".to_vec()),
        ]);
        let mut frames = FrameReader::new(io::BufReader::new(script), 1024);

        let error = frames.read_frame().expect_err("deadline");
        assert!(error.is_timeout());
        assert_eq!(
            frames.read_frame().expect("resumed"),
            Some(json!({"id": "a", "method": "ping"}))
        );
        assert!(frames.read_frame().expect("eof").is_none());
    }

    #[test]
    fn an_oversized_line_stays_rejected_across_a_read_deadline() {
        let script = ScriptedReader::new(vec![
            Ok(vec![b'x'; 40]),
            Err(io::ErrorKind::TimedOut),
            Ok(b"yyyy\n{\"ok\":2}\n".to_vec()),
        ]);
        let mut frames = FrameReader::new(io::BufReader::new(script), 32);

        assert!(frames.read_frame().expect_err("deadline").is_timeout());
        let error = frames.read_frame().expect_err("too large");
        assert!(matches!(error, CodecError::FrameTooLarge { limit: 32 }));
        assert_eq!(frames.read_frame().expect("next"), Some(json!({"ok": 2})));
    }

    #[test]
    fn writer_frames_each_message_on_its_own_line() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = FrameWriter::new(SharedBuffer(Arc::clone(&buffer)));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let producer = writer.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        producer.send(&json!({"producer": n, "seq": i})).expect("send");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("producer");
        }

        let bytes = buffer.lock().expect("buffer").clone();
        let text = String::from_utf8(bytes).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 400);
        for line in lines {
            serde_json::from_str::<Value>(line).expect("each line is a whole frame");
        }
    }

    #[test]
    fn write_failure_closes_the_writer() {
        let writer = FrameWriter::new(BrokenPipe);
        let first = writer.send(&json!({"id": "1"})).expect_err("broken");
        assert!(matches!(first, CodecError::Io(_)));
        assert!(writer.is_closed());
        let second = writer.send(&json!({"id": "2"})).expect_err("closed");
        assert!(matches!(second, CodecError::PeerGone));
    }

    #[test]
    fn timeouts_are_recognised() {
        let error = CodecError::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(error.is_timeout());
        assert!(!error.is_recoverable());
    }

    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Replays chunks and errors, one per `read` call.
    struct ScriptedReader {
        steps: std::collections::VecDeque<Result<Vec<u8>, io::ErrorKind>>,
    }

    impl ScriptedReader {
        fn new(steps: Vec<Result<Vec<u8>, io::ErrorKind>>) -> Self {
            Self {
                steps: steps.into(),
            }
        }
    }

    impl io::Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.steps.pop_front() {
                None => Ok(0),
                Some(Err(kind)) => Err(io::Error::from(kind)),
                Some(Ok(chunk)) => {
                    assert!(chunk.len() <= buf.len(), "chunk fits the read buffer");
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
            }
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
