//! Real-socket daemon harness and line-oriented client.

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;

use sweep_config::SocketPath;

use crate::dispatch::{Dispatcher, OperationTracker};
use crate::engine::{Engine, FsCleanupExecutor, PathBlocklist, ScanRegistry};
use crate::transport::{
    ConnectionSupervisor, ListenerHandle, ServerControl, SessionLimits, SocketListener,
};

const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);
const SETTLE_POLL: Duration = Duration::from_millis(10);

/// A listener, supervisor and engine serving a socket in a temporary directory.
pub struct TestServer {
    _dir: TempDir,
    socket: SocketPath,
    control: Arc<ServerControl>,
    tasks: OperationTracker,
    handle: Option<ListenerHandle>,
}

impl TestServer {
    /// Serves `registry` from a fresh temporary directory.
    pub fn start(registry: ScanRegistry, idle_timeout: Duration) -> Self {
        Self::start_in(tempfile::tempdir().expect("temp dir"), registry, idle_timeout)
    }

    /// Serves `registry` on `sweepd.sock` inside `dir`.
    pub fn start_in(dir: TempDir, registry: ScanRegistry, idle_timeout: Duration) -> Self {
        let socket = socket_in(&dir);
        let engine = Engine::new(
            registry,
            Arc::new(FsCleanupExecutor::new(Arc::new(PathBlocklist::empty()))),
        );
        let tasks = OperationTracker::new();
        let control = Arc::new(ServerControl::new());
        let dispatcher = Dispatcher::new(Arc::new(engine), tasks.clone(), 8);
        let limits = SessionLimits {
            idle_timeout,
            max_frame_bytes: 64 * 1024,
        };
        let supervisor = Arc::new(ConnectionSupervisor::new(
            dispatcher,
            Arc::clone(&control),
            limits,
        ));
        let handle = SocketListener::bind(&socket)
            .expect("bind test socket")
            .start(supervisor, Arc::clone(&control))
            .expect("start test listener");
        Self {
            _dir: dir,
            socket,
            control,
            tasks,
            handle: Some(handle),
        }
    }

    pub fn socket(&self) -> &SocketPath {
        &self.socket
    }

    pub fn socket_file(&self) -> &Path {
        self.socket.as_path().as_std_path()
    }

    pub fn connect(&self) -> Client {
        Client::connect(self.socket_file())
    }

    /// Waits up to `within` for every operation thread to finish.
    pub fn settles_within(&self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.tasks.in_flight() == 0 {
                return true;
            }
            thread::sleep(SETTLE_POLL);
        }
        self.tasks.in_flight() == 0
    }

    /// Waits up to `within` for the accept loop to exit.
    pub fn stops_within(&self, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if self.handle.as_ref().is_none_or(ListenerHandle::is_finished) {
                return true;
            }
            thread::sleep(SETTLE_POLL);
        }
        false
    }

    pub fn is_stopping(&self) -> bool {
        self.control.is_stopping()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown();
            drop(handle.join());
        }
        self.tasks.wait();
    }
}

/// Socket path the harness binds inside `dir`.
pub fn socket_in(dir: &TempDir) -> SocketPath {
    let path = dir.path().join("sweepd.sock");
    SocketPath::new(path.to_str().expect("utf8 socket path"))
}

/// Blocking NDJSON client with a read timeout.
pub struct Client {
    reader: BufReader<UnixStream>,
    writer: UnixStream,
}

impl Client {
    pub fn connect(path: &Path) -> Self {
        let stream = UnixStream::connect(path).expect("connect to daemon");
        stream
            .set_read_timeout(Some(CLIENT_TIMEOUT))
            .expect("set client timeout");
        let writer = stream.try_clone().expect("clone client stream");
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    /// Writes one raw line.
    pub fn send_line(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).expect("write line");
        self.writer.write_all(b"\n").expect("write newline");
        self.writer.flush().expect("flush");
    }

    pub fn send(&mut self, frame: &Value) {
        self.send_line(&frame.to_string());
    }

    /// Reads the next frame, or `None` once the daemon has closed the stream.
    pub fn read_frame(&mut self) -> Option<Value> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(serde_json::from_str(&line).expect("daemon frame is JSON")),
            Err(error) if error.kind() == ErrorKind::ConnectionReset => None,
            Err(error) => panic!("failed to read frame: {error}"),
        }
    }

    /// Reads frames up to and including the first non-event frame.
    pub fn read_until_terminal(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Some(frame) = self.read_frame() {
            let terminal = frame["type"] != "event";
            frames.push(frame);
            if terminal {
                break;
            }
        }
        frames
    }

    /// Sends `frame` and collects its responses.
    pub fn request(&mut self, frame: &Value) -> Vec<Value> {
        self.send(frame);
        self.read_until_terminal()
    }

    /// Reports whether the daemon closes the stream within `within` without
    /// sending anything.
    pub fn closed_by_daemon_within(&mut self, within: Duration) -> bool {
        self.reader
            .get_ref()
            .set_read_timeout(Some(within))
            .expect("set close timeout");
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => true,
            Ok(_) => false,
            Err(error) => error.kind() == ErrorKind::ConnectionReset,
        }
    }
}
