//! Listener implementation for the daemon's Unix socket.

use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use sweep_config::SocketPath;

use super::{ConnectionHandler, LISTENER_TARGET, ListenerError, ServerControl};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);
const SOCKET_MODE: u32 = 0o600;

/// Listener bound to the daemon socket, not yet accepting.
#[derive(Debug)]
pub struct SocketListener {
    path: PathBuf,
    listener: UnixListener,
}

impl SocketListener {
    /// Binds `socket`, recovering a stale socket file left by a dead daemon.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::PathConflict`] when the path holds something
    /// other than a socket and [`ListenerError::AlreadyRunning`] when a live
    /// daemon answers on it.
    pub fn bind(socket: &SocketPath) -> Result<Self, ListenerError> {
        let path = socket.as_path().as_std_path().to_path_buf();
        let listener = bind_unix(&path)?;
        Ok(Self { path, listener })
    }

    /// Socket file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts the accept loop on a background thread.
    ///
    /// Connections are served one at a time by `handler`; further clients wait
    /// in the kernel backlog. The loop exits once `control` requests shutdown,
    /// after which the socket file is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be made non-blocking or the
    /// thread cannot be spawned; the socket file is removed in both cases.
    pub fn start(
        self,
        handler: Arc<dyn ConnectionHandler>,
        control: Arc<ServerControl>,
    ) -> Result<ListenerHandle, ListenerError> {
        if let Err(source) = self.listener.set_nonblocking(true) {
            cleanup_unix_socket(&self.path);
            return Err(ListenerError::NonBlocking { source });
        }
        let loop_control = Arc::clone(&control);
        let path = self.path.clone();
        let handle = thread::Builder::new()
            .name("sweepd-listener".into())
            .spawn(move || run_accept_loop(&self, &loop_control, handler.as_ref()))
            .map_err(|source| {
                cleanup_unix_socket(&path);
                ListenerError::ThreadSpawn { source }
            })?;
        Ok(ListenerHandle {
            control,
            handle: Some(handle),
        })
    }
}

/// Handle to the background listener thread.
pub struct ListenerHandle {
    control: Arc<ServerControl>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    /// Requests shutdown without waiting for it.
    pub fn shutdown(&self) {
        self.control.request_shutdown();
    }

    /// Reports whether the accept loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(thread::JoinHandle::is_finished)
    }

    /// Waits for the accept loop to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::ThreadPanic`] if the loop panicked.
    pub fn join(mut self) -> Result<(), ListenerError> {
        self.handle.take().map_or(Ok(()), |handle| {
            handle.join().map_err(|_| ListenerError::ThreadPanic)
        })
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.control.request_shutdown();
        }
    }
}

fn run_accept_loop(
    listener: &SocketListener,
    control: &ServerControl,
    handler: &dyn ConnectionHandler,
) {
    info!(
        target: LISTENER_TARGET,
        path = %listener.path.display(),
        "socket listener active"
    );
    let mut last_error = None::<io::ErrorKind>;
    while !control.is_stopping() {
        match accept_connection(&listener.listener) {
            Ok(Some(stream)) => {
                last_error = None;
                handler.handle(stream);
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(
                        target: LISTENER_TARGET,
                        error = %error,
                        "socket accept error"
                    );
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    cleanup_unix_socket(&listener.path);
    info!(target: LISTENER_TARGET, "socket listener stopped");
}

fn accept_connection(listener: &UnixListener) -> io::Result<Option<UnixStream>> {
    match listener.accept() {
        Ok((stream, _)) => {
            stream.set_nonblocking(false)?;
            Ok(Some(stream))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn bind_unix(path: &Path) -> Result<UnixListener, ListenerError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => {
            if !metadata.file_type().is_socket() {
                return Err(ListenerError::PathConflict {
                    path: path.display().to_string(),
                });
            }
            if UnixStream::connect(path).is_ok() {
                return Err(ListenerError::AlreadyRunning {
                    path: path.display().to_string(),
                });
            }
            debug!(
                target: LISTENER_TARGET,
                path = %path.display(),
                "removing stale socket file"
            );
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(error) if error.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(ListenerError::StaleCleanup {
                        path: path.display().to_string(),
                        source,
                    });
                }
            }
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(source) => {
            return Err(ListenerError::Metadata {
                path: path.display().to_string(),
                source,
            });
        }
    }

    let listener = UnixListener::bind(path).map_err(|source| ListenerError::Bind {
        path: path.display().to_string(),
        source,
    })?;
    if let Err(source) = fs::set_permissions(path, Permissions::from_mode(SOCKET_MODE)) {
        cleanup_unix_socket(path);
        return Err(ListenerError::Permissions {
            path: path.display().to_string(),
            source,
        });
    }
    Ok(listener)
}

fn cleanup_unix_socket(path: &Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: LISTENER_TARGET,
            error = %error,
            path = %path.display(),
            "failed to remove unix socket file"
        );
    }
}
