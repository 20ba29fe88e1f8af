//! Supervises daemon launch sequencing and runtime orchestration.

use std::sync::Arc;

use tracing::{info, warn};

use sweep_config::{Config, SocketPath};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{Dispatcher, OperationTracker};
use crate::engine::{Engine, FsCleanupExecutor, PathBlocklist, SafetyCheck, default_registry};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{ConnectionSupervisor, ServerControl, SessionLimits, SocketListener};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, S> {
    pub(crate) loader: L,
    pub(crate) reporter: Arc<dyn HealthReporter>,
    pub(crate) shutdown: S,
}

/// Runs the daemon using the production collaborators.
///
/// Returns once a client `shutdown` or a termination signal has stopped the
/// listener and every accepted operation has finished.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap fails, the socket cannot be
/// acquired or signal handlers cannot be installed.
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(LaunchPlan {
        loader: SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        shutdown: SystemShutdownSignal::new(),
    })
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<L, S>(plan: LaunchPlan<L, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    S: ShutdownSignal,
{
    let LaunchPlan {
        loader,
        reporter,
        shutdown,
    } = plan;

    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let config = bootstrap_with(&loader, reporter.as_ref())?;
    let socket = config.daemon_socket();
    let tasks = OperationTracker::new();
    let control = Arc::new(ServerControl::new());
    let supervisor = build_supervisor(&config, &socket, &tasks, &control);

    let listener = SocketListener::bind(&socket)?;
    let handle = listener.start(supervisor, Arc::clone(&control))?;
    reporter.listener_ready(&socket);

    let watcher = match shutdown.install(Arc::clone(&control)) {
        Ok(watcher) => watcher,
        Err(error) => {
            handle.shutdown();
            if let Err(join_error) = handle.join() {
                warn!(
                    target: PROCESS_TARGET,
                    error = %join_error,
                    "listener did not stop cleanly"
                );
            }
            return Err(error.into());
        }
    };

    let joined = handle.join();
    watcher.disarm();
    // Accepted cleanups run to completion even after the socket is gone.
    tasks.wait();
    joined?;

    reporter.shutdown_completed();
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}

fn build_supervisor(
    config: &Config,
    socket: &SocketPath,
    tasks: &OperationTracker,
    control: &Arc<ServerControl>,
) -> Arc<ConnectionSupervisor> {
    let safety = protected_paths(socket);
    let engine = Engine::new(
        default_registry(&safety),
        Arc::new(FsCleanupExecutor::new(Arc::clone(&safety))),
    );
    let dispatcher = Dispatcher::new(
        Arc::new(engine),
        tasks.clone(),
        config.progress_queue_depth(),
    );
    let limits = SessionLimits {
        idle_timeout: config.idle_timeout(),
        max_frame_bytes: config.max_frame_bytes(),
    };
    Arc::new(ConnectionSupervisor::new(
        dispatcher,
        Arc::clone(control),
        limits,
    ))
}

/// System blocklist extended with the daemon's own socket directory.
fn protected_paths(socket: &SocketPath) -> Arc<dyn SafetyCheck> {
    let blocklist = socket.directory().map_or_else(PathBlocklist::system, |directory| {
        PathBlocklist::system().protect_tree(directory.as_std_path())
    });
    Arc::new(blocklist)
}
