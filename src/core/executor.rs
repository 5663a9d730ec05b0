//! Process launch seam.
//!
//! The scheduler never touches OS processes directly; it asks a
//! [`ProcessLauncher`] for a [`ProcessHandle`] and polls it from the tick loop.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::core::SchedulerError;

/// A launched task process.
///
/// Logical task state and physical process liveness are tracked separately:
/// the scheduler may mark a task canceled while the handle still reports the
/// process as running, and reconciles them when the handle is reaped.
pub trait ProcessHandle: Send {
    /// OS process id.
    fn pid(&self) -> u32;

    /// File receiving merged stdout/stderr.
    fn log_path(&self) -> &Path;

    /// Non-blocking exit check. `Ok(None)` while running; once an exit code has
    /// been observed it is returned on every later call.
    fn poll(&mut self) -> Result<Option<i32>, SchedulerError>;

    /// Request a graceful stop. Best-effort: returns whether the request was
    /// delivered, not whether the process has exited.
    fn terminate(&mut self) -> bool;
}

/// Starts task commands as child processes.
pub trait ProcessLauncher: Send + Sync {
    /// Launch `command` for `task_id`, appending its output under `log_dir`.
    fn start(
        &self,
        task_id: &str,
        command: &str,
        log_dir: &Path,
    ) -> Result<Box<dyn ProcessHandle>, SchedulerError>;
}

/// Log file used for a task inside `log_dir`.
pub fn task_log_path(log_dir: &Path, task_id: &str) -> PathBuf {
    log_dir.join(format!("{task_id}.log"))
}

/// Spawner abstraction for async runtimes.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
