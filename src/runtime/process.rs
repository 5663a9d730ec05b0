//! Local child-process runner built on `tokio::process`.
//!
//! Must be called from within a tokio runtime.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::config::SchedulerConfig;
use crate::core::{task_log_path, ProcessHandle, ProcessLauncher, SchedulerError};

/// Log size above which a task log is rotated before the next launch.
pub const DEFAULT_MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Launches task commands as local child processes with output appended to a
/// per-task log file.
#[derive(Debug, Clone, Copy)]
pub struct LocalProcessRunner {
    max_log_bytes: u64,
}

impl Default for LocalProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_BYTES)
    }
}

impl LocalProcessRunner {
    /// Create a runner rotating logs above `max_log_bytes`.
    pub const fn new(max_log_bytes: u64) -> Self {
        Self { max_log_bytes }
    }

    /// Create a runner sized from `task_log_size_mb`.
    pub const fn from_config(cfg: &SchedulerConfig) -> Self {
        Self::new(cfg.max_log_bytes())
    }

    fn rotate(&self, log_dir: &Path, task_id: &str, log_path: &Path) -> std::io::Result<()> {
        match fs::metadata(log_path) {
            Ok(meta) if meta.len() > self.max_log_bytes => {
                let backup = log_dir.join(format!("{task_id}.1.log"));
                fs::rename(log_path, &backup)?;
                tracing::debug!(task_id, backup = %backup.display(), "rotated task log");
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn spawn_logged(mut cmd: Command, log: &File) -> std::io::Result<Child> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::from(log.try_clone()?))
        .stderr(Stdio::from(log.try_clone()?))
        .spawn()
}

fn direct(command: &str) -> Option<Command> {
    let argv = shlex::split(command)?;
    let (program, args) = argv.split_first()?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    Some(cmd)
}

fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

impl ProcessLauncher for LocalProcessRunner {
    fn start(
        &self,
        task_id: &str,
        command: &str,
        log_dir: &Path,
    ) -> Result<Box<dyn ProcessHandle>, SchedulerError> {
        let launch_err = |what: &str, e: std::io::Error| SchedulerError::Launch(format!("{what}: {e}"));

        fs::create_dir_all(log_dir).map_err(|e| launch_err(&log_dir.display().to_string(), e))?;
        let log_path = task_log_path(log_dir, task_id);
        self.rotate(log_dir, task_id, &log_path)
            .map_err(|e| launch_err("rotate log", e))?;
        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .map_err(|e| launch_err(&log_path.display().to_string(), e))?;

        let direct_attempt = match direct(command) {
            Some(cmd) => spawn_logged(cmd, &log).map_err(|e| e.to_string()),
            None => Err("command could not be split into arguments".to_string()),
        };
        let child = match direct_attempt {
            Ok(child) => child,
            Err(reason) => {
                tracing::debug!(task_id, %reason, "direct exec failed, falling back to shell");
                spawn_logged(shell(command), &log).map_err(|e| {
                    SchedulerError::Launch(format!("{command}: {reason}; shell fallback: {e}"))
                })?
            }
        };

        let pid = child
            .id()
            .ok_or_else(|| SchedulerError::Launch(format!("{command}: exited before a pid was assigned")))?;
        Ok(Box::new(LocalProcessHandle {
            child,
            pid,
            log_path,
            exit: None,
        }))
    }
}

/// Handle to a process started by [`LocalProcessRunner`].
pub struct LocalProcessHandle {
    child: Child,
    pid: u32,
    log_path: PathBuf,
    exit: Option<i32>,
}

impl ProcessHandle for LocalProcessHandle {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn poll(&mut self) -> Result<Option<i32>, SchedulerError> {
        if self.exit.is_some() {
            return Ok(self.exit);
        }
        let status = self
            .child
            .try_wait()
            .map_err(|e| SchedulerError::Process(format!("pid {}: {e}", self.pid)))?;
        // Killed by a signal: no exit code.
        self.exit = status.map(|s| s.code().unwrap_or(-1));
        Ok(self.exit)
    }

    fn terminate(&mut self) -> bool {
        if !matches!(self.poll(), Ok(None)) {
            return false;
        }
        #[cfg(unix)]
        let delivered = match std::process::Command::new("kill")
            .arg("-TERM")
            .arg(self.pid.to_string())
            .output()
        {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                tracing::warn!(
                    pid = self.pid,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "kill -TERM rejected"
                );
                false
            }
            Err(e) => {
                tracing::warn!(pid = self.pid, error = %e, "failed to run kill");
                false
            }
        };
        #[cfg(not(unix))]
        let delivered = self.child.start_kill().is_ok();
        delivered
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn wait_exit(handle: &mut Box<dyn ProcessHandle>) -> i32 {
        for _ in 0..200 {
            if let Some(code) = handle.poll().unwrap() {
                return code;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("process did not exit");
    }

    #[tokio::test]
    async fn test_output_appended_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LocalProcessRunner::default();

        let mut first = runner.start("T-1", "echo first", dir.path()).unwrap();
        assert_eq!(wait_exit(&mut first).await, 0);
        let mut second = runner.start("T-1", "echo second", dir.path()).unwrap();
        assert_eq!(wait_exit(&mut second).await, 0);

        assert_eq!(second.log_path(), dir.path().join("T-1.log"));
        let log = fs::read_to_string(second.log_path()).unwrap();
        assert_eq!(log, "first\nsecond\n");
    }

    #[tokio::test]
    async fn test_exit_code_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = LocalProcessRunner::default()
            .start("T-2", "sh -c 'exit 3'", dir.path())
            .unwrap();
        assert_eq!(wait_exit(&mut handle).await, 3);
        assert_eq!(handle.poll().unwrap(), Some(3));
        assert!(!handle.terminate());
    }

    #[tokio::test]
    async fn test_falls_back_to_shell() {
        let dir = tempfile::tempdir().unwrap();
        let runner = LocalProcessRunner::default();

        // unbalanced quote: not splittable, the shell reports the syntax error
        let mut unsplittable = runner.start("T-3", "echo 'oops", dir.path()).unwrap();
        assert_ne!(wait_exit(&mut unsplittable).await, 0);

        // unknown program: direct exec fails, shell runs it and exits 127
        let mut missing = runner
            .start("T-4", "definitely-not-a-real-binary-xyz", dir.path())
            .unwrap();
        assert_eq!(wait_exit(&mut missing).await, 127);
    }

    #[tokio::test]
    async fn test_rotates_oversized_log() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("T-5.log"), vec![b'x'; 64]).unwrap();

        let mut handle = LocalProcessRunner::new(16)
            .start("T-5", "echo fresh", dir.path())
            .unwrap();
        wait_exit(&mut handle).await;

        assert_eq!(fs::metadata(dir.path().join("T-5.1.log")).unwrap().len(), 64);
        assert_eq!(fs::read_to_string(dir.path().join("T-5.log")).unwrap(), "fresh\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut handle = LocalProcessRunner::default()
            .start("T-6", "sleep 30", dir.path())
            .unwrap();
        assert_eq!(handle.poll().unwrap(), None);
        assert!(handle.pid() > 0);
        assert!(handle.terminate());
        assert_eq!(wait_exit(&mut handle).await, -1);
    }

    #[tokio::test]
    async fn test_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut handle = LocalProcessRunner::default().start("T-7", "true", &nested).unwrap();
        assert_eq!(wait_exit(&mut handle).await, 0);
        assert!(nested.join("T-7.log").exists());
    }
}
