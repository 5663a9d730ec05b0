//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Rejected input (enqueue payload or policy rules).
    #[error("validation error: {0}")]
    Validation(String),
    /// Requested preset does not exist.
    #[error("unknown policy preset: {0}")]
    UnknownPreset(String),
    /// Neither direct execution nor the shell fallback could start the command.
    #[error("launch failed: {0}")]
    Launch(String),
    /// A tracked process could not be polled or signaled.
    #[error("process error: {0}")]
    Process(String),
    /// Metrics provider could not produce a snapshot.
    #[error("metrics error: {0}")]
    Metrics(String),
    /// Durable store failure with context.
    #[error("store error: {0}")]
    Store(String),
    /// Scheduler configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
