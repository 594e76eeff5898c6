//! Error types for command execution.

use thiserror::Error;

/// Errors that can occur when running a shell command.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The command could not be spawned at all
    #[error("Failed to spawn command: {reason}")]
    Spawn { reason: String },

    /// The command ran but exited non-zero
    #[error("Command exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    /// The command was killed by a signal before exiting
    #[error("Command terminated by signal: {stderr}")]
    Terminated { stderr: String },
}

/// Result type alias for runner operations
pub type RunnerResult<T> = Result<T, RunnerError>;
