//! Error types shared by the executor and the runner.
//!
//! Only construction problems and executor failures are errors. A command that
//! exits nonzero is a recorded outcome, not an error.

use thiserror::Error;

/// Errors raised while admitting a run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Nothing runnable was left after filtering the input.
    #[error("commands array cannot be empty")]
    EmptyCommands,

    /// A pre-built handle was submitted after it had already been started.
    #[error("handle for `{command}` was already started and cannot be queued again")]
    AlreadyStarted {
        /// Command text of the offending handle.
        command: String,
    },
}

/// Errors raised by an [`Executor`](crate::executor::Executor).
#[derive(Debug, Error)]
pub enum ExecError {
    /// The shell could not be spawned.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command that was being started.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the child failed.
    #[error("i/o error while running `{command}`: {source}")]
    Io {
        /// Command that was running.
        command: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The configured shell string could not be split into a program and arguments.
    #[error("invalid shell `{shell}`: {reason}")]
    InvalidShell {
        /// Raw shell string as configured.
        shell: String,
        /// What was wrong with it.
        reason: String,
    },
}

impl ExecError {
    /// Exit code recorded for a command that failed this way.
    pub fn exit_code(&self) -> i32 {
        match self {
            // Same code a shell reports for a command it cannot find.
            ExecError::Spawn { .. } => 127,
            ExecError::Io { .. } | ExecError::InvalidShell { .. } => 1,
        }
    }
}
