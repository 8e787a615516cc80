//! Event definitions for the runner's coordination loop.
//!
//! Worker tasks never touch run state. They describe what happened to their
//! child process with an `Event`, and the coordinator applies it.

use crate::output::StreamKind;
use crate::process::ProcessExit;

/// Position of a handle inside a run: which bundle, and which step of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot {
    pub bundle: usize,
    pub position: usize,
}

impl Slot {
    pub fn new(bundle: usize, position: usize) -> Self {
        Self { bundle, position }
    }

    /// The following step in the same bundle.
    pub fn next(self) -> Self {
        Self {
            bundle: self.bundle,
            position: self.position + 1,
        }
    }
}

/// Represents an event in the runner's coordination loop.
#[derive(Debug, Clone)]
pub enum Event {
    /// A process has been spawned by the OS.
    ProcessStarted { slot: Slot, pid: u32 },
    /// A chunk of output (stdout or stderr) was received from a process.
    ProcessOutput {
        slot: Slot,
        text: String,
        stream: StreamKind,
    },
    /// A process exited.
    ProcessExited { slot: Slot, exit: ProcessExit },
    /// A process could not be run to completion (spawn failure, worker panic).
    ProcessFailed {
        slot: Slot,
        error: String,
        exit_code: i32,
    },
}
