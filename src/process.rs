//! Data structures for tracking process state.
//!
//! A `ProcessHandle` is one execution of one command. It is created queued,
//! becomes running when started, and exits exactly once. Handles are never
//! reused.

use crate::events::Slot;
use crate::runner::Launcher;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, on platforms that report one.
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Numeric exit code used for bookkeeping. A process without a code
    /// (killed by a signal) counts as a generic failure.
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }

    pub fn success(&self) -> bool {
        self.exit_code() == 0
    }
}

impl From<std::process::ExitStatus> for ProcessExit {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;
        Self {
            code: status.code(),
            signal,
        }
    }
}

/// The current lifecycle status of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Admitted to a run but not started yet.
    Queued,
    /// Started and not yet exited.
    Running,
    /// Exited; terminal.
    Exited(ProcessExit),
}

/// One queued, running, or finished execution of a command.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    index: usize,
    command: String,
    pid: Option<u32>,
    status: ProcessStatus,
}

impl ProcessHandle {
    /// Creates a queued handle. Its index is assigned when a run admits it.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            index: 0,
            command: command.into(),
            pid: None,
            status: ProcessStatus::Queued,
        }
    }

    pub(crate) fn assign_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Sequence index within the run.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// OS process id, once the process has been spawned.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn is_queued(&self) -> bool {
        self.status == ProcessStatus::Queued
    }

    pub fn is_running(&self) -> bool {
        self.status == ProcessStatus::Running
    }

    pub fn is_exited(&self) -> bool {
        matches!(self.status, ProcessStatus::Exited(_))
    }

    /// Exit code, unset until the process has exited.
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            ProcessStatus::Exited(exit) => Some(exit.exit_code()),
            _ => None,
        }
    }

    /// Terminating signal, if the process was killed by one.
    pub fn signal(&self) -> Option<i32> {
        match self.status {
            ProcessStatus::Exited(exit) => exit.signal,
            _ => None,
        }
    }

    /// Starts the handle through `launcher`.
    ///
    /// Returns `false` without launching anything when the handle is running
    /// or has already exited.
    pub fn start(&mut self, slot: Slot, launcher: &Launcher) -> bool {
        if !self.is_queued() {
            return false;
        }
        self.status = ProcessStatus::Running;
        launcher.launch(slot, self.command.clone());
        true
    }

    pub(crate) fn set_pid(&mut self, pid: u32) {
        self.pid = Some(pid);
    }

    /// Records the exit. Returns `false` if the handle was not running, in
    /// which case nothing changes.
    pub(crate) fn mark_exited(&mut self, exit: ProcessExit) -> bool {
        if !self.is_running() {
            return false;
        }
        self.status = ProcessStatus::Exited(exit);
        true
    }
}
