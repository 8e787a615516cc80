//! Bundles: ordered chains of commands that run one after another.

use tracing::warn;

use crate::error::RunError;
use crate::process::ProcessHandle;

/// Raw value submitted for one bundle key.
#[derive(Debug, Clone)]
pub enum BundleInput {
    /// Shell commands, in execution order.
    Commands(Vec<String>),
    /// Handles built by the caller. They must still be queued.
    Handles(Vec<ProcessHandle>),
    /// Anything that was not a list where the input was read. Filtered out.
    Invalid,
}

impl From<Vec<String>> for BundleInput {
    fn from(commands: Vec<String>) -> Self {
        BundleInput::Commands(commands)
    }
}

impl From<Vec<&str>> for BundleInput {
    fn from(commands: Vec<&str>) -> Self {
        BundleInput::Commands(commands.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<ProcessHandle>> for BundleInput {
    fn from(handles: Vec<ProcessHandle>) -> Self {
        BundleInput::Handles(handles)
    }
}

/// A named, ordered sequence of handles.
#[derive(Debug, Clone)]
pub struct Bundle {
    key: String,
    handles: Vec<ProcessHandle>,
}

impl Bundle {
    /// Label the bundle was submitted under.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn handles(&self) -> &[ProcessHandle] {
        &self.handles
    }

    pub fn get(&self, position: usize) -> Option<&ProcessHandle> {
        self.handles.get(position)
    }

    pub(crate) fn get_mut(&mut self, position: usize) -> Option<&mut ProcessHandle> {
        self.handles.get_mut(position)
    }

    /// Whether every handle in the bundle has exited.
    pub fn is_complete(&self) -> bool {
        self.handles.iter().all(ProcessHandle::is_exited)
    }
}

/// Builds bundles from caller input.
///
/// Invalid entries, blank commands and bundles left empty are dropped.
/// Handles get a global index: bundles in declaration order, then steps in
/// declaration order.
pub fn build_bundles<I, K>(input: I) -> Result<Vec<Bundle>, RunError>
where
    I: IntoIterator<Item = (K, BundleInput)>,
    K: Into<String>,
{
    let mut bundles = Vec::new();
    let mut next_index = 0;
    for (key, value) in input {
        let key = key.into();
        let mut handles = match value {
            BundleInput::Commands(commands) => commands
                .into_iter()
                .filter(|command| !command.trim().is_empty())
                .map(ProcessHandle::new)
                .collect::<Vec<_>>(),
            BundleInput::Handles(handles) => {
                if let Some(started) = handles.iter().find(|h| !h.is_queued()) {
                    return Err(RunError::AlreadyStarted {
                        command: started.command().to_string(),
                    });
                }
                handles
                    .into_iter()
                    .filter(|handle| !handle.command().trim().is_empty())
                    .collect()
            }
            BundleInput::Invalid => {
                warn!(bundle = %key, "ignoring bundle that is not a list of commands");
                continue;
            }
        };
        if handles.is_empty() {
            warn!(bundle = %key, "ignoring bundle without commands");
            continue;
        }
        for handle in &mut handles {
            handle.assign_index(next_index);
            next_index += 1;
        }
        bundles.push(Bundle { key, handles });
    }
    if bundles.is_empty() {
        return Err(RunError::EmptyCommands);
    }
    Ok(bundles)
}
