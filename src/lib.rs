//! stackup: local environment setup in parallel bundles.
//!
//! A run takes named bundles of shell commands. Bundles run concurrently and
//! the commands of one bundle run strictly in order. This library exposes the
//! runner and its building blocks; the `stackup` binary wraps them in a CLI.

pub mod bundle;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod output;
pub mod process;
pub mod progress;
pub mod report;
pub mod runner;

pub use bundle::{build_bundles, Bundle, BundleInput};
pub use error::{ExecError, RunError};
pub use executor::{Executor, ShellConfig, ShellExecutor};
pub use process::ProcessHandle;
pub use runner::{ParallelRunner, RunOutcome, RunState};
