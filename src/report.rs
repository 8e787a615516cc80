//! JSON summary of a finished run.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::output::sanitize_text;
use crate::runner::RunOutcome;

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub bundles: Vec<BundleReport>,
}

#[derive(Debug, Serialize)]
pub struct BundleReport {
    pub name: String,
    pub commands: Vec<CommandReport>,
}

#[derive(Debug, Serialize)]
pub struct CommandReport {
    pub index: usize,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    pub success: bool,
    pub output: Vec<String>,
}

impl RunReport {
    pub fn from_outcome(outcome: &RunOutcome) -> Self {
        let state = &outcome.state;
        let bundles = outcome
            .bundles
            .iter()
            .map(|bundle| BundleReport {
                name: bundle.key().to_string(),
                commands: bundle
                    .handles()
                    .iter()
                    .map(|handle| {
                        let exit_code = handle
                            .exit_code()
                            .unwrap_or_else(|| state.exit_code_for(handle.command()));
                        CommandReport {
                            index: handle.index(),
                            command: handle.command().to_string(),
                            pid: handle.pid(),
                            exit_code,
                            signal: handle.signal(),
                            success: state.successful().contains(&handle.index()),
                            output: state
                                .output_for(handle.command())
                                .map(|history| {
                                    history.lines().map(|line| sanitize_text(line, true)).collect()
                                })
                                .unwrap_or_default(),
                        }
                    })
                    .collect(),
            })
            .collect();
        Self {
            total: state.queued().len(),
            succeeded: state.successful().len(),
            failed: state.errors().len(),
            bundles,
        }
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        writer.flush()?;
        Ok(())
    }
}
