//! Configuration management for stackup.
//!
//! This module defines the structure of the `stackup.toml` configuration file
//! and provides functionality to load and parse it.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use crate::bundle::BundleInput;

/// Top-level configuration structure corresponding to `stackup.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Print per-command detail instead of a progress bar (default: false).
    pub verbose: Option<bool>,
    /// Shell override, e.g. "bash -lc".
    pub shell: Option<String>,
    /// Working directory for every command.
    pub cwd: Option<String>,
    /// Path of the JSON report written after the run.
    pub report: Option<String>,
    /// Log filter used when no environment filter is set (e.g. "info").
    pub log_level: Option<String>,
    /// Commands run one by one before the bundles; a failure aborts.
    #[serde(default)]
    pub before: Vec<String>,
    /// Environment variables set for every command.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Bundle name to list of commands, in file order.
    #[serde(default)]
    pub bundles: toml::Table,
}

impl Config {
    /// Bundle inputs in declaration order.
    ///
    /// Values that are not arrays become [`BundleInput::Invalid`] and are
    /// dropped by the bundle builder. Non-string array items are skipped.
    pub fn bundle_inputs(&self) -> Vec<(String, BundleInput)> {
        self.bundles
            .iter()
            .map(|(name, value)| (name.clone(), bundle_input(name, value)))
            .collect()
    }
}

fn bundle_input(name: &str, value: &toml::Value) -> BundleInput {
    let toml::Value::Array(items) = value else {
        return BundleInput::Invalid;
    };
    let commands = items
        .iter()
        .filter_map(|item| match item {
            toml::Value::String(command) => Some(command.clone()),
            other => {
                warn!(bundle = name, value = %other, "skipping non-string command");
                None
            }
        })
        .collect();
    BundleInput::Commands(commands)
}

/// Loads and parses the configuration from a file path.
pub fn load_config(path: &Path) -> Result<Config> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: Config = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(config)
}
