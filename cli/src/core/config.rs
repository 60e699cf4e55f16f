//! # Detonator Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module loads, merges and validates the runner configuration. It
//! supports a multi-level approach that combines defaults, user settings and
//! project-specific overrides.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Project-specific `.detonator.toml` in the current directory or ancestors
//! 2. User-specific `config.toml` in the platform config dir (`ProjectDirs`)
//! 3. Default values defined in the code
//!
//! Two sections are recognised:
//! - `[runner]`: streaming snapshot window, post-exit drain bound, working directory.
//! - `[signals]`: the table of signal numbers classified as a manual termination.
//!
//! ## Examples
//!
//! ```toml
//! [runner]
//! initial_output_window_ms = 250
//! working_dir = "~/engagements/acme"
//!
//! [signals]
//! manual_termination = [15, 2]
//! ```
//!
//! ```rust,ignore
//! let cfg = config::load_config()?;
//! let runner = CommandRunner::new(RunnerSettings::from(&cfg));
//! ```
//!
use crate::core::error::{Result, RunnerError};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub signals: SignalsConfig,
}

/// Settings for process launching and output collection.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// How long `run_streaming` collects output before returning its snapshot.
    #[serde(default = "default_initial_output_window_ms")]
    pub initial_output_window_ms: u64,
    /// Upper bound on draining pipes after the child has exited.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    /// Working directory for launched tools (can use ~). Will be expanded.
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Signal classification table.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SignalsConfig {
    /// Signals that mean "the caller cancelled this process".
    #[serde(default = "default_manual_termination")]
    pub manual_termination: Vec<i32>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            initial_output_window_ms: default_initial_output_window_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            working_dir: None,
        }
    }
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            manual_termination: default_manual_termination(),
        }
    }
}

fn default_initial_output_window_ms() -> u64 {
    100
}
fn default_drain_timeout_ms() -> u64 {
    500
}
/// SIGTERM on every POSIX host.
fn default_manual_termination() -> Vec<i32> {
    vec![15]
}

const PROJECT_CONFIG_FILENAME: &str = ".detonator.toml";
const MAX_INITIAL_WINDOW_MS: u64 = 10_000;
const MAX_SIGNAL: i32 = 64;

/// Loads the merged, expanded and validated configuration.
pub fn load_config() -> Result<Config> {
    let user_config = load_user_config()?;
    let project_config = load_project_config()?;
    let mut merged_config = merge_configs(user_config.unwrap_or_default(), project_config);
    expand_config_paths(&mut merged_config).context("Failed to expand paths in configuration")?;
    validate_config(&merged_config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", merged_config);
    Ok(merged_config)
}

fn load_user_config() -> Result<Option<Config>> {
    if let Some(proj_dirs) = ProjectDirs::from("org", "Detonator", "detonator") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<Config>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    if let Some(project_config_path) = find_project_config_path(&current_dir) {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.detonator.toml) found in current directory or ancestors.");
        Ok(None)
    }
}

/// Walks up from `start` looking for `.detonator.toml`, stopping at a `.git` directory.
fn find_project_config_path(start: &Path) -> Option<PathBuf> {
    let mut path = start;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Some(project_config);
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return None;
        }
        path = path.parent()?;
    }
}

pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Project values win whenever they differ from the built-in default.
fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project_cfg = match project {
        Some(p) => p,
        None => return user,
    };
    let mut merged = Config::default();
    merged.runner.initial_output_window_ms =
        if project_cfg.runner.initial_output_window_ms != default_initial_output_window_ms() {
            project_cfg.runner.initial_output_window_ms
        } else {
            user.runner.initial_output_window_ms
        };
    merged.runner.drain_timeout_ms =
        if project_cfg.runner.drain_timeout_ms != default_drain_timeout_ms() {
            project_cfg.runner.drain_timeout_ms
        } else {
            user.runner.drain_timeout_ms
        };
    merged.runner.working_dir = project_cfg.runner.working_dir.or(user.runner.working_dir);
    merged.signals.manual_termination =
        if project_cfg.signals.manual_termination != default_manual_termination() {
            project_cfg.signals.manual_termination
        } else {
            user.signals.manual_termination
        };
    merged
}

fn expand_config_paths(config: &mut Config) -> Result<()> {
    if let Some(dir) = config.runner.working_dir.as_mut() {
        *dir = shellexpand::tilde(dir.as_str()).into_owned();
        debug!("Expanded working directory: {}", dir);
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    info!("Validating final configuration...");
    if config.runner.initial_output_window_ms > MAX_INITIAL_WINDOW_MS {
        return Err(anyhow!(RunnerError::Config(format!(
            "initial_output_window_ms = {} exceeds the maximum of {} ms.",
            config.runner.initial_output_window_ms, MAX_INITIAL_WINDOW_MS
        ))));
    }
    if config.signals.manual_termination.is_empty() {
        return Err(anyhow!(RunnerError::Config(
            "signals.manual_termination must list at least one signal.".to_string()
        )));
    }
    if let Some(bad) = config
        .signals
        .manual_termination
        .iter()
        .find(|s| !(1..=MAX_SIGNAL).contains(*s))
    {
        return Err(anyhow!(RunnerError::Config(format!(
            "Invalid signal number {} in signals.manual_termination (expected 1..={}).",
            bad, MAX_SIGNAL
        ))));
    }
    if let Some(dir) = &config.runner.working_dir {
        let path = Path::new(dir);
        if !path.is_dir() {
            return Err(anyhow!(RunnerError::Config(format!(
                "Configured working directory '{}' does not exist or is not a directory.",
                path.display()
            ))));
        }
    }
    info!("Configuration validation successful.");
    Ok(())
}
