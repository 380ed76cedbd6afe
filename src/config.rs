//! Configuration loading.
//!
//! # Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Built-in defaults
//! 2. Config file: `--config` / `HERALD_CONFIG`, else `./herald.toml` if present
//! 3. CLI flags and their environment variables
//! 4. `TOKEN` as a last resort for the GitHub token
//!
//! # Example Config
//!
//! ```toml
//! manifests = "deploy/comments"
//! state_file = ".herald/state.json"
//! target = "octo/hello-world#42"
//!
//! [github]
//! api_base = "https://api.github.com"
//!
//! [controller]
//! workers = 2
//! base_delay_ms = 5000
//! max_delay_ms = 60000
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use herald_github::IssueRef;
use herald_reconciler::ControllerConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::cli::Cli;

/// Looked up in the working directory when no config path is given.
pub const DEFAULT_CONFIG_FILE: &str = "herald.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub manifests: PathBuf,
    pub state_file: Option<PathBuf>,
    pub target: Option<IssueRef>,
    pub dry_run: bool,
    pub log_level: String,
    pub github: GithubConfig,
    pub controller: ControllerSection,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    /// Unset means the public API.
    pub api_base: Option<Url>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerSection {
    pub workers: usize,
    pub resync_secs: u64,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub watch_debounce_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifests: PathBuf::from("manifests"),
            state_file: None,
            target: None,
            dry_run: false,
            log_level: "info".to_string(),
            github: GithubConfig::default(),
            controller: ControllerSection::default(),
        }
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_base", &self.api_base.as_ref().map(Url::as_str))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            workers: 1,
            resync_secs: 30,
            base_delay_ms: 5_000,
            max_delay_ms: 60_000,
            call_timeout_secs: 30,
            watch_debounce_ms: 250,
        }
    }
}

/// Load, override, and validate configuration for one run.
///
/// # Errors
///
/// Returns error if:
/// - An explicitly named config file is missing or unreadable
/// - A config file is malformed TOML
/// - The merged values fail validation
pub fn resolve(cli: &Cli, token_fallback: Option<String>) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => load_toml_file(path)?,
        None => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                load_toml_file(path)?
            } else {
                Config::default()
            }
        }
    };

    config.apply_cli(cli);
    if config.github.token.is_none() {
        config.github.token = token_fallback.filter(|t| !t.is_empty());
    }
    config.validate()?;
    Ok(config)
}

/// Load a TOML file, filling unset fields with defaults.
///
/// # Errors
///
/// Returns error if the file cannot be read or is malformed.
pub fn load_toml_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

impl Config {
    /// Overlay every flag that was given.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(manifests) = &cli.manifests {
            self.manifests.clone_from(manifests);
        }
        if let Some(state_file) = &cli.state_file {
            self.state_file = Some(state_file.clone());
        }
        if let Some(target) = &cli.target {
            self.target = Some(target.clone());
        }
        if let Some(token) = cli.token.as_ref().filter(|t| !t.is_empty()) {
            self.github.token = Some(token.clone());
        }
        if let Some(api_base) = &cli.api_base {
            self.github.api_base = Some(api_base.clone());
        }
        if let Some(level) = &cli.log_level {
            self.log_level.clone_from(level);
        }
        self.dry_run |= cli.dry_run;

        let controller = &mut self.controller;
        controller.workers = cli.workers.unwrap_or(controller.workers);
        controller.resync_secs = cli.resync_secs.unwrap_or(controller.resync_secs);
        controller.base_delay_ms = cli.base_delay_ms.unwrap_or(controller.base_delay_ms);
        controller.max_delay_ms = cli.max_delay_ms.unwrap_or(controller.max_delay_ms);
        controller.call_timeout_secs = cli
            .call_timeout_secs
            .unwrap_or(controller.call_timeout_secs);
    }

    /// # Errors
    ///
    /// Returns error if the target is missing, a token is missing outside
    /// dry-run mode, or the controller settings are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.target.is_none() {
            return Err(ConfigError::Invalid(
                "target issue is required (--target owner/repo#number)".to_string(),
            ));
        }
        if !self.dry_run && self.github.token.is_none() {
            return Err(ConfigError::Invalid(
                "a GitHub token is required unless --dry-run is set (--token, GITHUB_TOKEN or TOKEN)"
                    .to_string(),
            ));
        }
        self.controller_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub const fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.controller.workers,
            base_delay: Duration::from_millis(self.controller.base_delay_ms),
            max_delay: Duration::from_millis(self.controller.max_delay_ms),
            call_timeout: Duration::from_secs(self.controller.call_timeout_secs),
        }
    }

    pub const fn resync_period(&self) -> Duration {
        Duration::from_secs(self.controller.resync_secs)
    }

    pub const fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.controller.watch_debounce_ms)
    }
}
