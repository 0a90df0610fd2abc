//! Agent configuration.
//!
//! The full configuration surface (CLI parsing, layered precedence,
//! daemonisation) belongs to the binaries that embed this crate. What lives
//! here is the document the engine itself consumes: where modules and their
//! configs are found, where the spool lives, how many workers run, and how
//! the agent logs.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use strum::{Display, EnumString};
use thiserror::Error;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default number of concurrent action workers.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Supported logging output formats.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    #[default]
    Json,
    /// Human-readable single line output.
    Compact,
}

/// Errors raised while loading the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not a valid configuration document.
    #[error("failed to parse configuration file '{path}': {source}")]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration consumed by the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Directory scanned for external module executables.
    pub modules_dir: Option<PathBuf>,
    /// Directory holding per-module `<name>.json` configuration files.
    pub modules_config_dir: Option<PathBuf>,
    /// Spool root for non-blocking results directories.
    pub spool_dir: PathBuf,
    /// Maximum number of concurrent action workers.
    pub max_workers: usize,
    /// Log filter expression (tracing `EnvFilter` syntax).
    pub log_filter: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            modules_dir: None,
            modules_config_dir: None,
            spool_dir: default_spool_dir(),
            max_workers: DEFAULT_MAX_WORKERS,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
            log_format: LogFormat::default(),
        }
    }
}

impl AgentConfig {
    /// Loads the configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read or parsed.
    /// Unknown fields are tolerated; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Computes the default spool directory.
///
/// The spool prefers the user runtime directory; when none is available it
/// falls back to a uid-namespaced directory under the temp dir so agents of
/// different users never share a spool.
#[must_use]
pub fn default_spool_dir() -> PathBuf {
    spool_base_directory().join("spool")
}

#[cfg(unix)]
fn spool_base_directory() -> PathBuf {
    if let Some(mut dir) = runtime_dir() {
        dir.push("tether");
        return dir;
    }
    let mut dir = env::temp_dir();
    dir.push("tether");
    dir.push(format!("uid-{}", unsafe { geteuid() }));
    dir
}

#[cfg(not(unix))]
fn spool_base_directory() -> PathBuf {
    let mut dir = env::temp_dir();
    dir.push("tether");
    dir
}
