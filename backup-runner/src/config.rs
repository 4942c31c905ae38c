//! Configuration management for the backup runner.
//!
//! Loads configuration from a TOML file; every section falls back to defaults.

use crate::fingerprint::HashAlgorithm;
use crate::fs::Exclusions;
use crate::transfer::TransferMethod;
use crate::utils::EngineError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub instructions: InstructionsConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Snapshot folders kept per destination, the new one included
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,

    /// Fingerprint algorithm (md5, sha1, sha256)
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,

    /// How directories are written (none, zip, system_archive)
    #[serde(default)]
    pub directory_method: TransferMethod,

    /// File names left out of directory fingerprints
    #[serde(default = "default_excluded_files")]
    pub excluded_files: Vec<String>,

    /// Extensions left out of directory fingerprints
    #[serde(default = "default_excluded_extensions")]
    pub excluded_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionsConfig {
    /// TOML file holding `[[instruction]]` rows
    #[serde(default = "default_instructions_file")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for per-run log files (empty = stdout only)
    #[serde(default = "default_log_dir")]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownConfig {
    /// Seconds to wait before powering off
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,

    /// Power-off command and its arguments
    #[serde(default = "default_shutdown_command")]
    pub command: Vec<String>,
}

// Default values
fn default_max_snapshots() -> usize {
    5
}

fn default_hash_algorithm() -> String {
    "md5".to_string()
}

fn default_excluded_files() -> Vec<String> {
    vec![
        ".DS_Store".to_string(),
        "Thumbs.db".to_string(),
        "desktop.ini".to_string(),
    ]
}

fn default_excluded_extensions() -> Vec<String> {
    vec!["tmp".to_string(), "swp".to_string()]
}

fn default_instructions_file() -> PathBuf {
    PathBuf::from("data/backup_instructions.toml")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> Option<PathBuf> {
    Some(PathBuf::from("logs_backup_tool"))
}

fn default_countdown_secs() -> u64 {
    60
}

fn default_shutdown_command() -> Vec<String> {
    vec!["shutdown".to_string(), "-h".to_string(), "now".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_snapshots: default_max_snapshots(),
            hash_algorithm: default_hash_algorithm(),
            directory_method: TransferMethod::default(),
            excluded_files: default_excluded_files(),
            excluded_extensions: default_excluded_extensions(),
        }
    }
}

impl Default for InstructionsConfig {
    fn default() -> Self {
        Self {
            file: default_instructions_file(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            countdown_secs: default_countdown_secs(),
            command: default_shutdown_command(),
        }
    }
}

impl EngineConfig {
    /// Parsed fingerprint algorithm.
    pub fn algorithm(&self) -> Result<HashAlgorithm, EngineError> {
        self.hash_algorithm.parse()
    }

    pub fn exclusions(&self) -> Exclusions {
        Exclusions::new(self.excluded_files.iter().cloned(), &self.excluded_extensions)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default() -> Self {
        Config {
            engine: EngineConfig::default(),
            instructions: InstructionsConfig::default(),
            log: LogConfig::default(),
            shutdown: ShutdownConfig::default(),
        }
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.engine.max_snapshots == 0 {
            return Err(EngineError::Config(
                "engine.max_snapshots must be at least 1".to_string(),
            ));
        }
        self.engine.algorithm()?;
        if self.shutdown.command.is_empty() {
            return Err(EngineError::Config(
                "shutdown.command must name a program".to_string(),
            ));
        }
        Ok(())
    }
}
