//! Backup instruction list.
//!
//! Instructions live in a TOML file of `[[instruction]]` tables:
//!
//! ```toml
//! [[instruction]]
//! source = "/home/me/Documents"
//! destination = "/mnt/backup/documents"
//! strategy = "full"
//! activate = true
//! shutdown = false
//! ```
//!
//! A missing or malformed file yields an empty list: nothing is backed up.

use crate::utils::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Whether every item is transferred, or only those the partial policy picks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Full,
    Partial,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Full => f.write_str("full"),
            Strategy::Partial => f.write_str("partial"),
        }
    }
}

/// One backup job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub source: PathBuf,
    pub destination: PathBuf,

    #[serde(default)]
    pub strategy: Strategy,

    #[serde(default = "default_activate")]
    pub activate: bool,

    /// Ask for a power-off once all jobs are done
    #[serde(default)]
    pub shutdown: bool,
}

fn default_activate() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InstructionFile {
    #[serde(default, rename = "instruction")]
    instructions: Vec<Instruction>,
}

/// Parse instruction rows from TOML text.
pub fn parse(content: &str) -> Result<Vec<Instruction>> {
    let file: InstructionFile =
        toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
    Ok(file.instructions)
}

/// Load instruction rows, treating a missing or malformed file as empty.
pub fn load(path: &Path) -> Vec<Instruction> {
    tracing::debug!("Reading instructions from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Instruction file could not be read ({}): {}", path.display(), e);
            return Vec::new();
        }
    };

    match parse(&content) {
        Ok(instructions) => {
            tracing::debug!("Loaded {} instruction(s)", instructions.len());
            instructions
        }
        Err(e) => {
            tracing::warn!("Instruction file is malformed ({}): {}", path.display(), e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_rows_with_defaults() {
        let rows = parse(
            r#"
            [[instruction]]
            source = "/data/a"
            destination = "/backup/a"
            strategy = "partial"
            activate = false
            shutdown = true

            [[instruction]]
            source = "/data/b"
            destination = "/backup/b"
            "#,
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].strategy, Strategy::Partial);
        assert!(!rows[0].activate);
        assert!(rows[0].shutdown);
        assert_eq!(rows[1].strategy, Strategy::Full);
        assert!(rows[1].activate);
        assert!(!rows[1].shutdown);
    }

    #[test]
    fn test_unknown_strategy_is_config_error() {
        let result = parse(
            r#"
            [[instruction]]
            source = "/data/a"
            destination = "/backup/a"
            strategy = "mirror"
            "#,
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_load_missing_or_malformed_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load(&temp_dir.path().join("missing.toml")).is_empty());

        let broken = temp_dir.path().join("broken.toml");
        std::fs::write(&broken, "[[instruction]\nsource =").unwrap();
        assert!(load(&broken).is_empty());
    }

    #[test]
    fn test_empty_file_has_no_rows() {
        assert!(parse("").unwrap().is_empty());
    }
}
