//! Backup Runner Library
//!
//! Dated, manifest-tracked snapshot backups with fingerprinting, size-ordered
//! transfer, zip compression and retention pruning.

pub mod config;
pub mod daemon;
pub mod executor;
pub mod fingerprint;
pub mod fs;
pub mod instructions;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupExecutor, EngineSettings, RunSummary};
pub use instructions::{Instruction, Strategy};
pub use utils::errors::EngineError;
pub type Result<T> = std::result::Result<T, EngineError>;
