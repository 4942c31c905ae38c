//! Item transfer into a snapshot folder.

pub mod archive;

pub use archive::{transfer, with_zip_extension, TransferOutcome};

use serde::{Deserialize, Serialize};
use std::fmt;

/// How directory items are written into a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferMethod {
    /// Plain recursive copy
    None,
    /// Deflate archive with entries nested under the directory's own name
    Zip,
    /// Deflate archive with entries rooted at the directory itself
    #[default]
    SystemArchive,
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransferMethod::None => "none",
            TransferMethod::Zip => "zip",
            TransferMethod::SystemArchive => "system_archive",
        };
        f.write_str(label)
    }
}
