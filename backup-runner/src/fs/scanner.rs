//! Inventory of the immediate children of a backup source.

use crate::utils::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Classification of a source child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
    /// Broken symlinks, sockets, FIFOs, devices.
    Other,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ItemKind::File => "file",
            ItemKind::Directory => "directory",
            ItemKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// A source child with its kind and recursive byte size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub name: String,
    pub kind: ItemKind,
    pub size_bytes: u64,
}

/// Names of the immediate children of a source, split by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    pub files: Vec<String>,
    pub directories: Vec<String>,
    pub others: Vec<String>,
}

impl Inventory {
    pub fn len(&self) -> usize {
        self.files.len() + self.directories.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All names paired with their kind.
    pub fn items(&self) -> impl Iterator<Item = (&str, ItemKind)> {
        self.files
            .iter()
            .map(|n| (n.as_str(), ItemKind::File))
            .chain(self.directories.iter().map(|n| (n.as_str(), ItemKind::Directory)))
            .chain(self.others.iter().map(|n| (n.as_str(), ItemKind::Other)))
    }
}

/// Classify a single path. Symlinks are classified by their target.
pub fn classify(path: &Path) -> ItemKind {
    match fs::metadata(path) {
        Ok(m) if m.is_file() => ItemKind::File,
        Ok(m) if m.is_dir() => ItemKind::Directory,
        _ => ItemKind::Other,
    }
}

/// List the immediate children of `source` (non-recursive), sorted by name.
pub fn scan(source: &Path) -> Result<Inventory> {
    if !source.is_dir() {
        return Err(EngineError::NotFound(source.to_path_buf()));
    }

    let mut entries: Vec<(String, PathBuf)> = fs::read_dir(source)?
        .map(|entry| entry.map(|e| (e.file_name().to_string_lossy().into_owned(), e.path())))
        .collect::<std::io::Result<_>>()?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut inventory = Inventory::default();
    for (name, path) in entries {
        match classify(&path) {
            ItemKind::File => inventory.files.push(name),
            ItemKind::Directory => inventory.directories.push(name),
            ItemKind::Other => {
                tracing::warn!("Neither file nor directory: {}", path.display());
                inventory.others.push(name);
            }
        }
    }

    Ok(inventory)
}
