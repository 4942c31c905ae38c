//! Sorted directory traversal shared by fingerprinting, sizing and archiving.
//!
//! Every consumer of a subtree walks it through this module so that they all
//! agree on traversal order (sorted by file name at every level), on how
//! symlinks are treated, and on which files the exclusion sets remove.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// File names and extensions left out of directory fingerprints.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    files: HashSet<String>,
    extensions: HashSet<String>,
}

impl Exclusions {
    /// Build an exclusion set. Extensions are matched case-insensitively and
    /// may be given with or without the leading dot.
    pub fn new<F, E>(files: F, extensions: E) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// No exclusions at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether a file at `path` should be left out.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let by_name = path
            .file_name()
            .map(|n| self.files.contains(n.to_string_lossy().as_ref()))
            .unwrap_or(false);

        by_name
            || path
                .extension()
                .map(|e| self.extensions.contains(&e.to_string_lossy().to_lowercase()))
                .unwrap_or(false)
    }
}

/// One node discovered under a walked root.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Full path to the entry
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes (0 for directories)
    pub size: u64,

    /// Is this a directory?
    pub is_dir: bool,
}

impl TreeEntry {
    /// Create a TreeEntry from a DirEntry.
    /// Symlinks to files are resolved to the target size; symlinks to
    /// directories and broken symlinks return None.
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Option<Self>> {
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        let (size, is_dir) = if entry.path_is_symlink() {
            match std::fs::metadata(&path) {
                Ok(resolved) if resolved.is_file() => (resolved.len(), false),
                _ => return Ok(None),
            }
        } else {
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                (0, true)
            } else if metadata.is_file() {
                (metadata.len(), false)
            } else {
                // sockets, fifos, devices
                return Ok(None);
            }
        };

        Ok(Some(Self {
            path,
            relative_path,
            size,
            is_dir,
        }))
    }

    /// Relative path with `/` separators, independent of the host platform.
    pub fn relative_slash_path(&self) -> String {
        slash_path(&self.relative_path)
    }
}

/// Join path components with `/`.
pub fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk a directory tree and collect every file and subdirectory below
/// `root` (the root itself is not included), sorted by name at every level.
/// Files matched by `exclusions` are left out; directories never are.
pub fn walk_tree(root: &Path, exclusions: &Exclusions) -> std::io::Result<Vec<TreeEntry>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;

        if let Some(info) = TreeEntry::from_entry(&entry, root)? {
            if !info.is_dir && exclusions.is_excluded(&info.path) {
                continue;
            }
            entries.push(info);
        }
    }

    Ok(entries)
}

/// Calculate total size of all files in a directory
pub fn calculate_total_size(root: &Path) -> std::io::Result<u64> {
    Ok(walk_tree(root, &Exclusions::none())?
        .iter()
        .filter(|e| !e.is_dir)
        .map(|e| e.size)
        .sum())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_walk_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let entries = walk_tree(temp_dir.path(), &Exclusions::none())?;
        assert!(entries.is_empty());
        Ok(())
    }

    #[test]
    fn test_walk_is_sorted_and_includes_directories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("b.txt"), b"b")?;
        fs::create_dir(temp_dir.path().join("a"))?;
        fs::write(temp_dir.path().join("a/inner.txt"), b"inner")?;

        let entries = walk_tree(temp_dir.path(), &Exclusions::none())?;
        let paths: Vec<String> = entries.iter().map(|e| e.relative_slash_path()).collect();
        assert_eq!(paths, vec!["a", "a/inner.txt", "b.txt"]);
        assert!(entries[0].is_dir);

        Ok(())
    }

    #[test]
    fn test_calculate_total_size() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("file1.txt"), b"12345")?; // 5 bytes
        fs::create_dir(temp_dir.path().join("sub"))?;
        fs::write(temp_dir.path().join("sub/file2.txt"), b"1234567")?; // 7 bytes

        assert_eq!(calculate_total_size(temp_dir.path())?, 12);

        Ok(())
    }

    #[test]
    fn test_exclusions_by_name_and_extension() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::write(temp_dir.path().join("file.txt"), b"keep")?;
        fs::write(temp_dir.path().join(".DS_Store"), b"exclude")?;
        fs::write(temp_dir.path().join("scratch.TMP"), b"exclude")?;

        let exclusions = Exclusions::new([".DS_Store"], [".tmp"]);
        let entries = walk_tree(temp_dir.path(), &exclusions)?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].relative_slash_path(), "file.txt");

        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_broken_symlink_is_skipped() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        std::os::unix::fs::symlink(
            temp_dir.path().join("missing"),
            temp_dir.path().join("dangling"),
        )?;

        let entries = walk_tree(temp_dir.path(), &Exclusions::none())?;
        assert!(entries.is_empty());

        Ok(())
    }
}
