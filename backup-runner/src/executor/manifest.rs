//! Run manifest: what one backup run transferred, and how long it took.
//!
//! A manifest is serialized as `backup_information_<timestamp>.json` in each
//! snapshot folder. It is written once and only ever read back afterwards,
//! by later runs looking for the prior state of a destination.

use crate::fs::ItemKind;
use crate::instructions::Strategy;
use crate::utils::{EngineError, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Prefix of every manifest file name.
pub const MANIFEST_MARKER: &str = "backup_information";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub start_time: DateTime<Local>,
    pub end_time: DateTime<Local>,
    pub duration_ms: u64,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    #[serde(default)]
    pub strategy: Strategy,
    /// Transferred files, in ascending-size transfer order
    pub files: Vec<ManifestEntry>,
    /// Transferred directories, in ascending-size transfer order
    pub folders: Vec<ManifestEntry>,
    /// Items that could not be fingerprinted or transferred
    #[serde(default)]
    pub failed: Vec<ManifestEntry>,
}

/// Metadata for a single top-level item of the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub item_name: String,
    pub item_type: ItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub size_bytes: u64,
    pub transfer_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ManifestEntry {
    pub fn transferred(
        item_name: impl Into<String>,
        item_type: ItemKind,
        hash: String,
        size_bytes: u64,
        transfer_duration_ms: u64,
    ) -> Self {
        Self {
            item_name: item_name.into(),
            item_type,
            hash: Some(hash),
            size_bytes,
            transfer_duration_ms,
            error: None,
        }
    }

    pub fn failed(
        item_name: impl Into<String>,
        item_type: ItemKind,
        size_bytes: u64,
        error: &EngineError,
    ) -> Self {
        Self {
            item_name: item_name.into(),
            item_type,
            hash: None,
            size_bytes,
            transfer_duration_ms: 0,
            error: Some(error.to_string()),
        }
    }
}

impl Manifest {
    /// Empty manifest for a run starting at `start_time`.
    pub fn begin(
        start_time: DateTime<Local>,
        source_path: &Path,
        destination_path: &Path,
        strategy: Strategy,
    ) -> Self {
        Self {
            start_time,
            end_time: start_time,
            duration_ms: 0,
            source_path: source_path.to_path_buf(),
            destination_path: destination_path.to_path_buf(),
            strategy,
            files: Vec::new(),
            folders: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Route a transferred entry into `files` or `folders` by its type.
    pub fn record(&mut self, entry: ManifestEntry) {
        match entry.item_type {
            ItemKind::File => self.files.push(entry),
            ItemKind::Directory => self.folders.push(entry),
            ItemKind::Other => self.failed.push(entry),
        }
    }

    pub fn record_failure(&mut self, entry: ManifestEntry) {
        self.failed.push(entry);
    }

    /// Stamp the end of the run.
    pub fn finish(&mut self, end_time: DateTime<Local>) {
        self.end_time = end_time;
        self.duration_ms = (end_time - self.start_time).num_milliseconds().max(0) as u64;
    }

    /// Bytes of every transferred item.
    pub fn transferred_bytes(&self) -> u64 {
        self.files
            .iter()
            .chain(self.folders.iter())
            .map(|e| e.size_bytes)
            .sum()
    }
}

/// Manifest file name for a run finishing at `at`.
pub fn manifest_file_name(at: DateTime<Local>) -> String {
    format!("{}_{}.json", MANIFEST_MARKER, at.format("%Y%m%d_%H%M%S_%3f"))
}

/// Serialize `manifest` into `folder`. Fails if the file already exists.
pub fn write(folder: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = folder.join(manifest_file_name(manifest.end_time));

    let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest)?;
    writer.flush()?;

    Ok(path)
}

/// Parse a manifest file.
pub fn read(path: &Path) -> Result<Manifest> {
    let content = fs::read(path)?;
    serde_json::from_slice(&content).map_err(|source| EngineError::CorruptManifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Whether `file_name` has the `backup_information_<stamp>.json` shape.
pub fn is_manifest_name(file_name: &str) -> bool {
    file_name
        .strip_prefix(MANIFEST_MARKER)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(".json"))
        .is_some_and(|stamp| !stamp.is_empty())
}

/// Manifest-named files in `folder`, newest name first.
///
/// Source items are copied next to the manifest, so a candidate may still
/// turn out to be a user file; callers should fall through to the next one.
pub fn find_in(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| is_manifest_name(&e.file_name().to_string_lossy()))
        .map(|e| e.path())
        .collect();

    candidates.sort_by(|a, b| b.cmp(a));
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_manifest() -> Manifest {
        let start = Local.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap();
        let mut manifest = Manifest::begin(
            start,
            Path::new("/data/documents"),
            Path::new("/backup/2024-05-01_backup_000"),
            Strategy::Full,
        );
        manifest.record(ManifestEntry::transferred(
            "todo.txt",
            ItemKind::File,
            "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            10,
            1,
        ));
        manifest.record(ManifestEntry::transferred(
            "photos",
            ItemKind::Directory,
            "9e107d9d372bb6826bd81d3542a419d6".to_string(),
            4096,
            35,
        ));
        manifest.record_failure(ManifestEntry::failed(
            "fifo",
            ItemKind::Other,
            0,
            &EngineError::InvalidPath(PathBuf::from("/data/documents/fifo")),
        ));
        manifest.finish(start + chrono::Duration::milliseconds(1500));
        manifest
    }

    #[test]
    fn test_write_then_read_round_trip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let manifest = sample_manifest();

        let path = write(temp_dir.path(), &manifest)?;
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            "backup_information_20240501_220001_500.json"
        );
        assert_eq!(read(&path)?, manifest);

        Ok(())
    }

    #[test]
    fn test_write_is_write_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let manifest = sample_manifest();

        write(temp_dir.path(), &manifest)?;
        assert!(matches!(write(temp_dir.path(), &manifest), Err(EngineError::Io(_))));

        Ok(())
    }

    #[test]
    fn test_finish_computes_duration() {
        let manifest = sample_manifest();
        assert_eq!(manifest.duration_ms, 1500);
        assert_eq!(manifest.transferred_bytes(), 4106);
    }

    #[test]
    fn test_corrupt_manifest() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("backup_information_broken.json");
        fs::write(&path, b"{ \"start_time\": ")?;

        assert!(matches!(read(&path), Err(EngineError::CorruptManifest { .. })));

        Ok(())
    }

    #[test]
    fn test_field_names_are_stable() -> Result<()> {
        let json = serde_json::to_value(sample_manifest())?;
        for key in [
            "start_time",
            "end_time",
            "duration_ms",
            "source_path",
            "destination_path",
            "files",
            "folders",
        ] {
            assert!(json.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(json["files"][0]["item_type"], "file");
        assert_eq!(json["folders"][0]["item_type"], "directory");
        assert!(json["files"][0].get("error").is_none());

        Ok(())
    }

    #[test]
    fn test_find_in_matches_manifest_names_only() -> Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("notes.txt"), b"x")?;
        fs::write(temp_dir.path().join("backup_information.txt"), b"x")?;
        fs::write(temp_dir.path().join("backup_information_.json"), b"x")?;
        assert!(find_in(temp_dir.path())?.is_empty());

        fs::write(temp_dir.path().join("backup_information_20240501.json"), b"{}")?;
        fs::write(temp_dir.path().join("backup_information_20240502.json"), b"{}")?;
        assert_eq!(
            find_in(temp_dir.path())?,
            vec![
                temp_dir.path().join("backup_information_20240502.json"),
                temp_dir.path().join("backup_information_20240501.json"),
            ]
        );

        Ok(())
    }

    #[test]
    fn test_is_manifest_name() {
        assert!(is_manifest_name("backup_information_20240501_220001_500.json"));
        assert!(!is_manifest_name("backup_information.json"));
        assert!(!is_manifest_name("backup_information_20240501.json.bak"));
        assert!(!is_manifest_name("old_backup_information_20240501.json"));
    }
}
