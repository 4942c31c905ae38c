//! Snapshot retention for a destination root.
//!
//! Snapshot folders are named `<YYYY-MM-DD>_backup_<index:03>`, so sorting
//! names lexicographically sorts them chronologically. Retention runs before
//! the new snapshot of a run is created: with a cap of `max_snapshots` it
//! leaves at most `max_snapshots - 1` existing folders, making room for the
//! one about to be written.

use super::manifest::{self, Manifest};
use crate::utils::Result;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory names containing this marker are treated as snapshots.
pub const SNAPSHOT_MARKER: &str = "backup";

/// Snapshot folder name for instruction `index` on `date`.
pub fn snapshot_name(date: NaiveDate, index: usize) -> String {
    format!("{}_{}_{:03}", date.format("%Y-%m-%d"), SNAPSHOT_MARKER, index)
}

/// Result of a prune pass.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    /// Surviving snapshots, newest first
    pub kept: Vec<PathBuf>,

    /// Snapshots deleted from disk, newest first
    pub removed: Vec<PathBuf>,
}

/// Snapshot folders under `root`, newest first. A missing root has none.
pub fn list_snapshots(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut snapshots: Vec<(String, PathBuf)> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(name, _)| name.contains(SNAPSHOT_MARKER))
        .collect();

    snapshots.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(snapshots.into_iter().map(|(_, path)| path).collect())
}

/// Delete the oldest snapshots until fewer than `max_snapshots` remain.
///
/// A folder that cannot be deleted is logged and kept.
pub fn prune(root: &Path, max_snapshots: usize) -> Result<PruneReport> {
    let mut kept = list_snapshots(root)?;
    let mut removed = Vec::new();
    let mut undeletable = Vec::new();

    while !kept.is_empty() && kept.len() + undeletable.len() >= max_snapshots {
        let Some(oldest) = kept.pop() else { break };
        match fs::remove_dir_all(&oldest) {
            Ok(()) => {
                info!("Removed old snapshot {}", oldest.display());
                removed.push(oldest);
            }
            Err(e) => {
                warn!("Could not remove old snapshot {}: {}", oldest.display(), e);
                undeletable.push(oldest);
            }
        }
    }

    // undeletable folders are older than every survivor
    kept.extend(undeletable.into_iter().rev());
    removed.reverse();

    Ok(PruneReport { kept, removed })
}

/// Newest manifest stored in `snapshot` that parses.
pub fn snapshot_manifest(snapshot: &Path) -> Option<Manifest> {
    let candidates = match manifest::find_in(snapshot) {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!("Could not list {}: {}", snapshot.display(), e);
            return None;
        }
    };

    for path in &candidates {
        match manifest::read(path) {
            Ok(manifest) => return Some(manifest),
            Err(e) => warn!("Ignoring unreadable manifest: {}", e),
        }
    }

    debug!("No manifest in {}", snapshot.display());
    None
}

/// Prune `root` to make room for one more snapshot, then return the manifest
/// of the newest surviving snapshot.
pub fn enforce_retention(root: &Path, max_snapshots: usize) -> Result<Option<Manifest>> {
    let report = prune(root, max_snapshots)?;
    Ok(report.kept.first().and_then(|newest| snapshot_manifest(newest)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::Strategy;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn make_snapshot(root: &Path, date: NaiveDate, with_manifest: bool) -> PathBuf {
        let dir = root.join(snapshot_name(date, 0));
        fs::create_dir_all(&dir).unwrap();
        if with_manifest {
            let start = Local
                .from_local_datetime(&date.and_hms_opt(21, 0, 0).unwrap())
                .unwrap();
            let mut m = Manifest::begin(start, Path::new("/src"), &dir, Strategy::Full);
            m.finish(start);
            manifest::write(&dir, &m).unwrap();
        }
        dir
    }

    #[test]
    fn test_snapshot_name_sorts_chronologically() {
        assert_eq!(snapshot_name(day(3), 7), "2024-06-03_backup_007");
        assert!(snapshot_name(day(9), 0) < snapshot_name(day(10), 0));
        assert!(snapshot_name(day(10), 0) < snapshot_name(day(10), 1));
    }

    #[test]
    fn test_four_snapshots_cap_three_leaves_two() {
        let temp_dir = TempDir::new().unwrap();
        for d in 1..=4 {
            make_snapshot(temp_dir.path(), day(d), true);
        }

        let prior = enforce_retention(temp_dir.path(), 3).unwrap().unwrap();

        let remaining = list_snapshots(temp_dir.path()).unwrap();
        assert_eq!(
            remaining,
            vec![
                temp_dir.path().join(snapshot_name(day(4), 0)),
                temp_dir.path().join(snapshot_name(day(3), 0)),
            ]
        );
        assert_eq!(prior.destination_path, temp_dir.path().join(snapshot_name(day(4), 0)));
    }

    #[test]
    fn test_prune_below_cap_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        make_snapshot(temp_dir.path(), day(1), false);
        make_snapshot(temp_dir.path(), day(2), false);

        let report = prune(temp_dir.path(), 5).unwrap();
        assert_eq!(report.kept.len(), 2);
        assert!(report.removed.is_empty());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        for d in 1..=6 {
            make_snapshot(temp_dir.path(), day(d), false);
        }

        let first = prune(temp_dir.path(), 4).unwrap();
        assert_eq!(first.kept.len(), 3);
        assert_eq!(first.removed.len(), 3);
        assert_eq!(first.removed[0], temp_dir.path().join(snapshot_name(day(3), 0)));

        let second = prune(temp_dir.path(), 4).unwrap();
        assert_eq!(second.kept, first.kept);
        assert!(second.removed.is_empty());
    }

    #[test]
    fn test_cap_of_one_clears_all() {
        let temp_dir = TempDir::new().unwrap();
        make_snapshot(temp_dir.path(), day(1), true);
        make_snapshot(temp_dir.path(), day(2), true);

        assert!(enforce_retention(temp_dir.path(), 1).unwrap().is_none());
        assert!(list_snapshots(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_unrelated_entries_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        make_snapshot(temp_dir.path(), day(1), true);
        fs::create_dir(temp_dir.path().join("archive")).unwrap();
        fs::write(temp_dir.path().join("2024-06-05_backup_000"), b"not a folder").unwrap();

        let report = prune(temp_dir.path(), 1).unwrap();
        assert_eq!(report.removed.len(), 1);
        assert!(temp_dir.path().join("archive").is_dir());
        assert!(temp_dir.path().join("2024-06-05_backup_000").is_file());
    }

    #[test]
    fn test_missing_root_and_missing_manifest() {
        let temp_dir = TempDir::new().unwrap();
        assert!(enforce_retention(&temp_dir.path().join("none"), 3).unwrap().is_none());

        make_snapshot(temp_dir.path(), day(1), true);
        make_snapshot(temp_dir.path(), day(2), false);
        // newest survivor has no manifest; older ones are not consulted
        assert!(enforce_retention(temp_dir.path(), 5).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_manifest_reads_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let dir = make_snapshot(temp_dir.path(), day(1), false);
        fs::write(dir.join("backup_information_x.json"), b"not json").unwrap();

        assert!(enforce_retention(temp_dir.path(), 5).unwrap().is_none());
    }

    #[test]
    fn test_unparsable_candidate_falls_through_to_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let dir = make_snapshot(temp_dir.path(), day(1), true);
        fs::write(dir.join("backup_information_zzz.json"), b"{}").unwrap();
        fs::write(dir.join("backup_information.txt"), b"user notes").unwrap();

        let prior = snapshot_manifest(&dir).unwrap();
        assert_eq!(prior.destination_path, dir);
    }
}
