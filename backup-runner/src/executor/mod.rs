//! Backup job executor - Orchestrates one backup run per instruction.
//!
//! For every activated instruction the executor:
//! - validates the source and (re)creates today's snapshot folder
//! - prunes old snapshots (and, for `partial`, loads the newest manifest)
//! - scans, sizes and sorts the source's immediate children, smallest first
//! - fingerprints and transfers each item
//! - writes the run manifest into the snapshot folder
//!
//! Instructions run strictly one after another. A failing instruction is
//! logged and reported; it never stops the instructions after it.

pub mod manifest;
pub mod policy;
pub mod retention;

use crate::config::EngineConfig;
use crate::fingerprint::{self, HashAlgorithm};
use crate::fs::{self as source_fs, Exclusions, InventoryItem, ItemKind};
use crate::instructions::{Instruction, Strategy};
use crate::transfer::{self, TransferMethod};
use crate::utils::format::{format_bytes, format_duration};
use crate::utils::{EngineError, Result};
use chrono::{Local, NaiveDate};
use manifest::{Manifest, ManifestEntry};
use policy::{NeverTransfer, PartialPolicy};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

/// Engine settings resolved from configuration
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_snapshots: usize,
    pub algorithm: HashAlgorithm,
    pub directory_method: TransferMethod,
    pub exclusions: Exclusions,
}

impl EngineSettings {
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        if config.max_snapshots == 0 {
            return Err(EngineError::Config(
                "max_snapshots must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            max_snapshots: config.max_snapshots,
            algorithm: config.algorithm()?,
            directory_method: config.directory_method,
            exclusions: config.exclusions(),
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_snapshots: 5,
            algorithm: HashAlgorithm::default(),
            directory_method: TransferMethod::default(),
            exclusions: Exclusions::none(),
        }
    }
}

/// Terminal state of one instruction
#[derive(Debug)]
pub enum RowStatus {
    Completed,
    Skipped,
    Failed(EngineError),
}

/// What happened to one instruction
#[derive(Debug)]
pub struct RowOutcome {
    pub index: usize,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub activated: bool,
    pub shutdown: bool,
    pub status: RowStatus,
    pub snapshot: Option<PathBuf>,
    pub manifest_path: Option<PathBuf>,
    pub items_transferred: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub bytes_transferred: u64,
    pub duration: Duration,
}

impl RowOutcome {
    fn new(index: usize, job: &Instruction, status: RowStatus) -> Self {
        Self {
            index,
            source: job.source.clone(),
            destination: job.destination.clone(),
            activated: job.activate,
            shutdown: job.shutdown,
            status,
            snapshot: None,
            manifest_path: None,
            items_transferred: 0,
            items_skipped: 0,
            items_failed: 0,
            bytes_transferred: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, RowStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, RowStatus::Failed(_))
    }
}

/// Outcomes of every instruction of one invocation
#[derive(Debug, Default)]
pub struct RunSummary {
    pub rows: Vec<RowOutcome>,
}

impl RunSummary {
    pub fn completed(&self) -> usize {
        self.rows.iter().filter(|r| r.is_completed()).count()
    }

    pub fn failed(&self) -> usize {
        self.rows.iter().filter(|r| r.is_failed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r.status, RowStatus::Skipped))
            .count()
    }

    /// True when at least one instruction was activated and every activated
    /// instruction asked for a power-off.
    pub fn shutdown_requested(&self) -> bool {
        let mut activated = self.rows.iter().filter(|r| r.activated).peekable();
        activated.peek().is_some() && activated.all(|r| r.shutdown)
    }
}

/// Counters gathered while processing the items of one run
#[derive(Debug, Default)]
struct ItemTally {
    skipped: usize,
}

/// Main backup executor
pub struct BackupExecutor {
    settings: EngineSettings,
    policy: Box<dyn PartialPolicy>,
}

impl BackupExecutor {
    /// Create a new backup executor using the default partial policy
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            policy: Box::new(NeverTransfer),
        }
    }

    /// Replace the partial-strategy decision hook
    pub fn with_policy(mut self, policy: Box<dyn PartialPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Execute every instruction in order, dated today
    pub fn run_all(&self, instructions: &[Instruction]) -> RunSummary {
        let today = Local::now().date_naive();
        let mut summary = RunSummary::default();

        if instructions.is_empty() {
            info!("No backup instructions, nothing to do");
        }

        for (index, job) in instructions.iter().enumerate() {
            summary.rows.push(self.execute_on(index, job, today));
        }

        info!(
            "Run finished: {} completed, {} skipped, {} failed",
            summary.completed(),
            summary.skipped(),
            summary.failed()
        );

        summary
    }

    /// Execute one instruction, dated today
    pub fn execute(&self, index: usize, job: &Instruction) -> RowOutcome {
        self.execute_on(index, job, Local::now().date_naive())
    }

    /// Execute one instruction as if run on `date`
    pub fn execute_on(&self, index: usize, job: &Instruction, date: NaiveDate) -> RowOutcome {
        let span = info_span!(
            "row",
            index,
            source = %job.source.display(),
            destination = %job.destination.display()
        );
        let _enter = span.enter();

        if !job.activate {
            info!("Instruction {} is not activated, skipping", index);
            return RowOutcome::new(index, job, RowStatus::Skipped);
        }

        let start = Instant::now();
        let mut outcome = RowOutcome::new(index, job, RowStatus::Completed);

        match self.run_row(index, job, date, &mut outcome) {
            Ok(()) => {
                info!(
                    "Backup of {} completed: {} item(s), {} in {}",
                    job.source.display(),
                    outcome.items_transferred,
                    format_bytes(outcome.bytes_transferred),
                    format_duration(start.elapsed())
                );
            }
            Err(e) => {
                error!(
                    "Backup of {} to {} failed: {}",
                    job.source.display(),
                    job.destination.display(),
                    e
                );
                outcome.status = RowStatus::Failed(e);
            }
        }

        outcome.duration = start.elapsed();
        outcome
    }

    fn run_row(
        &self,
        index: usize,
        job: &Instruction,
        date: NaiveDate,
        outcome: &mut RowOutcome,
    ) -> Result<()> {
        if !job.source.is_dir() {
            return Err(EngineError::SourceNotFound(job.source.clone()));
        }

        let start_time = Local::now();
        let snapshot = job
            .destination
            .join(retention::snapshot_name(date, index));

        if snapshot.exists() {
            warn!("Replacing existing snapshot {}", snapshot.display());
            fs::remove_dir_all(&snapshot)?;
        }

        let prior = match job.strategy {
            Strategy::Full => {
                retention::prune(&job.destination, self.settings.max_snapshots)?;
                None
            }
            Strategy::Partial => {
                let prior =
                    retention::enforce_retention(&job.destination, self.settings.max_snapshots)?;
                match &prior {
                    Some(m) => info!("Prior manifest from {}", m.destination_path.display()),
                    None => info!("No prior manifest found"),
                }
                prior
            }
        };

        fs::create_dir_all(&snapshot)?;
        outcome.snapshot = Some(snapshot.clone());
        info!("Snapshot folder: {}", snapshot.display());

        let mut manifest = Manifest::begin(start_time, &job.source, &snapshot, job.strategy);
        let items = self.inventory(&job.source, &mut manifest)?;

        let mut tally = ItemTally::default();
        for item in &items {
            self.process_item(item, job, &snapshot, prior.as_ref(), &mut manifest, &mut tally);
        }

        manifest.finish(Local::now());
        let manifest_path = manifest::write(&snapshot, &manifest)?;
        debug!("Manifest written to {}", manifest_path.display());

        outcome.manifest_path = Some(manifest_path);
        outcome.items_transferred = manifest.files.len() + manifest.folders.len();
        outcome.items_skipped = tally.skipped;
        outcome.items_failed = manifest.failed.len();
        outcome.bytes_transferred = manifest.transferred_bytes();

        Ok(())
    }

    /// Scan and size the source's children, smallest first.
    ///
    /// Items that cannot be sized (including entries that are neither file
    /// nor directory) are recorded as failed in `manifest`.
    fn inventory(&self, source: &Path, manifest: &mut Manifest) -> Result<Vec<InventoryItem>> {
        let inventory = source_fs::scan(source)?;
        let mut items = Vec::with_capacity(inventory.len());

        for (name, kind) in inventory.items() {
            let path = source.join(name);
            let size = match kind {
                ItemKind::Other => Err(EngineError::InvalidPath(path.clone())),
                _ => fingerprint::size_of(&path),
            };

            match size {
                Ok(size_bytes) => items.push(InventoryItem {
                    name: name.to_string(),
                    kind,
                    size_bytes,
                }),
                Err(e) => {
                    error!("Cannot size {} {}: {}", kind, path.display(), e);
                    manifest.record_failure(ManifestEntry::failed(name, kind, 0, &e));
                }
            }
        }

        sort_by_size(&mut items);

        info!(
            "Inventory: {} file(s), {} folder(s), {} total",
            inventory.files.len(),
            inventory.directories.len(),
            format_bytes(items.iter().map(|i| i.size_bytes).sum())
        );

        Ok(items)
    }

    fn process_item(
        &self,
        item: &InventoryItem,
        job: &Instruction,
        snapshot: &Path,
        prior: Option<&Manifest>,
        manifest: &mut Manifest,
        tally: &mut ItemTally,
    ) {
        let source_path = job.source.join(&item.name);

        let hash = match fingerprint::hash_path(
            &source_path,
            self.settings.algorithm,
            &self.settings.exclusions,
        ) {
            Ok(hash) => hash,
            Err(e) => {
                error!(
                    "Cannot fingerprint {} {}: {}",
                    item.kind,
                    source_path.display(),
                    e
                );
                manifest.record_failure(ManifestEntry::failed(
                    &item.name,
                    item.kind,
                    item.size_bytes,
                    &e,
                ));
                return;
            }
        };

        let do_backup = match job.strategy {
            Strategy::Full => true,
            Strategy::Partial => self.policy.needs_backup(item, &hash, prior),
        };

        if !do_backup {
            debug!("Not transferring {} ({})", item.name, hash);
            tally.skipped += 1;
            return;
        }

        let dest_path = snapshot.join(&item.name);
        let method = self.settings.directory_method;
        // artifacts are created exclusively, so a name clash fails the later item
        match transfer::transfer(&source_path, &dest_path, item.kind, method) {
            Ok(done) => {
                info!(
                    "Transferred {} {} ({}) to {} in {}",
                    item.kind,
                    item.name,
                    format_bytes(item.size_bytes),
                    done.artifact.display(),
                    format_duration(done.duration)
                );
                manifest.record(ManifestEntry::transferred(
                    &item.name,
                    item.kind,
                    hash,
                    item.size_bytes,
                    done.duration.as_millis() as u64,
                ));
            }
            Err(e) => {
                error!(
                    "Transfer of {} to {} failed: {}",
                    source_path.display(),
                    dest_path.display(),
                    e
                );
                manifest.record_failure(ManifestEntry::failed(
                    &item.name,
                    item.kind,
                    item.size_bytes,
                    &e,
                ));
            }
        }
    }
}

/// Ascending by size; equal sizes keep name order.
fn sort_by_size(items: &mut [InventoryItem]) {
    items.sort_by(|a, b| a.size_bytes.cmp(&b.size_bytes).then_with(|| a.name.cmp(&b.name)));
}
