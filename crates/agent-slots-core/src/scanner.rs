//! Registration directory scan.
//!
//! Rebuilds the live slot table from the record files, deleting records
//! whose owner is no longer live. Must run while the global lock is held.

use crate::allocator::SlotTable;
use crate::error::{Result, SlotError};
use crate::liveness::LivenessOracle;
use crate::record::{self, RegistrationRecord};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Result of one scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Slots held by live records.
    pub slots: SlotTable,
    /// Every live record, including ones without a usable slot.
    pub live: Vec<RegistrationRecord>,
    /// Number of dead records whose files were removed.
    pub reclaimed: usize,
    /// Live record already holding the requested worker id, if any.
    pub collision: Option<RegistrationRecord>,
}

impl ScanReport {
    pub fn has_collision(&self) -> bool {
        self.collision.is_some()
    }
}

/// Scanner over one registration directory.
pub struct Scanner<'a> {
    dir: &'a Path,
    oracle: &'a dyn LivenessOracle,
}

impl<'a> Scanner<'a> {
    pub fn new(dir: &'a Path, oracle: &'a dyn LivenessOracle) -> Self {
        Self { dir, oracle }
    }

    /// Scan all records.
    ///
    /// `candidate` is the explicit worker id the caller wants to claim; a live
    /// record with that id is reported as a collision.
    pub fn scan(&self, candidate: Option<&str>) -> Result<ScanReport> {
        let mut report = ScanReport::default();

        for path in self.record_files()? {
            let record = RegistrationRecord::load(&path);
            let live = self
                .oracle
                .record_is_live(record.pid, record.body.worker_id.as_deref());

            if !live {
                debug!(
                    "Reclaiming record {} (pid {:?}, slot {:?})",
                    path.display(),
                    record.pid,
                    record.body.slot
                );
                if remove_record(&path) {
                    report.reclaimed += 1;
                }
                continue;
            }

            if candidate.is_some() && record.body.worker_id.as_deref() == candidate {
                debug!(
                    "Worker id {:?} already registered by pid {:?}",
                    candidate, record.pid
                );
                report.collision = Some(record.clone());
            }

            if let Some(slot) = record.body.slot {
                let worker_id = record.body.worker_id.clone().unwrap_or_default();
                if let Some(previous) = report.slots.insert(slot, worker_id.clone()) {
                    warn!(
                        "Slot {} claimed by both {} and {}",
                        slot, previous, worker_id
                    );
                }
            }

            report.live.push(record);
        }

        debug!(
            "Scanned {}: {} live, {} reclaimed",
            self.dir.display(),
            report.live.len(),
            report.reclaimed
        );
        Ok(report)
    }

    fn record_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(self.dir).map_err(|e| SlotError::io_with_path(e, self.dir))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(record::is_record_file_name)
            })
            .map(|entry| entry.path())
            .collect();
        files.sort();
        Ok(files)
    }
}

/// Best-effort delete. A file that survives is retried on the next scan.
fn remove_record(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => true,
        Err(e) => {
            debug!("Failed to remove dead record {}: {}", path.display(), e);
            false
        }
    }
}
