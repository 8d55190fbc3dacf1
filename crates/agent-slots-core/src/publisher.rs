//! Publishing a registration record for the current process.
//!
//! The record lives in a `NamedTempFile` owned by the caller. Dropping it
//! (normal process exit) removes the file. A crash leaves the file behind
//! and the next scan reclaims it once the pid is gone.

use crate::config::RegistrationConfig;
use crate::error::{Result, SlotError};
use crate::platform;
use crate::record;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// A record written by this process.
#[derive(Debug)]
pub struct PublishedRecord {
    pub worker_id: String,
    pub slot: u32,
    file: NamedTempFile,
}

impl PublishedRecord {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the record file now.
    pub fn remove(self) -> Result<()> {
        let path = self.file.path().to_path_buf();
        self.file
            .close()
            .map_err(|e| SlotError::io_with_path(e, path))
    }
}

/// Pick the worker id to publish.
///
/// An explicit unique id wins. Otherwise the id is `<worker_name>:<slot>`.
pub fn resolve_worker_id(
    unique_worker_id: Option<&str>,
    worker_name: Option<&str>,
    slot: u32,
) -> Result<String> {
    let worker_id = match (unique_worker_id, worker_name) {
        (Some(id), _) => id.to_string(),
        (None, Some(name)) => format!("{}{}{}", name, RegistrationConfig::WORKER_NAME_SEP, slot),
        (None, None) => {
            return Err(SlotError::Validation {
                field: "worker_name".to_string(),
                message: "required when no unique worker id is given".to_string(),
            })
        }
    };
    validate_worker_id(&worker_id)?;
    Ok(worker_id)
}

/// Reject ids that cannot round-trip through the two-line record body.
pub fn validate_worker_id(worker_id: &str) -> Result<()> {
    if worker_id.is_empty() {
        return Err(SlotError::Validation {
            field: "worker_id".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    if worker_id.contains(['\n', '\r']) {
        return Err(SlotError::Validation {
            field: "worker_id".to_string(),
            message: "must not contain line breaks".to_string(),
        });
    }
    Ok(())
}

/// Write a record binding `slot` to the resolved worker id and this process.
pub fn publish(
    dir: &Path,
    unique_worker_id: Option<&str>,
    worker_name: Option<&str>,
    slot: u32,
) -> Result<PublishedRecord> {
    let worker_id = resolve_worker_id(unique_worker_id, worker_name, slot)?;

    let mut file = tempfile::Builder::new()
        .prefix(&record::file_prefix(platform::current_pid()))
        .suffix(RegistrationConfig::RECORD_EXT)
        .tempfile_in(dir)
        .map_err(|e| SlotError::io_with_path(e, dir))?;

    let path = file.path().to_path_buf();
    file.write_all(record::encode_body(&worker_id, slot).as_bytes())
        .and_then(|_| file.flush())
        .map_err(|e| SlotError::io_with_path(e, &path))?;

    debug!("Published record {} for {}", path.display(), worker_id);

    Ok(PublishedRecord {
        worker_id,
        slot,
        file,
    })
}
