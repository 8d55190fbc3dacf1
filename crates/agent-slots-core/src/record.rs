//! Registration record files.
//!
//! One file per registered worker, named `<prefix><sep><pid><sep><random><ext>`
//! (for example `.trainsagent_4242_k3j9dq.tmp`). The body is two lines:
//! the unique worker id and the slot number.
//!
//! Every parse step returns an `Option` so the scanner can apply its own
//! policy to partial records instead of failing the whole scan.

use crate::config::RegistrationConfig;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Decoded record body. Either field may be missing if the file is corrupt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordBody {
    pub worker_id: Option<String>,
    pub slot: Option<u32>,
}

/// A record file as found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationRecord {
    pub path: PathBuf,
    /// Owner pid from the file name; `None` if the name is malformed.
    pub pid: Option<u32>,
    #[serde(flatten)]
    pub body: RecordBody,
}

impl RegistrationRecord {
    /// Load a record. An unreadable body yields an empty `RecordBody`.
    pub fn load(path: &Path) -> Self {
        let pid = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_pid);

        let body = match fs::read_to_string(path) {
            Ok(content) => parse_body(&content),
            Err(e) => {
                debug!("Failed to read record {}: {}", path.display(), e);
                RecordBody::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            pid,
            body,
        }
    }
}

/// File name prefix for records owned by `pid`, including the trailing separator.
pub fn file_prefix(pid: u32) -> String {
    format!(
        "{}{}{}{}",
        RegistrationConfig::RECORD_PREFIX,
        RegistrationConfig::RECORD_SEP,
        pid,
        RegistrationConfig::RECORD_SEP
    )
}

/// Whether a directory entry name follows the record naming convention.
///
/// Only prefix and extension are checked; a malformed middle still marks
/// the file as a record so the scanner can reclaim it.
pub fn is_record_file_name(name: &str) -> bool {
    let start = record_name_start();
    name.len() >= start.len() + RegistrationConfig::RECORD_EXT.len()
        && name.starts_with(&start)
        && name.ends_with(RegistrationConfig::RECORD_EXT)
}

/// Extract the owner pid from a record file name.
pub fn parse_pid(name: &str) -> Option<u32> {
    let rest = name.strip_prefix(&record_name_start())?;
    let (pid, _) = rest.split_once(RegistrationConfig::RECORD_SEP)?;
    pid.parse().ok()
}

/// Serialize a record body.
pub fn encode_body(worker_id: &str, slot: u32) -> String {
    format!("{}\n{}", worker_id, slot)
}

/// Decode a record body.
///
/// Anything other than exactly two lines yields an empty body. With two
/// lines, the worker id survives even if the slot line does not parse.
pub fn parse_body(content: &str) -> RecordBody {
    let Some((worker_id, slot)) = content.split_once('\n') else {
        return RecordBody::default();
    };
    if slot.contains('\n') {
        return RecordBody::default();
    }

    RecordBody {
        worker_id: (!worker_id.is_empty()).then(|| worker_id.to_string()),
        slot: slot.trim().parse().ok(),
    }
}

fn record_name_start() -> String {
    format!(
        "{}{}",
        RegistrationConfig::RECORD_PREFIX,
        RegistrationConfig::RECORD_SEP
    )
}
