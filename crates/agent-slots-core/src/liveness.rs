//! Liveness oracle consulted by the scanner.
//!
//! A record is live if the worker registry still lists its worker id, or
//! failing that, if its owner pid is running on this host.

use crate::platform;
use crate::registry::WorkerRegistry;
use std::cell::OnceCell;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Answers "is the owner of this record still active?".
pub trait LivenessOracle {
    /// Local process table lookup.
    fn process_is_alive(&self, pid: u32) -> bool;

    /// Remote registry lookup. `None` when no registry is in use or the
    /// lookup failed, in which case the caller falls back to the pid check.
    fn registry_has_worker(&self, worker_id: &str) -> Option<bool>;

    /// Combined check for a record: registry first, then local pid.
    ///
    /// A record with no parseable pid and no registry confirmation is dead.
    fn record_is_live(&self, pid: Option<u32>, worker_id: Option<&str>) -> bool {
        if let Some(id) = worker_id {
            if self.registry_has_worker(id) == Some(true) {
                return true;
            }
        }
        pid.is_some_and(|pid| self.process_is_alive(pid))
    }
}

/// Oracle backed by the OS process table and an optional worker registry.
///
/// The registry is only consulted for orchestrated registration directories.
/// Its worker list is fetched at most once per oracle, so build one oracle per
/// scan. A failed fetch is remembered and every record falls back to its pid.
pub struct SystemLiveness<'a> {
    registry: Option<&'a dyn WorkerRegistry>,
    workers: OnceCell<Option<HashSet<String>>>,
}

impl<'a> SystemLiveness<'a> {
    /// Local process checks only.
    pub fn local() -> Self {
        Self::new(None, false)
    }

    /// Use `registry` when `orchestrated` is set, otherwise behave like `local`.
    pub fn new(registry: Option<&'a dyn WorkerRegistry>, orchestrated: bool) -> Self {
        Self {
            registry: if orchestrated { registry } else { None },
            workers: OnceCell::new(),
        }
    }

    pub fn uses_registry(&self) -> bool {
        self.registry.is_some()
    }
}

impl LivenessOracle for SystemLiveness<'_> {
    fn process_is_alive(&self, pid: u32) -> bool {
        platform::is_process_alive(pid)
    }

    fn registry_has_worker(&self, worker_id: &str) -> Option<bool> {
        let registry = self.registry?;
        let workers = self.workers.get_or_init(|| match registry.list_workers() {
            Ok(workers) => {
                debug!("Worker registry lists {} workers", workers.len());
                Some(workers.into_iter().map(|w| w.id).collect())
            }
            Err(e) => {
                warn!("Worker registry lookup failed, using pid checks only: {}", e);
                None
            }
        });
        workers.as_ref().map(|ids| ids.contains(worker_id))
    }
}
