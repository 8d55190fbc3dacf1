//! Remote worker registry used as a second liveness source.
//!
//! On an orchestrated mount the process that wrote a record may live in a
//! different pid namespace, so the local process table cannot vouch for it.
//! The registry can: a worker it still lists is treated as live.
//!
//! The registry is only ever read. Registration never writes to it.

pub mod http;

pub use http::ApiWorkerRegistry;

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A worker as reported by the registry. Only the id is needed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: String,
}

/// A client that can list every worker the registry currently knows about.
pub trait WorkerRegistry {
    fn list_workers(&self) -> Result<Vec<WorkerInfo>>;

    /// Whether a worker with this unique id is currently listed.
    fn has_worker(&self, worker_id: &str) -> Result<bool> {
        Ok(self.list_workers()?.iter().any(|w| w.id == worker_id))
    }
}

/// Fixed in-memory registry, handy for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticWorkerRegistry {
    workers: Vec<WorkerInfo>,
}

impl StaticWorkerRegistry {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            workers: ids.into_iter().map(|id| WorkerInfo { id: id.into() }).collect(),
        }
    }
}

impl WorkerRegistry for StaticWorkerRegistry {
    fn list_workers(&self) -> Result<Vec<WorkerInfo>> {
        Ok(self.workers.clone())
    }
}
