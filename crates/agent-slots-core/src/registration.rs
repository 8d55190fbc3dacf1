//! Worker registration entry point.
//!
//! A `Registration` is the per-process context that owns the published
//! record. Callers create one at startup and keep it alive for as long as
//! the worker runs; dropping it removes the record.
//!
//! ```rust,ignore
//! use agent_slots::Registration;
//!
//! let mut registration = Registration::from_env();
//! match registration.register_instance(None, Some("gpu-box"), None) {
//!     Some(identity) => println!("{} on slot {}", identity.worker_id, identity.slot),
//!     None => eprintln!("another instance is already running"),
//! }
//! ```

use crate::allocator;
use crate::config::LockOptions;
use crate::error::{Result, SlotError};
use crate::liveness::{LivenessOracle, SystemLiveness};
use crate::lock::GlobalLock;
use crate::platform::{self, RegistrationDir};
use crate::publisher::{self, PublishedRecord};
use crate::record::RegistrationRecord;
use crate::registry::WorkerRegistry;
use crate::scanner::{ScanReport, Scanner};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identity obtained by a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerIdentity {
    pub worker_id: String,
    pub slot: u32,
}

/// Outcome of a registration attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered(WorkerIdentity),
    /// The requested worker id is held by a live record.
    AlreadyRunning {
        worker_id: String,
        pid: Option<u32>,
    },
}

/// Per-process registration context.
#[derive(Debug)]
pub struct Registration {
    dir: RegistrationDir,
    lock_options: LockOptions,
    create_dir: bool,
    record: Option<PublishedRecord>,
}

impl Registration {
    pub fn builder() -> RegistrationBuilder {
        RegistrationBuilder::new()
    }

    /// Registration in the directory chosen by the process environment.
    pub fn from_env() -> Self {
        Self::builder().build()
    }

    pub fn directory(&self) -> &RegistrationDir {
        &self.dir
    }

    pub fn lock_options(&self) -> LockOptions {
        self.lock_options
    }

    /// Register this process, degrading every failure to `None`.
    ///
    /// Returns `None` when `unique_worker_id` is already held by a live
    /// worker, which usually means another instance is running. Any other
    /// failure is logged and also reported as `None`.
    pub fn register_instance(
        &mut self,
        unique_worker_id: Option<&str>,
        worker_name: Option<&str>,
        registry: Option<&dyn WorkerRegistry>,
    ) -> Option<WorkerIdentity> {
        match self.try_register(unique_worker_id, worker_name, registry) {
            Ok(RegistrationOutcome::Registered(identity)) => Some(identity),
            Ok(RegistrationOutcome::AlreadyRunning { worker_id, pid }) => {
                warn!(
                    "Worker id {} is already registered by a live process (pid {:?})",
                    worker_id, pid
                );
                None
            }
            Err(e) => {
                warn!("Worker registration failed: {}", e);
                None
            }
        }
    }

    /// Register this process and report why registration did not happen.
    pub fn try_register(
        &mut self,
        unique_worker_id: Option<&str>,
        worker_name: Option<&str>,
        registry: Option<&dyn WorkerRegistry>,
    ) -> Result<RegistrationOutcome> {
        let oracle = SystemLiveness::new(registry, self.dir.orchestrated);
        self.try_register_with_oracle(&oracle, unique_worker_id, worker_name)
    }

    /// Same as [`Registration::try_register`] with a caller-supplied oracle.
    pub fn try_register_with_oracle(
        &mut self,
        oracle: &dyn LivenessOracle,
        unique_worker_id: Option<&str>,
        worker_name: Option<&str>,
    ) -> Result<RegistrationOutcome> {
        if let Some(identity) = self.identity() {
            debug!("Already registered as {}", identity.worker_id);
            return Ok(RegistrationOutcome::Registered(identity));
        }

        match (unique_worker_id, worker_name) {
            (Some(id), _) => publisher::validate_worker_id(id)?,
            (None, Some(_)) => {}
            (None, None) => {
                return Err(SlotError::Validation {
                    field: "worker_name".to_string(),
                    message: "required when no unique worker id is given".to_string(),
                })
            }
        }

        self.ensure_dir()?;
        let guard = GlobalLock::new(&self.dir.path, self.lock_options).acquire()?;
        let result = self.register_locked(oracle, unique_worker_id, worker_name);
        guard.release();

        let (outcome, record) = result?;
        if let Some(record) = record {
            info!(
                "Registered worker {} on slot {} ({})",
                record.worker_id,
                record.slot,
                record.path().display()
            );
            self.record = Some(record);
        }
        Ok(outcome)
    }

    /// Critical section: scan, allocate and publish. Lock must be held.
    fn register_locked(
        &self,
        oracle: &dyn LivenessOracle,
        unique_worker_id: Option<&str>,
        worker_name: Option<&str>,
    ) -> Result<(RegistrationOutcome, Option<PublishedRecord>)> {
        let report = Scanner::new(&self.dir.path, oracle).scan(unique_worker_id)?;

        if let Some(existing) = report.collision {
            let outcome = RegistrationOutcome::AlreadyRunning {
                worker_id: existing.body.worker_id.unwrap_or_default(),
                pid: existing.pid,
            };
            return Ok((outcome, None));
        }

        let slot = allocator::allocate(&report.slots);
        let record = publisher::publish(&self.dir.path, unique_worker_id, worker_name, slot)?;
        let identity = WorkerIdentity {
            worker_id: record.worker_id.clone(),
            slot: record.slot,
        };
        Ok((RegistrationOutcome::Registered(identity), Some(record)))
    }

    /// Slot of this process, 0 if it never registered.
    pub fn get_slot(&self) -> u32 {
        self.record.as_ref().map_or(0, |record| record.slot)
    }

    pub fn worker_id(&self) -> Option<&str> {
        self.record.as_ref().map(|record| record.worker_id.as_str())
    }

    pub fn identity(&self) -> Option<WorkerIdentity> {
        self.record.as_ref().map(|record| WorkerIdentity {
            worker_id: record.worker_id.clone(),
            slot: record.slot,
        })
    }

    /// Path of this process's record file, if registered.
    pub fn record_path(&self) -> Option<PathBuf> {
        self.record.as_ref().map(|record| record.path().to_path_buf())
    }

    /// Remove this process's record. Returns `false` if it was not registered.
    pub fn unregister(&mut self) -> Result<bool> {
        match self.record.take() {
            Some(record) => {
                info!("Unregistering worker {}", record.worker_id);
                record.remove()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Scan the directory under the lock without registering.
    ///
    /// Dead records found along the way are reclaimed, as in a registration.
    pub fn scan(&self, registry: Option<&dyn WorkerRegistry>) -> Result<ScanReport> {
        let oracle = SystemLiveness::new(registry, self.dir.orchestrated);
        self.ensure_dir()?;
        let guard = GlobalLock::new(&self.dir.path, self.lock_options).acquire()?;
        let report = Scanner::new(&self.dir.path, &oracle).scan(None);
        guard.release();
        report
    }

    /// Live records currently in the directory.
    pub fn live_records(
        &self,
        registry: Option<&dyn WorkerRegistry>,
    ) -> Result<Vec<RegistrationRecord>> {
        Ok(self.scan(registry)?.live)
    }

    fn ensure_dir(&self) -> Result<()> {
        let path = &self.dir.path;
        if path.is_dir() {
            return Ok(());
        }
        if !self.create_dir {
            return Err(SlotError::Config {
                message: format!("Registration directory does not exist: {}", path.display()),
            });
        }
        std::fs::create_dir_all(path).map_err(|e| SlotError::Io {
            message: format!("Failed to create registration directory: {}", path.display()),
            path: Some(path.clone()),
            source: Some(e),
        })
    }
}

/// Builder for configuring a [`Registration`].
///
/// ```rust,ignore
/// let registration = Registration::builder()
///     .directory("/mnt/agents")
///     .poll_interval(Duration::from_millis(200))
///     .lock_timeout(Duration::from_secs(5))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct RegistrationBuilder {
    dir: Option<RegistrationDir>,
    lock_options: LockOptions,
    create_dir: bool,
}

impl RegistrationBuilder {
    pub fn new() -> Self {
        Self {
            dir: None,
            lock_options: LockOptions::default(),
            create_dir: true,
        }
    }

    /// Use a local directory. Registry lookups stay off.
    pub fn directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(RegistrationDir::local(path));
        self
    }

    /// Use an explicit directory descriptor, e.g. an orchestrated mount.
    pub fn registration_dir(mut self, dir: RegistrationDir) -> Self {
        self.dir = Some(dir);
        self
    }

    /// Delay between lock checks.
    ///
    /// Default: 1 second
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.lock_options.poll_interval = interval;
        self
    }

    /// How long a lock may block before it is treated as stale.
    ///
    /// Default: 10 seconds
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_options.timeout = timeout;
        self
    }

    /// Create the registration directory when missing.
    ///
    /// Default: `true`
    pub fn create_dir(mut self, enable: bool) -> Self {
        self.create_dir = enable;
        self
    }

    /// Without an explicit directory the environment decides.
    pub fn build(self) -> Registration {
        Registration {
            dir: self.dir.unwrap_or_else(platform::registration_dir),
            lock_options: self.lock_options,
            create_dir: self.create_dir,
            record: None,
        }
    }
}

impl Default for RegistrationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use crate::registry::StaticWorkerRegistry;
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const DEAD_PID: u32 = 4_000_000_000;

    fn test_registration(dir: &Path) -> Registration {
        Registration::builder()
            .directory(dir)
            .poll_interval(Duration::from_millis(10))
            .lock_timeout(Duration::from_secs(5))
            .build()
    }

    fn write_record(dir: &Path, pid: u32, tag: &str, worker_id: &str, slot: u32) -> PathBuf {
        let path = dir.join(format!("{}{}.tmp", record::file_prefix(pid), tag));
        fs::write(&path, record::encode_body(worker_id, slot)).unwrap();
        path
    }

    fn record_count(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .is_some_and(record::is_record_file_name)
            })
            .count()
    }

    #[test]
    fn test_empty_directory_gets_slot_zero() {
        let temp_dir = TempDir::new().unwrap();
        let mut registration = test_registration(temp_dir.path());

        let identity = registration
            .register_instance(None, Some("gpu-box"), None)
            .unwrap();
        assert_eq!(identity.worker_id, "gpu-box:0");
        assert_eq!(identity.slot, 0);
        assert_eq!(registration.get_slot(), 0);
        assert_eq!(registration.worker_id(), Some("gpu-box:0"));
    }

    #[test]
    fn test_get_slot_defaults_to_zero() {
        let temp_dir = TempDir::new().unwrap();
        let registration = test_registration(temp_dir.path());
        assert_eq!(registration.get_slot(), 0);
        assert_eq!(registration.worker_id(), None);
    }

    #[test]
    fn test_live_slots_push_allocation_up() {
        let temp_dir = TempDir::new().unwrap();
        let own = std::process::id();
        write_record(temp_dir.path(), own, "a", "gpu-box:0", 0);
        write_record(temp_dir.path(), own, "b", "gpu-box:1", 1);

        let mut registration = test_registration(temp_dir.path());
        let identity = registration
            .register_instance(None, Some("gpu-box"), None)
            .unwrap();
        assert_eq!(identity.slot, 2);
        assert_eq!(identity.worker_id, "gpu-box:2");
        assert_eq!(registration.get_slot(), 2);
    }

    #[test]
    fn test_dead_owner_slot_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        let own = std::process::id();
        write_record(temp_dir.path(), own, "a", "gpu-box:0", 0);
        let dead = write_record(temp_dir.path(), DEAD_PID, "b", "gpu-box:1", 1);
        write_record(temp_dir.path(), own, "c", "gpu-box:2", 2);

        let mut registration = test_registration(temp_dir.path());
        let identity = registration
            .register_instance(None, Some("gpu-box"), None)
            .unwrap();
        assert_eq!(identity.slot, 1);
        assert!(!dead.exists());
    }

    #[test]
    fn test_explicit_id_collision_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        write_record(temp_dir.path(), std::process::id(), "a", "trainer-7", 0);

        let mut registration = test_registration(temp_dir.path());
        assert_eq!(
            registration.register_instance(Some("trainer-7"), None, None),
            None
        );
        assert_eq!(registration.get_slot(), 0);
        assert_eq!(record_count(temp_dir.path()), 1);

        let outcome = registration
            .try_register(Some("trainer-7"), None, None)
            .unwrap();
        assert_eq!(
            outcome,
            RegistrationOutcome::AlreadyRunning {
                worker_id: "trainer-7".to_string(),
                pid: Some(std::process::id()),
            }
        );
    }

    #[test]
    fn test_explicit_id_without_live_owner() {
        let temp_dir = TempDir::new().unwrap();
        write_record(temp_dir.path(), std::process::id(), "a", "other", 0);
        write_record(temp_dir.path(), DEAD_PID, "b", "trainer-7", 1);

        let mut registration = test_registration(temp_dir.path());
        let identity = registration
            .register_instance(Some("trainer-7"), Some("ignored"), None)
            .unwrap();
        assert_eq!(identity.worker_id, "trainer-7");
        assert_eq!(identity.slot, 1);
    }

    #[test]
    fn test_registration_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut registration = test_registration(temp_dir.path());

        let first = registration.register_instance(None, Some("w"), None).unwrap();
        let second = registration.register_instance(None, Some("w"), None).unwrap();
        let third = registration
            .register_instance(Some("different"), None, None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first, third);
        assert_eq!(record_count(temp_dir.path()), 1);
    }

    #[test]
    fn test_lock_released_after_registration() {
        let temp_dir = TempDir::new().unwrap();
        let mut registration = test_registration(temp_dir.path());
        registration.register_instance(None, Some("w"), None).unwrap();

        let lock = GlobalLock::new(temp_dir.path(), registration.lock_options());
        assert!(!lock.is_held());
    }

    #[test]
    fn test_unusable_directory_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let file_not_dir = temp_dir.path().join("plain-file");
        fs::write(&file_not_dir, "x").unwrap();

        let mut registration = Registration::builder()
            .directory(&file_not_dir)
            .create_dir(false)
            .poll_interval(Duration::from_millis(10))
            .build();
        assert!(registration.register_instance(None, Some("w"), None).is_none());
        assert!(matches!(
            registration.try_register(None, Some("w"), None),
            Err(SlotError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_name_and_id_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut registration = test_registration(temp_dir.path());
        assert!(matches!(
            registration.try_register(None, None, None),
            Err(SlotError::Validation { .. })
        ));
        assert!(registration.register_instance(None, None, None).is_none());
        assert!(!GlobalLock::new(temp_dir.path(), LockOptions::default()).is_held());
    }

    #[test]
    fn test_missing_directory_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let mut registration = test_registration(&nested);
        assert!(registration.register_instance(None, Some("w"), None).is_some());
        assert_eq!(record_count(&nested), 1);
    }

    #[test]
    fn test_unregister_removes_record() {
        let temp_dir = TempDir::new().unwrap();
        let mut registration = test_registration(temp_dir.path());
        registration.register_instance(None, Some("w"), None).unwrap();
        let path = registration.record_path().unwrap();

        assert!(registration.unregister().unwrap());
        assert!(!path.exists());
        assert_eq!(registration.get_slot(), 0);
        assert!(!registration.unregister().unwrap());
    }

    #[test]
    fn test_drop_removes_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = {
            let mut registration = test_registration(temp_dir.path());
            registration.register_instance(None, Some("w"), None).unwrap();
            registration.record_path().unwrap()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_concurrent_registrations_get_distinct_slots() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_path_buf();
        let workers = 6;

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let dir = dir.clone();
                std::thread::spawn(move || {
                    let mut registration = test_registration(&dir);
                    let identity = registration
                        .register_instance(None, Some("pool"), None)
                        .unwrap();
                    // Keep the record alive until the test has collected every slot.
                    (identity, registration)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let slots: BTreeSet<u32> = results.iter().map(|(identity, _)| identity.slot).collect();
        assert_eq!(slots, (0..workers).collect::<BTreeSet<u32>>());
        assert_eq!(record_count(&dir), workers as usize);
    }

    #[test]
    fn test_registry_vouches_for_dead_pid_on_orchestrated_dir() {
        let temp_dir = TempDir::new().unwrap();
        write_record(temp_dir.path(), DEAD_PID, "a", "pod-a:0", 0);

        let registry = StaticWorkerRegistry::new(["pod-a:0"]);
        let mut registration = Registration::builder()
            .registration_dir(RegistrationDir::orchestrated(temp_dir.path()))
            .poll_interval(Duration::from_millis(10))
            .build();
        let identity = registration
            .register_instance(None, Some("pod-b"), Some(&registry))
            .unwrap();
        assert_eq!(identity.slot, 1);
    }

    #[test]
    fn test_custom_oracle_decides_liveness() {
        use crate::liveness::LivenessOracle;

        struct PidListOracle {
            dead: u32,
        }

        impl LivenessOracle for PidListOracle {
            fn process_is_alive(&self, pid: u32) -> bool {
                pid != self.dead
            }

            fn registry_has_worker(&self, _worker_id: &str) -> Option<bool> {
                None
            }
        }

        let temp_dir = TempDir::new().unwrap();
        write_record(temp_dir.path(), 101, "a", "gpu-box:0", 0);
        let dead = write_record(temp_dir.path(), 102, "b", "gpu-box:1", 1);
        write_record(temp_dir.path(), 103, "c", "gpu-box:2", 2);

        let mut registration = test_registration(temp_dir.path());
        let outcome = registration
            .try_register_with_oracle(&PidListOracle { dead: 102 }, None, Some("gpu-box"))
            .unwrap();
        assert_eq!(
            outcome,
            RegistrationOutcome::Registered(WorkerIdentity {
                worker_id: "gpu-box:1".to_string(),
                slot: 1,
            })
        );
        assert!(!dead.exists());
        assert_eq!(record_count(temp_dir.path()), 3);
    }

    #[test]
    fn test_orchestrated_scan_lists_workers_once() {
        use crate::registry::WorkerInfo;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingRegistry {
            calls: AtomicUsize,
        }

        impl WorkerRegistry for CountingRegistry {
            fn list_workers(&self) -> Result<Vec<WorkerInfo>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let own = std::process::id();
        for slot in 0..5 {
            write_record(temp_dir.path(), own, &format!("r{slot}"), &format!("w:{slot}"), slot);
        }

        let registry = CountingRegistry {
            calls: AtomicUsize::new(0),
        };
        let mut registration = Registration::builder()
            .registration_dir(RegistrationDir::orchestrated(temp_dir.path()))
            .poll_interval(Duration::from_millis(10))
            .build();
        let identity = registration
            .register_instance(None, Some("w"), Some(&registry))
            .unwrap();
        assert_eq!(identity.slot, 5);
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_registry_ignored_on_local_dir() {
        let temp_dir = TempDir::new().unwrap();
        write_record(temp_dir.path(), DEAD_PID, "a", "pod-a:0", 0);

        let registry = StaticWorkerRegistry::new(["pod-a:0"]);
        let mut registration = test_registration(temp_dir.path());
        let identity = registration
            .register_instance(None, Some("pod-b"), Some(&registry))
            .unwrap();
        assert_eq!(identity.slot, 0);
    }

    #[test]
    fn test_live_records_lists_and_reclaims() {
        let temp_dir = TempDir::new().unwrap();
        write_record(temp_dir.path(), std::process::id(), "a", "w:0", 0);
        let dead = write_record(temp_dir.path(), DEAD_PID, "b", "w:1", 1);

        let registration = test_registration(temp_dir.path());
        let live = registration.live_records(None).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].body.worker_id.as_deref(), Some("w:0"));
        assert!(!dead.exists());
    }
}
