//! Cross-process global lock backed by a sentinel file.
//!
//! The sentinel's existence means some process is inside the registration
//! critical section. Waiters poll for it to disappear. A sentinel that blocks
//! a waiter for longer than the configured timeout is assumed to belong to a
//! crashed holder and is cleared unilaterally.
//!
//! A holder that is merely slow past the timeout can end up sharing the lock.

use crate::config::{LockOptions, RegistrationConfig};
use crate::error::{Result, SlotError};
use crate::platform;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;
use tracing::{debug, warn};

/// The global registration lock for one directory.
#[derive(Debug, Clone)]
pub struct GlobalLock {
    path: PathBuf,
    options: LockOptions,
}

impl GlobalLock {
    pub fn new(dir: &Path, options: LockOptions) -> Self {
        Self {
            path: dir.join(RegistrationConfig::LOCK_FILE_NAME),
            options,
        }
    }

    /// Path of the sentinel file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.path.exists()
    }

    /// Block until the sentinel can be created, then create it.
    ///
    /// The returned guard removes the sentinel when released or dropped.
    pub fn acquire(&self) -> Result<LockGuard> {
        let mut waited = Duration::ZERO;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&self.path) {
                Ok(file) => return Ok(self.hold(file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(SlotError::io_with_path(e, &self.path)),
            }

            if waited > self.options.timeout {
                warn!(
                    "Lock file timed out {:?} - clearing lock {}",
                    self.options.timeout,
                    self.path.display()
                );
                return self.force_acquire();
            }

            sleep(self.options.poll_interval);
            waited += self.options.poll_interval;
        }
    }

    /// Clear a stale sentinel and take the lock regardless of who holds it.
    fn force_acquire(&self) -> Result<LockGuard> {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                debug!("Failed to remove stale lock {}: {}", self.path.display(), e);
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| SlotError::io_with_path(e, &self.path))?;
        Ok(self.hold(file))
    }

    fn hold(&self, mut file: File) -> LockGuard {
        // The pid is informational; release does not check ownership.
        if let Err(e) = write!(file, "{}", platform::current_pid()).and_then(|_| file.flush()) {
            debug!("Failed to write pid into lock {}: {}", self.path.display(), e);
        }
        debug!("Acquired registration lock {}", self.path.display());
        LockGuard {
            path: self.path.clone(),
            released: false,
        }
    }
}

/// Held registration lock. Removes the sentinel on release or drop.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Remove the sentinel now. Removal failures are ignored.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released registration lock {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => debug!("Failed to remove lock {}: {}", self.path.display(), e),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.remove();
    }
}
