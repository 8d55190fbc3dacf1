//! Centralized configuration for slot registration.
//!
//! The file naming constants are an on-disk contract shared by every agent
//! that registers in the same directory. Changing them splits the slot space.

use std::time::Duration;

/// Protocol constants for registration artifacts.
pub struct RegistrationConfig;

impl RegistrationConfig {
    /// Leading part of every registration record file name.
    pub const RECORD_PREFIX: &'static str = ".trainsagent";
    /// Separator between the prefix, the owner pid, and the random suffix.
    pub const RECORD_SEP: &'static str = "_";
    pub const RECORD_EXT: &'static str = ".tmp";
    /// Joins a worker name and its slot into a worker id (`name:2`).
    pub const WORKER_NAME_SEP: &'static str = ":";
    pub const LOCK_FILE_NAME: &'static str = "_.trainsagent_global.lock";

    pub const LOCK_POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

    /// Orchestration host mount, `host_path:container_path` style.
    pub const ENV_HOST_MOUNT: &'static str = "TRAINS_AGENT_K8S_HOST_MOUNT";
}

/// Configuration for the worker registry HTTP client.
pub struct RegistryConfig;

impl RegistryConfig {
    /// Registry lookups run under the global lock, so this stays well below
    /// `RegistrationConfig::LOCK_TIMEOUT`.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);
    pub const WORKERS_ENDPOINT: &'static str = "workers.get_all";
    pub const USER_AGENT: &'static str = "agent-slots/0.1";
}

/// Timing of the global lock wait loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Delay between two checks for the sentinel file.
    pub poll_interval: Duration,
    /// How long a sentinel may block us before it is considered stale.
    pub timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            poll_interval: RegistrationConfig::LOCK_POLL_INTERVAL,
            timeout: RegistrationConfig::LOCK_TIMEOUT,
        }
    }
}
