//! Registration directory resolution.
//!
//! Workers on one machine share the platform temp directory. Under an
//! orchestrator the directory comes from the host mount variable instead,
//! which also switches on worker registry lookups during liveness checks.

use crate::config::RegistrationConfig;
use std::path::PathBuf;

/// Directory that holds the lock sentinel and registration records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationDir {
    pub path: PathBuf,
    /// True when the path came from the orchestration host mount.
    pub orchestrated: bool,
}

impl RegistrationDir {
    /// A plain local directory, no registry lookups.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            orchestrated: false,
        }
    }

    /// A directory shared through an orchestration mount.
    pub fn orchestrated(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            orchestrated: true,
        }
    }
}

/// Resolve the registration directory from the process environment.
pub fn registration_dir() -> RegistrationDir {
    resolve_registration_dir(std::env::var(RegistrationConfig::ENV_HOST_MOUNT).ok().as_deref())
}

/// Resolve the registration directory from a host mount value.
///
/// The mount value is colon-delimited (`/host/path:/mnt/path`); the last
/// segment is the path visible inside this process. An unset or empty value
/// selects the platform temp directory.
pub fn resolve_registration_dir(host_mount: Option<&str>) -> RegistrationDir {
    match host_mount.filter(|value| !value.is_empty()) {
        Some(value) => {
            let container_path = value.rsplit(':').next().unwrap_or(value);
            RegistrationDir::orchestrated(container_path)
        }
        None => RegistrationDir::local(std::env::temp_dir()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_mount_uses_temp_dir() {
        let dir = resolve_registration_dir(None);
        assert_eq!(dir.path, std::env::temp_dir());
        assert!(!dir.orchestrated);
    }

    #[test]
    fn test_empty_mount_uses_temp_dir() {
        let dir = resolve_registration_dir(Some(""));
        assert_eq!(dir, RegistrationDir::local(std::env::temp_dir()));
    }

    #[test]
    fn test_mount_takes_last_segment() {
        let dir = resolve_registration_dir(Some("/var/lib/agents:/mnt/agents"));
        assert_eq!(dir.path, PathBuf::from("/mnt/agents"));
        assert!(dir.orchestrated);
    }

    #[test]
    fn test_mount_without_separator() {
        let dir = resolve_registration_dir(Some("/shared"));
        assert_eq!(dir, RegistrationDir::orchestrated("/shared"));
    }
}
