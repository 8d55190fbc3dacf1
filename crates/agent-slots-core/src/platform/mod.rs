//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than being
//! scattered through the protocol code.
//!
//! - `paths` - where registration artifacts are stored
//! - `process` - process liveness checks

pub mod paths;
pub mod process;

pub use paths::{registration_dir, resolve_registration_dir, RegistrationDir};
pub use process::{current_pid, is_process_alive};
