//! Agent Slots - worker identity and slot registration for cooperating agent
//! processes on one host.
//!
//! Each worker process obtains a unique worker id and the lowest free slot
//! number without a central coordinator. Coordination happens through a
//! shared registration directory:
//!
//! - a sentinel lock file serializes registrations across processes
//! - one record file per live worker stores `worker_id` and `slot`
//! - records of dead processes are reclaimed on the next registration
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_slots::Registration;
//!
//! let mut registration = Registration::from_env();
//! let identity = registration
//!     .register_instance(None, Some("gpu-box"), None)
//!     .expect("registration failed");
//! println!("worker {} slot {}", identity.worker_id, identity.slot);
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod liveness;
pub mod lock;
pub mod platform;
pub mod publisher;
pub mod record;
pub mod registration;
pub mod registry;
pub mod scanner;

// Re-export commonly used types
pub use allocator::SlotTable;
pub use config::{LockOptions, RegistrationConfig};
pub use error::{Result, SlotError};
pub use liveness::{LivenessOracle, SystemLiveness};
pub use lock::{GlobalLock, LockGuard};
pub use platform::RegistrationDir;
pub use record::{RecordBody, RegistrationRecord};
pub use registration::{Registration, RegistrationBuilder, RegistrationOutcome, WorkerIdentity};
pub use registry::{ApiWorkerRegistry, StaticWorkerRegistry, WorkerInfo, WorkerRegistry};
pub use scanner::{ScanReport, Scanner};
