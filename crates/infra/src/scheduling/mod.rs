//! Scheduling infrastructure for the background maintenance loops
//!
//! Every component loop (pool health check, query analysis, index
//! analysis, partitioning, consolidation) runs as a [`PeriodicTask`]:
//! a tokio task driven by a plain ticker with explicit lifecycle
//! management: join handles are tracked, cancellation is explicit, and
//! every job execution is wrapped in a timeout. Single cycles can be
//! driven directly through the job, so tests never wait on wall-clock
//! timers.

pub mod error;
pub mod periodic;

pub use error::{SchedulerError, SchedulerResult};
pub use periodic::{MaintenanceJob, PeriodicTask, PeriodicTaskConfig};
