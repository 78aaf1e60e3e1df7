//! Scheduler error types

use dbtune_domain::OptimizerError;
use thiserror::Error;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task is already running
    #[error("Task already running")]
    AlreadyRunning,

    /// Task is not running
    #[error("Task not running")]
    NotRunning,

    /// Operation timed out
    #[error("Operation timed out after {seconds}s")]
    Timeout {
        /// Seconds waited before giving up
        seconds: u64,
    },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for OptimizerError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                Self::InvalidInput(err.to_string())
            }
            SchedulerError::Timeout { .. } | SchedulerError::TaskJoinFailed(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
