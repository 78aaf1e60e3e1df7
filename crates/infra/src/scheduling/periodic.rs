//! Cancellable periodic task runner.
//!
//! Each background component loop is one `PeriodicTask`: a spawned tokio
//! task that sleeps for the configured period, runs its job under a
//! timeout, and checks a cancellation token at every suspension point.
//! A failed or timed-out iteration switches the next sleep to the
//! (typically shorter) retry period instead of terminating the loop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbtune_domain::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::error::{SchedulerError, SchedulerResult};

/// A unit of periodic maintenance work.
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Execute one iteration.
    async fn run(&self) -> Result<()>;
}

/// Configuration for a periodic task.
#[derive(Debug, Clone)]
pub struct PeriodicTaskConfig {
    /// Task name used in logs.
    pub name: &'static str,
    /// Sleep between successful iterations.
    pub period: Duration,
    /// Sleep after a failed or timed-out iteration.
    pub retry_period: Duration,
    /// Timeout applied to a single job execution.
    pub job_timeout: Duration,
    /// Timeout for awaiting the task join handle on stop.
    pub join_timeout: Duration,
}

impl Default for PeriodicTaskConfig {
    fn default() -> Self {
        Self {
            name: "periodic-task",
            period: Duration::from_secs(300),
            retry_period: Duration::from_secs(60),
            job_timeout: Duration::from_secs(300),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl PeriodicTaskConfig {
    /// Config with equal period and retry period.
    pub fn with_period(name: &'static str, period: Duration) -> Self {
        Self { name, period, retry_period: period, ..Self::default() }
    }
}

/// Periodic task with explicit lifecycle management.
pub struct PeriodicTask {
    config: PeriodicTaskConfig,
    job: Arc<dyn MaintenanceJob>,
    handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl PeriodicTask {
    /// Create a task; nothing runs until [`Self::start`].
    pub fn new(config: PeriodicTaskConfig, job: Arc<dyn MaintenanceJob>) -> Self {
        Self { config, job, handle: None, cancellation: CancellationToken::new() }
    }

    /// Task name.
    pub fn name(&self) -> &'static str {
        self.config.name
    }

    /// Spawn the loop.
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        self.cancellation = CancellationToken::new();
        let cancel = self.cancellation.clone();
        let config = self.config.clone();
        let job = Arc::clone(&self.job);

        let handle = tokio::spawn(async move {
            Self::run_loop(config, job, cancel).await;
        });
        self.handle = Some(handle);
        info!(task = self.config.name, period_secs = self.config.period.as_secs(), "periodic task started");
        Ok(())
    }

    /// Cancel the loop and join it, bounded by the join timeout.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.handle.take() else {
            return Err(SchedulerError::NotRunning);
        };
        self.cancellation.cancel();

        match tokio::time::timeout(self.config.join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(join_err)) => return Err(SchedulerError::TaskJoinFailed(join_err.to_string())),
            Err(_) => {
                return Err(SchedulerError::Timeout { seconds: self.config.join_timeout.as_secs() })
            }
        }
        info!(task = self.config.name, "periodic task stopped");
        Ok(())
    }

    /// Whether the loop task is active.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run exactly one iteration of the job, out of schedule, under the
    /// job timeout.
    pub async fn run_once(&self) -> Result<()> {
        match tokio::time::timeout(self.config.job_timeout, self.job.run()).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::Timeout {
                seconds: self.config.job_timeout.as_secs(),
            }
            .into()),
        }
    }

    async fn run_loop(config: PeriodicTaskConfig, job: Arc<dyn MaintenanceJob>, cancel: CancellationToken) {
        let mut delay = config.period;
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(task = config.name, "periodic task cancelled");
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            match tokio::time::timeout(config.job_timeout, job.run()).await {
                Ok(Ok(())) => {
                    debug!(task = config.name, "iteration finished");
                    delay = config.period;
                }
                Ok(Err(err)) => {
                    error!(task = config.name, error = %err, "iteration failed; backing off");
                    delay = config.retry_period;
                }
                Err(_) => {
                    warn!(
                        task = config.name,
                        timeout_secs = config.job_timeout.as_secs(),
                        "iteration timed out; backing off"
                    );
                    delay = config.retry_period;
                }
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        if self.is_running() {
            warn!(task = self.config.name, "periodic task dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dbtune_domain::OptimizerError;

    use super::*;

    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    impl CountingJob {
        fn new(fail: bool) -> Self {
            Self { runs: AtomicUsize::new(0), fail }
        }

        fn run_count(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MaintenanceJob for CountingJob {
        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(OptimizerError::Internal("job failed".into()));
            }
            Ok(())
        }
    }

    fn fast_config() -> PeriodicTaskConfig {
        PeriodicTaskConfig {
            name: "test-task",
            period: Duration::from_millis(20),
            retry_period: Duration::from_millis(20),
            job_timeout: Duration::from_secs(2),
            join_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lifecycle_runs_successfully() {
        let job = Arc::new(CountingJob::new(false));
        let mut task = PeriodicTask::new(fast_config(), job.clone());

        task.start().expect("start succeeds");
        tokio::time::sleep(Duration::from_millis(120)).await;
        task.stop().await.expect("stop succeeds");

        assert!(job.run_count() >= 1);
        assert!(!task.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn double_start_is_rejected() {
        let job = Arc::new(CountingJob::new(false));
        let mut task = PeriodicTask::new(fast_config(), job);

        task.start().expect("first start");
        let err = task.start().expect_err("second start fails");
        assert!(matches!(err, SchedulerError::AlreadyRunning));
        task.stop().await.expect("stop succeeds");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restart_after_stop_succeeds() {
        let job = Arc::new(CountingJob::new(false));
        let mut task = PeriodicTask::new(fast_config(), job);

        task.start().expect("start succeeds");
        task.stop().await.expect("stop succeeds");
        assert!(!task.is_running());

        task.start().expect("start again");
        task.stop().await.expect("stop again");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_job_keeps_the_loop_alive() {
        let job = Arc::new(CountingJob::new(true));
        let mut task = PeriodicTask::new(fast_config(), job.clone());

        task.start().expect("start succeeds");
        tokio::time::sleep(Duration::from_millis(120)).await;
        task.stop().await.expect("stop succeeds");

        assert!(job.run_count() >= 2, "loop should survive job failures");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_once_drives_a_single_iteration() {
        let job = Arc::new(CountingJob::new(false));
        let task = PeriodicTask::new(fast_config(), job.clone());

        task.run_once().await.expect("single iteration succeeds");
        assert_eq!(job.run_count(), 1);
        assert!(!task.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_without_start_errors() {
        let job = Arc::new(CountingJob::new(false));
        let mut task = PeriodicTask::new(fast_config(), job);
        let err = task.stop().await.expect_err("stop fails");
        assert!(matches!(err, SchedulerError::NotRunning));
    }
}
