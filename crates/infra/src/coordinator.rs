//! Optimization coordinator.
//!
//! The explicit suite aggregate: owns the pool manager, telemetry
//! store, analyzer, advisor, partition manager, and report store, plus
//! the background loops driving them. Constructed once by the
//! application's startup routine and passed by handle: there is no
//! ambient global state, so construction and teardown are clean in
//! tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbtune_core::advisor::IndexAdvisor;
use dbtune_core::analyzer::QueryPatternAnalyzer;
use dbtune_core::partition::PartitionManager;
use dbtune_core::ports::{SchemaAdmin, SchemaIntrospection};
use dbtune_core::report::build_report;
use dbtune_core::telemetry::QueryTelemetryStore;
use dbtune_domain::config::SuiteConfig;
use dbtune_domain::types::{ApplyOutcome, IndexReport, OptimizationReport};
use dbtune_domain::{OptimizerError, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::pool::{ConnectionFactory, ConnectionPoolManager};
use crate::report_store::ReportStore;
use crate::scheduling::{MaintenanceJob, PeriodicTask, PeriodicTaskConfig};

/// Options for [`OptimizationCoordinator::initialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InitializeOptions {
    /// Skip starting partition maintenance (and its initial pass).
    pub skip_partitioning: bool,
}

/// Running/stopped state of one component loop.
#[derive(Debug, Clone)]
pub struct ComponentStatus {
    /// Loop name.
    pub name: String,
    /// Whether its background task is active.
    pub running: bool,
}

/// Top-level orchestrator for the optimization suite.
pub struct OptimizationCoordinator {
    config: SuiteConfig,
    pool_manager: Arc<ConnectionPoolManager>,
    telemetry: Arc<QueryTelemetryStore>,
    analyzer: Arc<QueryPatternAnalyzer>,
    advisor: Arc<IndexAdvisor>,
    partitions: Arc<PartitionManager>,
    reports: Arc<ReportStore>,
    consolidator: Arc<Consolidator>,
    tasks: Mutex<Vec<PeriodicTask>>,
    initialized: AtomicBool,
    shut_down: AtomicBool,
}

impl OptimizationCoordinator {
    /// Construct the suite from its configuration and driver ports.
    /// Nothing starts until [`Self::initialize`].
    pub fn new(
        config: SuiteConfig,
        factory: Arc<dyn ConnectionFactory>,
        introspection: Arc<dyn SchemaIntrospection>,
        admin: Arc<dyn SchemaAdmin>,
    ) -> Self {
        let telemetry = Arc::new(QueryTelemetryStore::new(config.telemetry.clone()));
        let pool_manager = Arc::new(ConnectionPoolManager::new(
            factory,
            config.pool.clone(),
            Arc::clone(&telemetry),
        ));
        let analyzer =
            Arc::new(QueryPatternAnalyzer::new(Arc::clone(&telemetry), config.analyzer.clone()));
        let advisor = Arc::new(IndexAdvisor::new(
            Arc::clone(&telemetry),
            Arc::clone(&introspection),
            Arc::clone(&admin),
            config.advisor.clone(),
        ));
        let partitions = Arc::new(PartitionManager::new(
            admin,
            introspection,
            config.partitions.clone(),
            config.coordinator.months_ahead,
        ));
        let reports =
            Arc::new(ReportStore::new(Duration::from_secs(config.coordinator.report_ttl_secs)));
        let consolidator = Arc::new(Consolidator {
            pool_manager: Arc::clone(&pool_manager),
            analyzer: Arc::clone(&analyzer),
            advisor: Arc::clone(&advisor),
            partitions: Arc::clone(&partitions),
            reports: Arc::clone(&reports),
            cycle_lock: Mutex::new(()),
        });

        Self {
            config,
            pool_manager,
            telemetry,
            analyzer,
            advisor,
            partitions,
            reports,
            consolidator,
            tasks: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Construct and start every component in dependency order (pools →
    /// partitioning → analyzer → advisor → consolidation), then run one
    /// synchronous initial analysis pass and publish a first report.
    ///
    /// # Errors
    /// Pool bring-up failure (a configured database whose pool cannot
    /// establish its minimum connections) is fatal and propagates;
    /// everything after that point degrades per component instead.
    pub async fn initialize(&self, options: InitializeOptions) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            warn!("optimization suite already initialized");
            return Ok(());
        }
        info!("initializing optimization suite");

        self.pool_manager.initialize(&self.config.databases)?;
        self.pool_manager.start().await?;

        {
            let mut tasks = self.tasks.lock().await;
            if !options.skip_partitioning {
                tasks.push(self.spawn_task(
                    PeriodicTaskConfig {
                        name: "partition-maintenance",
                        period: Duration::from_secs(self.config.coordinator.partition_interval_secs),
                        retry_period: Duration::from_secs(self.config.coordinator.partition_retry_secs),
                        job_timeout: Duration::from_secs(600),
                        ..PeriodicTaskConfig::default()
                    },
                    Arc::new(PartitionJob { partitions: Arc::clone(&self.partitions) }),
                )?);
            }
            tasks.push(self.spawn_task(
                PeriodicTaskConfig::with_period(
                    "query-analysis",
                    Duration::from_secs(self.config.analyzer.interval_secs),
                ),
                Arc::new(AnalyzerJob { analyzer: Arc::clone(&self.analyzer) }),
            )?);
            tasks.push(self.spawn_task(
                PeriodicTaskConfig::with_period(
                    "index-analysis",
                    Duration::from_secs(self.config.advisor.interval_secs),
                ),
                Arc::new(AdvisorJob { advisor: Arc::clone(&self.advisor) }),
            )?);
            tasks.push(self.spawn_task(
                PeriodicTaskConfig::with_period(
                    "consolidation",
                    Duration::from_secs(self.config.coordinator.consolidation_interval_secs),
                ),
                Arc::new(ConsolidationJob { consolidator: Arc::clone(&self.consolidator) }),
            )?);
        }

        // Initial analysis pass: one synchronous cycle of every component
        // so a first report exists before any timer fires.
        self.analyzer.analyze();
        self.advisor.run_cycle().await;
        if !options.skip_partitioning {
            let created = self.partitions.create_future_partitions().await;
            if !created.is_empty() {
                info!(created = created.len(), "initial partitions created");
            }
        }
        self.consolidator.consolidate().await;

        info!("optimization suite initialized");
        Ok(())
    }

    /// Merge the latest component reports and publish the consolidated
    /// snapshot, overwriting the previous one.
    pub async fn run_consolidation_cycle(&self) -> OptimizationReport {
        self.consolidator.consolidate().await
    }

    /// Synchronously run one pass of every component's analysis step out
    /// of schedule. Safe to call concurrently with the scheduled loops.
    pub async fn force_optimization_cycle(&self) -> OptimizationReport {
        info!("forced optimization cycle");
        self.analyzer.analyze();
        self.advisor.run_cycle().await;
        self.partitions.create_future_partitions().await;
        self.consolidator.consolidate().await
    }

    /// Apply the advisor's top suggestions using the configured limits.
    pub async fn apply_top_index_suggestions(&self) -> Vec<ApplyOutcome> {
        self.advisor
            .apply_top_suggestions(
                self.config.advisor.apply_limit,
                self.config.advisor.auto_create_threshold,
            )
            .await
    }

    /// Stop every component loop and join them. Callable once; further
    /// calls are no-ops.
    pub async fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("shutting down optimization suite");

        let mut tasks = self.tasks.lock().await;
        for mut task in tasks.drain(..) {
            let name = task.name();
            if let Err(err) = task.stop().await {
                warn!(task = name, error = %err, "component loop stop failed");
            }
        }
        drop(tasks);

        if let Err(err) = self.pool_manager.stop().await {
            warn!(error = %err, "health-check loop stop failed");
        }
        info!("optimization suite shut down");
        Ok(())
    }

    /// Running state of every component loop.
    pub async fn component_status(&self) -> Vec<ComponentStatus> {
        let mut statuses = vec![ComponentStatus {
            name: "pool-health-check".into(),
            running: self.pool_manager.is_running().await,
        }];
        for task in self.tasks.lock().await.iter() {
            statuses.push(ComponentStatus { name: task.name().into(), running: task.is_running() });
        }
        statuses
    }

    /// The shared telemetry store.
    pub fn telemetry(&self) -> &Arc<QueryTelemetryStore> {
        &self.telemetry
    }

    /// The pool manager.
    pub fn pool_manager(&self) -> &Arc<ConnectionPoolManager> {
        &self.pool_manager
    }

    /// The query pattern analyzer.
    pub fn analyzer(&self) -> &Arc<QueryPatternAnalyzer> {
        &self.analyzer
    }

    /// The index advisor.
    pub fn advisor(&self) -> &Arc<IndexAdvisor> {
        &self.advisor
    }

    /// The partition manager.
    pub fn partition_manager(&self) -> &Arc<PartitionManager> {
        &self.partitions
    }

    /// The published report store.
    pub fn reports(&self) -> &Arc<ReportStore> {
        &self.reports
    }

    fn spawn_task(
        &self,
        config: PeriodicTaskConfig,
        job: Arc<dyn MaintenanceJob>,
    ) -> Result<PeriodicTask> {
        let mut task = PeriodicTask::new(config, job);
        task.start().map_err(OptimizerError::from)?;
        Ok(task)
    }
}

/// Merges component reports into the published consolidated snapshot.
///
/// The cycle lock keeps forced and scheduled consolidations from
/// interleaving their reads and publishes.
struct Consolidator {
    pool_manager: Arc<ConnectionPoolManager>,
    analyzer: Arc<QueryPatternAnalyzer>,
    advisor: Arc<IndexAdvisor>,
    partitions: Arc<PartitionManager>,
    reports: Arc<ReportStore>,
    cycle_lock: Mutex<()>,
}

impl Consolidator {
    async fn consolidate(&self) -> OptimizationReport {
        let _cycle = self.cycle_lock.lock().await;

        let pool = self.pool_manager.stats();
        // The consolidated report always reflects the best available
        // data: a component whose latest cycle failed contributes its
        // previous report (or an empty one), never a stale error.
        let analyzer = self.analyzer.latest_report().unwrap_or_else(|| self.analyzer.analyze());
        let index = self.advisor.latest_report().unwrap_or_else(IndexReport::empty);
        let partitions = self.partitions.partition_stats().await;

        let report = build_report(pool, analyzer, index, partitions);
        self.reports.publish(report.clone());
        report
    }
}

struct AnalyzerJob {
    analyzer: Arc<QueryPatternAnalyzer>,
}

#[async_trait]
impl MaintenanceJob for AnalyzerJob {
    async fn run(&self) -> Result<()> {
        self.analyzer.analyze();
        Ok(())
    }
}

struct AdvisorJob {
    advisor: Arc<IndexAdvisor>,
}

#[async_trait]
impl MaintenanceJob for AdvisorJob {
    async fn run(&self) -> Result<()> {
        self.advisor.run_cycle().await;
        Ok(())
    }
}

struct PartitionJob {
    partitions: Arc<PartitionManager>,
}

#[async_trait]
impl MaintenanceJob for PartitionJob {
    async fn run(&self) -> Result<()> {
        self.partitions.run_cycle().await
    }
}

struct ConsolidationJob {
    consolidator: Arc<Consolidator>,
}

#[async_trait]
impl MaintenanceJob for ConsolidationJob {
    async fn run(&self) -> Result<()> {
        self.consolidator.consolidate().await;
        Ok(())
    }
}
