//! Connection pool manager: one pool per configured database alias.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dbtune_core::ports::QueryExecutor;
use dbtune_core::telemetry::QueryTelemetryStore;
use dbtune_domain::config::{DatabaseConfig, PoolConfig};
use dbtune_domain::types::{PoolManagerStats, PoolStats};
use dbtune_domain::{OptimizerError, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::connection::ConnectionFactory;
use super::pool::{ConnectionPool, PooledHandle};
use crate::scheduling::{MaintenanceJob, PeriodicTask, PeriodicTaskConfig, SchedulerResult};

type PoolMap = Arc<RwLock<HashMap<String, Arc<ConnectionPool>>>>;

/// Owns one [`ConnectionPool`] per configured database, aggregates their
/// statistics, and runs the periodic health-check loop.
///
/// Lock granularity is per pool: the manager-level map lock is held only
/// to look a pool up, never across a health check or acquire.
pub struct ConnectionPoolManager {
    pools: PoolMap,
    factory: Arc<dyn ConnectionFactory>,
    config: PoolConfig,
    telemetry: Arc<QueryTelemetryStore>,
    health_task: Mutex<Option<PeriodicTask>>,
}

impl ConnectionPoolManager {
    /// Create a manager; pools are built by [`Self::initialize`].
    pub fn new(
        factory: Arc<dyn ConnectionFactory>,
        config: PoolConfig,
        telemetry: Arc<QueryTelemetryStore>,
    ) -> Self {
        Self {
            pools: Arc::new(RwLock::new(HashMap::new())),
            factory,
            config,
            telemetry,
            health_task: Mutex::new(None),
        }
    }

    /// Build one pool per configured database.
    ///
    /// Idempotent per alias: re-initializing an existing alias is a
    /// no-op. A pool that cannot establish its minimum connections is a
    /// fatal error here: startup is the one place pool bring-up failure
    /// propagates.
    pub fn initialize(&self, databases: &[DatabaseConfig]) -> Result<()> {
        for database in databases {
            if self.read_pools().contains_key(&database.alias) {
                debug!(alias = %database.alias, "pool already initialised; skipped");
                continue;
            }
            let pool = ConnectionPool::new(
                database.alias.clone(),
                self.config.clone(),
                Arc::clone(&self.factory),
            )?;
            self.write_pools().insert(database.alias.clone(), pool);
            info!(alias = %database.alias, "pool registered");
        }
        Ok(())
    }

    /// Start the background health-check loop.
    pub async fn start(&self) -> SchedulerResult<()> {
        let mut slot = self.health_task.lock().await;
        if slot.as_ref().is_some_and(PeriodicTask::is_running) {
            return Ok(());
        }
        let mut task = PeriodicTask::new(
            PeriodicTaskConfig {
                name: "pool-health-check",
                period: Duration::from_secs(self.config.health_check_interval_secs),
                ..PeriodicTaskConfig::default()
            },
            Arc::new(HealthCheckJob { pools: Arc::clone(&self.pools) }),
        );
        task.start()?;
        *slot = Some(task);
        Ok(())
    }

    /// Stop the health-check loop, joining it before returning.
    pub async fn stop(&self) -> SchedulerResult<()> {
        let task = self.health_task.lock().await.take();
        if let Some(mut task) = task {
            task.stop().await?;
        }
        Ok(())
    }

    /// Whether the health-check loop is running.
    pub async fn is_running(&self) -> bool {
        self.health_task.lock().await.as_ref().is_some_and(PeriodicTask::is_running)
    }

    /// Run one health check over every pool, synchronously.
    pub fn health_check_all(&self) {
        for pool in self.pool_snapshot() {
            pool.health_check();
        }
    }

    /// Look up the pool for `alias`.
    pub fn pool(&self, alias: &str) -> Result<Arc<ConnectionPool>> {
        self.read_pools()
            .get(alias)
            .cloned()
            .ok_or_else(|| OptimizerError::NotFound(format!("no pool for database '{alias}'")))
    }

    /// Check out a connection from the pool for `alias` using the
    /// configured acquire timeout.
    pub fn acquire(&self, alias: &str) -> Result<PooledHandle> {
        let pool = self.pool(alias)?;
        pool.acquire(Duration::from_millis(self.config.connection_timeout_ms))
    }

    /// Read-only snapshot of per-pool and aggregate statistics.
    pub fn stats(&self) -> PoolManagerStats {
        let mut pools: Vec<PoolStats> =
            self.pool_snapshot().iter().map(|pool| pool.stats()).collect();
        pools.sort_by(|a, b| a.alias.cmp(&b.alias));
        PoolManagerStats::from_pools(pools)
    }

    /// The shared telemetry store every pooled execution reports into.
    pub fn telemetry(&self) -> &Arc<QueryTelemetryStore> {
        &self.telemetry
    }

    fn pool_snapshot(&self) -> Vec<Arc<ConnectionPool>> {
        self.read_pools().values().cloned().collect()
    }

    fn read_pools(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ConnectionPool>>> {
        match self.pools.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("pool map lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_pools(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<ConnectionPool>>> {
        match self.pools.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("pool map lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl QueryExecutor for ConnectionPoolManager {
    /// Execute a query through the pool and feed the telemetry store.
    ///
    /// The driver layer does not expose rows-examined counts, so the
    /// observation records rows-sent for both sides (a neutral ratio);
    /// engines that do expose scan evidence report it through
    /// [`QueryTelemetryStore::record`] directly.
    async fn execute_query(
        &self,
        alias: &str,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<Vec<String>>> {
        let mut handle = self.acquire(alias)?;
        let started = Instant::now();
        let result = handle.execute(sql, params);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if let Ok(rows) = &result {
            let sent = rows.len() as u64;
            self.telemetry.record_query(sql, elapsed_ms, sent, sent);
        }
        result
    }
}

/// Periodic job invoking `health_check` on every pool.
struct HealthCheckJob {
    pools: PoolMap,
}

#[async_trait]
impl MaintenanceJob for HealthCheckJob {
    async fn run(&self) -> Result<()> {
        let pools: Vec<Arc<ConnectionPool>> = match self.pools.read() {
            Ok(guard) => guard.values().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
        };
        for pool in pools {
            pool.health_check();
        }
        Ok(())
    }
}
