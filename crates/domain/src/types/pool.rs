//! Connection pool statistics snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of one pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    /// Database alias this pool serves.
    pub alias: String,
    /// Idle connections ready to hand out.
    pub available: usize,
    /// Connections currently checked out.
    pub active: usize,
    /// `available + active`.
    pub total: usize,
    /// Configured ceiling.
    pub max_connections: u32,
    /// Configured floor maintained by the health check.
    pub min_connections: u32,
    /// Connections created over the pool's lifetime.
    pub connections_created: u64,
    /// Connections closed (invalid, over capacity, or idle-expired).
    pub connections_closed: u64,
    /// Acquire calls that timed out.
    pub acquire_timeouts: u64,
    /// Queries executed through pooled connections.
    pub queries_executed: u64,
    /// Average query time across pooled executions.
    pub avg_query_time_ms: f64,
}

impl PoolStats {
    /// Whether the pool currently holds its configured minimum.
    pub const fn meets_minimum(&self) -> bool {
        self.total >= self.min_connections as usize
    }
}

/// Aggregated snapshot across every pool the manager owns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolManagerStats {
    /// Per-alias snapshots.
    pub pools: Vec<PoolStats>,
    /// Sum of `total` across pools.
    pub total_connections: usize,
    /// Sum of `active` across pools.
    pub active_connections: usize,
    /// Number of pools.
    pub pool_count: usize,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl PoolManagerStats {
    /// Build the aggregate from per-pool snapshots.
    pub fn from_pools(pools: Vec<PoolStats>) -> Self {
        let total_connections = pools.iter().map(|p| p.total).sum();
        let active_connections = pools.iter().map(|p| p.active).sum();
        let pool_count = pools.len();
        Self { pools, total_connections, active_connections, pool_count, timestamp: Utc::now() }
    }

    /// Fraction of pools currently holding their configured minimum.
    /// 1.0 when no pools are configured (nothing can be unhealthy).
    pub fn health(&self) -> f64 {
        if self.pools.is_empty() {
            return 1.0;
        }
        let healthy = self.pools.iter().filter(|p| p.meets_minimum()).count();
        #[allow(clippy::cast_precision_loss)]
        let ratio = healthy as f64 / self.pools.len() as f64;
        ratio
    }
}
