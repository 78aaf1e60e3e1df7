//! Configuration structures for the optimization suite
//!
//! Every empirically chosen threshold (N+1 count, slow-query latency,
//! priority cutoffs) lives here as a configuration default rather than a
//! hard-coded constant, so deployments can tune them per workload.

use serde::{Deserialize, Serialize};

use crate::constants::REPORT_TTL_SECS;
use crate::types::PartitionPolicy;

/// Top-level configuration for the optimization suite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Databases the pool manager serves, one pool per alias.
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
    /// Connection pool sizing and timeouts (shared by every pool).
    #[serde(default)]
    pub pool: PoolConfig,
    /// Query telemetry retention.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Query pattern analysis thresholds.
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Index advisor thresholds.
    #[serde(default)]
    pub advisor: AdvisorConfig,
    /// Tables under automatic partition management.
    #[serde(default)]
    pub partitions: Vec<PartitionPolicy>,
    /// Coordinator cycle periods.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// One managed database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Logical alias the rest of the suite refers to this database by.
    pub alias: String,
    /// Engine-specific connection target (a file path for SQLite).
    pub path: String,
}

/// Connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Connections the health check keeps available at minimum.
    pub min_connections: u32,
    /// Hard cap on `available + active` connections.
    pub max_connections: u32,
    /// Default acquire timeout in milliseconds.
    pub connection_timeout_ms: u64,
    /// Idle connections older than this are closed by the health check
    /// (never below `min_connections`).
    pub idle_timeout_secs: u64,
    /// Period of the background health-check loop.
    pub health_check_interval_secs: u64,
    /// Connection-creation attempts before acquire gives up.
    pub retry_attempts: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 5,
            max_connections: 20,
            connection_timeout_ms: 10_000,
            idle_timeout_secs: 300,
            health_check_interval_secs: 60,
            retry_attempts: 3,
        }
    }
}

/// Query telemetry store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Entry cap; least-recently-seen digests are evicted beyond it.
    pub max_entries: usize,
    /// Rolling window; digests unseen for longer are pruned.
    pub window_secs: u64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { max_entries: 1000, window_secs: 1800 }
    }
}

/// Query pattern analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Period of the analysis loop in seconds.
    pub interval_secs: u64,
    /// An `IN`-filtered digest executed strictly more than this many times
    /// within the window is flagged as an N+1 suspect.
    pub n_plus_one_threshold: u64,
    /// Average latency above which a digest is flagged slow.
    pub slow_query_ms: f64,
    /// `rows_examined / max(rows_sent, 1)` above which a digest is flagged
    /// inefficient.
    pub inefficiency_ratio: f64,
    /// Digests with fewer samples than this are never flagged.
    pub min_samples: u64,
    /// How many frequent-and-slow digests the report lists.
    pub frequent_limit: usize,
    /// Average latency a frequent digest must exceed to be listed.
    pub frequent_slow_ms: f64,
    /// How many slowest digests the report lists.
    pub slowest_limit: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            n_plus_one_threshold: 10,
            slow_query_ms: 100.0,
            inefficiency_ratio: 10.0,
            min_samples: 2,
            frequent_limit: 20,
            frequent_slow_ms: 50.0,
            slowest_limit: 10,
        }
    }
}

/// Index advisor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Period of the index analysis loop in seconds.
    pub interval_secs: u64,
    /// Telemetry digests must exceed this execution count to contribute
    /// index candidates.
    pub min_query_count: u64,
    /// Candidates below this priority score are discarded.
    pub priority_threshold: f64,
    /// Suggestions above this score are eligible for automatic creation.
    pub auto_create_threshold: f64,
    /// Minimum average latency impact for automatic creation.
    pub auto_create_min_impact_ms: f64,
    /// Suggestions applied per `apply_top_suggestions` batch.
    pub apply_limit: usize,
    /// Indexes with fewer reads than this count as unused.
    pub unused_read_threshold: u64,
    /// Indexes with fewer fetches than this count as unused.
    pub unused_fetch_threshold: u64,
    /// Days of observation before an index may be reported unused.
    pub unused_observation_days: i64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1800,
            min_query_count: 5,
            priority_threshold: 5.0,
            auto_create_threshold: 20.0,
            auto_create_min_impact_ms: 200.0,
            apply_limit: 10,
            unused_read_threshold: 10,
            unused_fetch_threshold: 10,
            unused_observation_days: 7,
        }
    }
}

/// Coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Period of the consolidation loop in seconds.
    pub consolidation_interval_secs: u64,
    /// Period of the partition maintenance loop in seconds.
    pub partition_interval_secs: u64,
    /// Retry period after a failed partition maintenance iteration.
    pub partition_retry_secs: u64,
    /// TTL of the published consolidated report in seconds.
    pub report_ttl_secs: u64,
    /// How many future periods the partition manager materialises.
    pub months_ahead: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            consolidation_interval_secs: 300,
            partition_interval_secs: 86_400,
            partition_retry_secs: 3_600,
            report_ttl_secs: REPORT_TTL_SECS,
            months_ahead: 3,
        }
    }
}
