//! Partition policy and maintenance reporting types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Partitioning period for a managed table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionPeriod {
    /// One partition per calendar month (`table_YYYY_MM`).
    Monthly,
    /// One partition per calendar quarter (`table_YYYY_Qn`).
    Quarterly,
}

/// Static partitioning policy for one table. Read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionPolicy {
    /// Base table under management.
    pub table: String,
    /// Column the partitions are keyed on.
    pub partition_column: String,
    /// Partition granularity.
    pub period: PartitionPeriod,
    /// Months of data kept (partitions plus archives).
    pub retention_months: u32,
    /// Months after which a partition is copied to its archive table and
    /// dropped.
    pub archive_after_months: u32,
}

/// Outcome of archiving one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    /// Source partition table.
    pub partition: String,
    /// Destination archive table.
    pub archive_table: String,
    /// Rows present in the archive after the copy.
    pub rows_copied: u64,
    /// Rows present in the source before the copy.
    pub source_rows: u64,
    /// Whether the source partition was dropped.
    pub dropped: bool,
    /// Failure detail, when any step failed.
    pub error: Option<String>,
}

/// Per-table partition statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStats {
    /// Base table.
    pub table: String,
    /// Materialised partitions currently present.
    pub partition_count: usize,
    /// Whether the partition covering the current period exists.
    pub current_period_covered: bool,
}

/// Partition manager report across all policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionReport {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Per-table statistics.
    pub tables: Vec<PartitionStats>,
}

impl PartitionReport {
    /// Empty report.
    pub fn empty() -> Self {
        Self { generated_at: Utc::now(), tables: Vec::new() }
    }

    /// Fraction of managed tables whose current-period partition exists.
    /// 1.0 when no tables are managed.
    pub fn health(&self) -> f64 {
        if self.tables.is_empty() {
            return 1.0;
        }
        let covered = self.tables.iter().filter(|t| t.current_period_covered).count();
        #[allow(clippy::cast_precision_loss)]
        let ratio = covered as f64 / self.tables.len() as f64;
        ratio
    }
}
