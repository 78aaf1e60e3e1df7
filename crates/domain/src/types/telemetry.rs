//! Query telemetry types
//!
//! A *digest* is a normalized form of a SQL statement with literals and
//! numeric IDs replaced by placeholders; it is the grouping key for all
//! telemetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One executed-query observation emitted by the driver layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryObservation {
    /// Raw SQL text; normalized into a digest on ingestion.
    pub sql: String,
    /// Wall-clock execution time in milliseconds.
    pub elapsed_ms: f64,
    /// Rows the engine examined to produce the result.
    pub rows_examined: u64,
    /// Rows returned to the client.
    pub rows_sent: u64,
    /// Full table scans the engine reported for this statement.
    pub scan_count: u64,
    /// Joins executed without a usable index.
    pub full_join_count: u64,
}

impl QueryObservation {
    /// Observation without engine scan evidence.
    pub fn new(sql: impl Into<String>, elapsed_ms: f64, rows_examined: u64, rows_sent: u64) -> Self {
        Self {
            sql: sql.into(),
            elapsed_ms,
            rows_examined,
            rows_sent,
            scan_count: 0,
            full_join_count: 0,
        }
    }

    /// Attach engine scan evidence to the observation.
    #[must_use]
    pub const fn with_scan_evidence(mut self, scan_count: u64, full_join_count: u64) -> Self {
        self.scan_count = scan_count;
        self.full_join_count = full_join_count;
        self
    }
}

/// Structural classification of a normalized query.
///
/// Produced by text matching on the digest, not by a SQL parser; the
/// categories mirror the access patterns the analyzer knows how to flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// `SELECT` with one or more joins.
    JoinQuery,
    /// `SELECT` filtered by an `IN (...)` list: the N+1 fingerprint.
    InQuery,
    /// `SELECT *` projection.
    SelectAll,
    /// Multi-row `INSERT`.
    BulkInsert,
    /// `UPDATE` with a `WHERE` clause.
    UpdateQuery,
    /// Anything else.
    Other,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::JoinQuery => "join_query",
            Self::InQuery => "in_query",
            Self::SelectAll => "select_all",
            Self::BulkInsert => "bulk_insert",
            Self::UpdateQuery => "update_query",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Aggregated statistics for one digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStat {
    /// Normalized statement text (the grouping key).
    pub digest: String,
    /// Structural classification of the digest.
    pub pattern: PatternKind,
    /// Executions observed within the window.
    pub count: u64,
    /// Cumulative latency across executions.
    pub total_latency_ms: f64,
    /// Average latency per execution.
    pub avg_latency_ms: f64,
    /// Cumulative rows examined.
    pub rows_examined: u64,
    /// Cumulative rows sent.
    pub rows_sent: u64,
    /// Cumulative full-scan evidence.
    pub scan_count: u64,
    /// Cumulative full-join evidence.
    pub full_join_count: u64,
    /// First time this digest was observed.
    pub first_seen: DateTime<Utc>,
    /// Most recent observation; drives window eviction.
    pub last_seen: DateTime<Utc>,
}

impl QueryStat {
    /// `rows_sent / max(rows_examined, 1)`: fraction of examined rows the
    /// query actually returned. 1.0 is a perfectly targeted query.
    pub fn efficiency_ratio(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.rows_sent as f64 / self.rows_examined.max(1) as f64;
        ratio
    }

    /// `rows_examined / max(rows_sent, 1)`: rows scanned per row returned.
    pub fn examined_per_sent(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.rows_examined as f64 / self.rows_sent.max(1) as f64;
        ratio
    }

    /// Whether the engine reported any scan or full-join evidence.
    pub const fn has_scan_evidence(&self) -> bool {
        self.scan_count > 0 || self.full_join_count > 0
    }
}

/// Ordering key for telemetry snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrder {
    /// Most frequently executed digests first.
    ByCount,
    /// Highest average latency first.
    ByLatency,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(examined: u64, sent: u64) -> QueryStat {
        QueryStat {
            digest: "SELECT * FROM t WHERE id = ?".into(),
            pattern: PatternKind::Other,
            count: 1,
            total_latency_ms: 1.0,
            avg_latency_ms: 1.0,
            rows_examined: examined,
            rows_sent: sent,
            scan_count: 0,
            full_join_count: 0,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn efficiency_ratio_divides_sent_by_examined() {
        assert!((stat(600, 12).efficiency_ratio() - 0.02).abs() < 1e-9);
        assert!((stat(0, 5).efficiency_ratio() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn examined_per_sent_guards_zero_sent() {
        assert!((stat(50, 0).examined_per_sent() - 50.0).abs() < 1e-9);
        assert!((stat(50, 1).examined_per_sent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn pattern_kind_display_is_snake_case() {
        assert_eq!(PatternKind::InQuery.to_string(), "in_query");
        assert_eq!(PatternKind::SelectAll.to_string(), "select_all");
    }
}
