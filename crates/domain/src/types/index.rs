//! Schema metadata and index suggestion types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One column of a table as reported by schema introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Owning table.
    pub table: String,
    /// Column name.
    pub name: String,
    /// Engine-reported type name.
    pub data_type: String,
    /// Part of the primary key.
    pub is_primary_key: bool,
    /// Covered by a unique constraint or unique index.
    pub is_unique: bool,
    /// References another table.
    pub is_foreign_key: bool,
    /// Leading column of at least one index.
    pub has_index: bool,
}

/// One index as reported by schema introspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Owning table.
    pub table: String,
    /// Index name.
    pub name: String,
    /// Indexed columns, in key order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

impl IndexMeta {
    /// Whether this index can serve lookups on `column` (it is the
    /// leading key column).
    pub fn covers(&self, column: &str) -> bool {
        self.columns.first().is_some_and(|c| c.eq_ignore_ascii_case(column))
    }
}

/// Engine-level usage counters for one index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexUsageRecord {
    /// Owning table.
    pub table: String,
    /// Index name.
    pub index_name: String,
    /// Read operations served by the index.
    pub read_count: u64,
    /// Row fetches through the index.
    pub fetch_count: u64,
    /// Write-side maintenance operations.
    pub write_count: u64,
    /// Start of the observation window for these counters.
    pub observed_since: DateTime<Utc>,
}

/// Recommended action for an index suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexAction {
    /// Create the index.
    Create,
    /// The index appears unused; a human should consider dropping it.
    ConsiderDrop,
}

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionOrigin {
    /// Derived from query telemetry evidence.
    Telemetry,
    /// Foreign-key column lacking an index (static schema heuristic).
    ForeignKey,
    /// Unique column lacking an index (static schema heuristic).
    UniqueColumn,
    /// Engine usage counters show the index idle.
    UsageCounters,
}

/// A scored (table, column) index candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSuggestion {
    /// Target table.
    pub table: String,
    /// Target column (or index name for `ConsiderDrop`).
    pub column: String,
    /// Weighted heuristic combining suggestion frequency, query volume,
    /// and latency impact; recalculated every analysis cycle.
    pub priority_score: f64,
    /// Distinct digests that produced this candidate.
    pub suggestion_count: u64,
    /// Total executions of those digests.
    pub total_query_count: u64,
    /// Running average latency of those digests.
    pub avg_impact_ms: f64,
    /// Recommended action.
    pub action: IndexAction,
    /// Evidence source.
    pub origin: SuggestionOrigin,
}

/// Outcome of one attempted index creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Target table.
    pub table: String,
    /// Target column.
    pub column: String,
    /// Name the index was created under.
    pub index_name: String,
    /// Whether the DDL succeeded.
    pub created: bool,
    /// Failure detail when `created` is false.
    pub error: Option<String>,
}

/// Index advisor report for one analysis cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReport {
    /// When the cycle ran.
    pub generated_at: DateTime<Utc>,
    /// Candidates recommended for creation, highest priority first.
    pub recommended: Vec<IndexSuggestion>,
    /// Indexes reported idle by engine usage counters.
    pub unused: Vec<IndexSuggestion>,
    /// Count of recommendations above the high-priority bar.
    pub high_priority_count: usize,
}

impl IndexReport {
    /// Empty report (used when introspection is unavailable for a cycle).
    pub fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            recommended: Vec::new(),
            unused: Vec::new(),
            high_priority_count: 0,
        }
    }
}
