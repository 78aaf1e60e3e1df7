//! Analyzer and consolidated report types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::partition::PartitionReport;
use super::pool::PoolManagerStats;
use super::telemetry::PatternKind;
use super::IndexReport;

/// Why a digest was flagged by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFlag {
    /// High-frequency `IN`-filtered digest: the N+1 fingerprint.
    NPlusOne,
    /// Average latency above the slow-query threshold.
    Slow,
    /// Examined-to-sent row ratio above the inefficiency threshold.
    Inefficient,
}

/// Kind of remediation a suggestion describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Eager-load the related entity instead of joining per row.
    EagerLoad,
    /// Batch-load the reverse relation instead of one `IN` query per row.
    BatchLoad,
    /// Project only the needed columns.
    ProjectColumns,
    /// Add an index on the filtered column.
    AddIndex,
}

/// Expected impact of applying a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    /// Large expected win.
    High,
    /// Moderate expected win.
    Medium,
    /// Small expected win.
    Low,
}

/// A remediation attached to a flagged digest. Descriptive data only -
/// never applied automatically by the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Remediation category.
    pub kind: SuggestionKind,
    /// Human-readable description.
    pub description: String,
    /// Expected impact.
    pub impact: Impact,
}

/// One digest the analyzer flagged, with its evidence and remediation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedQuery {
    /// Normalized statement text.
    pub digest: String,
    /// Structural classification.
    pub pattern: PatternKind,
    /// Why it was flagged.
    pub flag: QueryFlag,
    /// Executions within the window.
    pub count: u64,
    /// Average latency per execution.
    pub avg_latency_ms: f64,
    /// `rows_sent / max(rows_examined, 1)` at flag time.
    pub efficiency_ratio: f64,
    /// Remediation, when one of the known shapes applies.
    pub suggestion: Option<Suggestion>,
}

/// Compact digest line for the top-N report sections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestSummary {
    /// Normalized statement text.
    pub digest: String,
    /// Structural classification.
    pub pattern: PatternKind,
    /// Executions within the window.
    pub count: u64,
    /// Average latency per execution.
    pub avg_latency_ms: f64,
}

/// Query pattern analyzer report for one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerReport {
    /// When the cycle ran.
    pub generated_at: DateTime<Utc>,
    /// Total executions across every digest in the window.
    pub total_executions: u64,
    /// Distinct digests in the window.
    pub unique_digests: usize,
    /// Every flagged digest with its remediation.
    pub flagged: Vec<FlaggedQuery>,
    /// Most frequent digests whose average latency is also concerning.
    pub frequent_slow: Vec<DigestSummary>,
    /// Slowest digests by average latency.
    pub slowest: Vec<DigestSummary>,
    /// Window performance score, 0 (bad) to 100 (healthy).
    pub performance_score: u8,
}

impl AnalyzerReport {
    /// Empty report with a perfect score (nothing observed, nothing wrong).
    pub fn empty() -> Self {
        Self {
            generated_at: Utc::now(),
            total_executions: 0,
            unique_digests: 0,
            flagged: Vec::new(),
            frequent_slow: Vec::new(),
            slowest: Vec::new(),
            performance_score: 100,
        }
    }

    /// Digests flagged as N+1 suspects.
    pub fn n_plus_one_count(&self) -> usize {
        self.flagged.iter().filter(|f| f.flag == QueryFlag::NPlusOne).count()
    }

    /// Digests flagged slow.
    pub fn slow_count(&self) -> usize {
        self.flagged.iter().filter(|f| f.flag == QueryFlag::Slow).count()
    }
}

/// The consolidated snapshot published each coordination cycle.
///
/// Rebuilt wholesale every cycle; the previous report is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Report identity, fresh per cycle.
    pub id: Uuid,
    /// When the consolidation ran.
    pub generated_at: DateTime<Utc>,
    /// Pool manager snapshot.
    pub pool: PoolManagerStats,
    /// Latest analyzer report.
    pub analyzer: AnalyzerReport,
    /// Latest index advisor report.
    pub index: IndexReport,
    /// Latest partition manager report.
    pub partitions: PartitionReport,
    /// Weighted overall score, 0–100.
    pub overall_score: u8,
}
