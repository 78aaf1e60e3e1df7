//! Domain constants shared across the suite

/// Cache key under which the consolidated report is published.
pub const CONSOLIDATED_REPORT_KEY: &str = "optimization:consolidated-report";

/// How long a published consolidated report stays readable (seconds).
pub const REPORT_TTL_SECS: u64 = 600;

/// Execution count above which a window is considered query-heavy when
/// scoring (the score penalises executions beyond this baseline).
pub const SCORE_QUERY_BASELINE: u64 = 50;

/// Priority assigned to a foreign-key column lacking an index. Static
/// heuristic suggestions rank above any telemetry-derived candidate.
pub const FOREIGN_KEY_PRIORITY: f64 = 50.0;

/// Priority assigned to a unique column lacking an index.
pub const UNIQUE_COLUMN_PRIORITY: f64 = 25.0;

/// Maximum number of index suggestions retained per report.
pub const MAX_INDEX_SUGGESTIONS: usize = 20;
