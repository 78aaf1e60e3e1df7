//! Query pattern analyzer service.

use std::sync::{Arc, RwLock};

use dbtune_domain::config::AnalyzerConfig;
use dbtune_domain::constants::SCORE_QUERY_BASELINE;
use dbtune_domain::types::{
    AnalyzerReport, DigestSummary, FlaggedQuery, Impact, PatternKind, QueryFlag, QueryStat,
    SnapshotOrder, Suggestion, SuggestionKind,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::telemetry::QueryTelemetryStore;

// Compile-time constant; covered by unit tests.
#[allow(clippy::expect_used)]
static EQUALITY_FILTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)WHERE\s+\w+\s*=").expect("static pattern must compile"));

/// Analyzes recent query telemetry for repeated-pattern (N+1) and
/// inefficient-scan shapes.
///
/// Suggestions produced here are descriptive data only; nothing is ever
/// applied to the database by this component.
pub struct QueryPatternAnalyzer {
    store: Arc<QueryTelemetryStore>,
    config: AnalyzerConfig,
    last_report: RwLock<Option<AnalyzerReport>>,
}

impl QueryPatternAnalyzer {
    /// Create an analyzer over the shared telemetry store.
    pub fn new(store: Arc<QueryTelemetryStore>, config: AnalyzerConfig) -> Self {
        Self { store, config, last_report: RwLock::new(None) }
    }

    /// Run one analysis pass over the current telemetry window and cache
    /// the resulting report.
    pub fn analyze(&self) -> AnalyzerReport {
        let stats = self.store.snapshot(usize::MAX, SnapshotOrder::ByCount);
        let total_executions: u64 = stats.iter().map(|s| s.count).sum();

        let mut flagged = Vec::new();
        for stat in &stats {
            // Cold-cache guard: a digest with a single sample is never
            // enough evidence to flag.
            if stat.count < self.config.min_samples {
                continue;
            }
            if stat.pattern == PatternKind::InQuery && stat.count > self.config.n_plus_one_threshold
            {
                debug!(digest = %stat.digest, count = stat.count, "N+1 suspect");
                flagged.push(self.flag(stat, QueryFlag::NPlusOne));
            }
            if stat.avg_latency_ms > self.config.slow_query_ms {
                warn!(
                    digest = %stat.digest,
                    avg_ms = stat.avg_latency_ms,
                    "slow query pattern detected"
                );
                flagged.push(self.flag(stat, QueryFlag::Slow));
            }
            if stat.examined_per_sent() > self.config.inefficiency_ratio {
                warn!(
                    digest = %stat.digest,
                    ratio = stat.examined_per_sent(),
                    "inefficient query pattern detected"
                );
                flagged.push(self.flag(stat, QueryFlag::Inefficient));
            }
        }

        let frequent_slow: Vec<DigestSummary> = stats
            .iter()
            .filter(|s| s.avg_latency_ms > self.config.frequent_slow_ms)
            .take(self.config.frequent_limit)
            .map(summary)
            .collect();

        let mut by_latency = stats.clone();
        by_latency.sort_by(|a, b| {
            b.avg_latency_ms.partial_cmp(&a.avg_latency_ms).unwrap_or(std::cmp::Ordering::Equal)
        });
        let slowest: Vec<DigestSummary> =
            by_latency.iter().take(self.config.slowest_limit).map(summary).collect();

        let n_plus_one = flagged.iter().filter(|f| f.flag == QueryFlag::NPlusOne).count();
        let slow = flagged.iter().filter(|f| f.flag == QueryFlag::Slow).count();
        let score = performance_score(total_executions, n_plus_one, slow);

        let report = AnalyzerReport {
            generated_at: chrono::Utc::now(),
            total_executions,
            unique_digests: stats.len(),
            flagged,
            frequent_slow,
            slowest,
            performance_score: score,
        };

        info!(
            digests = report.unique_digests,
            flagged = report.flagged.len(),
            score = report.performance_score,
            "query pattern analysis complete"
        );

        self.cache_report(report.clone());
        report
    }

    /// Most recent cached report, if a cycle has run.
    pub fn latest_report(&self) -> Option<AnalyzerReport> {
        match self.last_report.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn cache_report(&self, report: AnalyzerReport) {
        match self.last_report.write() {
            Ok(mut guard) => *guard = Some(report),
            Err(poisoned) => *poisoned.into_inner() = Some(report),
        }
    }

    fn flag(&self, stat: &QueryStat, flag: QueryFlag) -> FlaggedQuery {
        FlaggedQuery {
            digest: stat.digest.clone(),
            pattern: stat.pattern,
            flag,
            count: stat.count,
            avg_latency_ms: stat.avg_latency_ms,
            efficiency_ratio: stat.efficiency_ratio(),
            suggestion: suggestion_for(stat),
        }
    }
}

/// Window performance score in `[0, 100]`:
/// `100 − min(30, excess) − min(40, 2×n1) − min(20, 5×slow)`, where
/// `excess` is executions beyond the baseline.
pub fn performance_score(total_executions: u64, n_plus_one: usize, slow: usize) -> u8 {
    let excess = i64::try_from(total_executions.saturating_sub(SCORE_QUERY_BASELINE))
        .unwrap_or(i64::MAX)
        .min(30);
    let n1_penalty = i64::try_from(n_plus_one).unwrap_or(i64::MAX).saturating_mul(2).min(40);
    let slow_penalty = i64::try_from(slow).unwrap_or(i64::MAX).saturating_mul(5).min(20);
    let score = (100 - excess - n1_penalty - slow_penalty).clamp(0, 100);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = score as u8;
    score
}

fn summary(stat: &QueryStat) -> DigestSummary {
    DigestSummary {
        digest: stat.digest.clone(),
        pattern: stat.pattern,
        count: stat.count,
        avg_latency_ms: stat.avg_latency_ms,
    }
}

/// Remediation for a flagged digest, keyed off its structural shape.
fn suggestion_for(stat: &QueryStat) -> Option<Suggestion> {
    match stat.pattern {
        PatternKind::JoinQuery => Some(Suggestion {
            kind: SuggestionKind::EagerLoad,
            description: "use eager-loading for the related entity instead of per-row joins".into(),
            impact: Impact::High,
        }),
        PatternKind::InQuery => Some(Suggestion {
            kind: SuggestionKind::BatchLoad,
            description: "batch-load the reverse relation instead of one IN query per outer row"
                .into(),
            impact: Impact::High,
        }),
        PatternKind::SelectAll => Some(Suggestion {
            kind: SuggestionKind::ProjectColumns,
            description: "project only the needed columns instead of SELECT *".into(),
            impact: Impact::Medium,
        }),
        PatternKind::BulkInsert | PatternKind::UpdateQuery | PatternKind::Other => {
            EQUALITY_FILTER.is_match(&stat.digest).then(|| Suggestion {
                kind: SuggestionKind::AddIndex,
                description: "add an index on the equality-filtered column".into(),
                impact: Impact::High,
            })
        }
    }
}
