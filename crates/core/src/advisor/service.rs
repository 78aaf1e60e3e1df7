//! Index advisor service.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{Duration as ChronoDuration, Utc};
use dbtune_domain::config::AdvisorConfig;
use dbtune_domain::constants::{
    FOREIGN_KEY_PRIORITY, MAX_INDEX_SUGGESTIONS, UNIQUE_COLUMN_PRIORITY,
};
use dbtune_domain::types::{
    ApplyOutcome, IndexAction, IndexReport, IndexSuggestion, SuggestionOrigin,
};
use dbtune_domain::{OptimizerError, Result};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::advisor::extract_candidate_columns;
use crate::ports::{SchemaAdmin, SchemaIntrospection};
use crate::telemetry::QueryTelemetryStore;

/// Suggestions above this score count as high priority in the report
/// summary.
const HIGH_PRIORITY_BAR: f64 = 15.0;

#[derive(Debug, Default, Clone)]
struct CandidateStats {
    suggestion_count: u64,
    total_query_count: u64,
    avg_impact_ms: f64,
}

/// Scores candidate columns for indexing and applies high-confidence
/// suggestions.
///
/// Consumes telemetry plus schema metadata; all DDL goes through the
/// [`SchemaAdmin`] port. Candidate accumulation is guarded by an async
/// mutex so forced and scheduled cycles can overlap safely.
pub struct IndexAdvisor {
    store: Arc<QueryTelemetryStore>,
    introspection: Arc<dyn SchemaIntrospection>,
    admin: Arc<dyn SchemaAdmin>,
    config: AdvisorConfig,
    candidates: Mutex<HashMap<(String, String), CandidateStats>>,
    last_report: RwLock<Option<IndexReport>>,
}

impl IndexAdvisor {
    /// Create an advisor over the shared telemetry store and schema ports.
    pub fn new(
        store: Arc<QueryTelemetryStore>,
        introspection: Arc<dyn SchemaIntrospection>,
        admin: Arc<dyn SchemaAdmin>,
        config: AdvisorConfig,
    ) -> Self {
        Self {
            store,
            introspection,
            admin,
            config,
            candidates: Mutex::new(HashMap::new()),
            last_report: RwLock::new(None),
        }
    }

    /// Run one analysis cycle and cache the resulting report.
    ///
    /// Schema introspection failure degrades to an empty report for this
    /// cycle rather than propagating.
    pub async fn run_cycle(&self) -> IndexReport {
        let report = match self.build_report().await {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "schema introspection unavailable; no index suggestions this cycle");
                IndexReport::empty()
            }
        };
        self.cache_report(report.clone());
        report
    }

    /// Most recent cached report, if a cycle has run.
    pub fn latest_report(&self) -> Option<IndexReport> {
        match self.last_report.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Apply the top `limit` recommendations whose priority score exceeds
    /// `auto_create_threshold` (telemetry-derived candidates also need
    /// the configured minimum latency impact).
    ///
    /// Every creation is attempted independently: one failure never
    /// aborts the remaining batch, and every attempt is reported back.
    pub async fn apply_top_suggestions(
        &self,
        limit: usize,
        auto_create_threshold: f64,
    ) -> Vec<ApplyOutcome> {
        let report = match self.latest_report() {
            Some(report) => report,
            None => self.run_cycle().await,
        };

        let mut outcomes = Vec::new();
        // Telemetry-derived candidates additionally need a meaningful
        // latency impact before being created unattended; static schema
        // heuristics (FK/unique) are structural and always eligible.
        let min_impact = self.config.auto_create_min_impact_ms;
        let eligible = report
            .recommended
            .iter()
            .filter(|s| s.action == IndexAction::Create && s.priority_score > auto_create_threshold)
            .filter(|s| s.origin != SuggestionOrigin::Telemetry || s.avg_impact_ms > min_impact)
            .take(limit);

        for suggestion in eligible {
            let index_name = format!("idx_{}_{}", suggestion.table, suggestion.column);
            let outcome =
                match self.admin.create_index(&index_name, &suggestion.table, &suggestion.column).await
                {
                    Ok(()) => {
                        info!(index = %index_name, "created recommended index");
                        ApplyOutcome {
                            table: suggestion.table.clone(),
                            column: suggestion.column.clone(),
                            index_name,
                            created: true,
                            error: None,
                        }
                    }
                    Err(err) => {
                        error!(index = %index_name, error = %err, "index creation failed");
                        ApplyOutcome {
                            table: suggestion.table.clone(),
                            column: suggestion.column.clone(),
                            index_name,
                            created: false,
                            error: Some(err.to_string()),
                        }
                    }
                };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Cross-reference engine usage counters for indexes that look idle
    /// over the observation window. Reported as `ConsiderDrop`, never
    /// dropped automatically.
    pub async fn identify_unused_indexes(&self) -> Vec<IndexSuggestion> {
        let records = match self.introspection.index_usage_stats().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "index usage counters unavailable");
                return Vec::new();
            }
        };

        let window = ChronoDuration::days(self.config.unused_observation_days);
        let cutoff = Utc::now() - window;
        records
            .into_iter()
            .filter(|r| {
                r.read_count < self.config.unused_read_threshold
                    && r.fetch_count < self.config.unused_fetch_threshold
                    && r.observed_since <= cutoff
            })
            .map(|r| IndexSuggestion {
                table: r.table,
                column: r.index_name,
                priority_score: 0.0,
                suggestion_count: 0,
                total_query_count: r.read_count + r.fetch_count,
                avg_impact_ms: 0.0,
                action: IndexAction::ConsiderDrop,
                origin: SuggestionOrigin::UsageCounters,
            })
            .collect()
    }

    async fn build_report(&self) -> Result<IndexReport> {
        let mut suggestions: HashMap<(String, String), IndexSuggestion> = HashMap::new();

        self.accumulate_telemetry_candidates().await;
        self.collect_telemetry_suggestions(&mut suggestions).await?;
        self.collect_static_suggestions(&mut suggestions).await?;

        let mut recommended: Vec<IndexSuggestion> = suggestions.into_values().collect();
        recommended.sort_by(|a, b| {
            b.priority_score.partial_cmp(&a.priority_score).unwrap_or(std::cmp::Ordering::Equal)
        });
        recommended.truncate(MAX_INDEX_SUGGESTIONS);

        let unused = self.identify_unused_indexes().await;
        let high_priority_count =
            recommended.iter().filter(|s| s.priority_score > HIGH_PRIORITY_BAR).count();

        info!(
            recommended = recommended.len(),
            unused = unused.len(),
            "index analysis complete"
        );

        Ok(IndexReport { generated_at: Utc::now(), recommended, unused, high_priority_count })
    }

    /// Fold the current telemetry window into the running candidate
    /// accumulator.
    async fn accumulate_telemetry_candidates(&self) {
        let stats = self.store.snapshot_all();
        let mut candidates = self.candidates.lock().await;
        for stat in stats {
            if !stat.has_scan_evidence() || stat.count <= self.config.min_query_count {
                continue;
            }
            for column_ref in extract_candidate_columns(&stat.digest) {
                let entry = candidates
                    .entry((column_ref.table, column_ref.column))
                    .or_insert_with(CandidateStats::default);
                entry.suggestion_count += 1;
                entry.total_query_count += stat.count;
                #[allow(clippy::cast_precision_loss)]
                let count = entry.suggestion_count as f64;
                entry.avg_impact_ms =
                    (entry.avg_impact_ms * (count - 1.0) + stat.avg_latency_ms) / count;
            }
        }
    }

    async fn collect_telemetry_suggestions(
        &self,
        suggestions: &mut HashMap<(String, String), IndexSuggestion>,
    ) -> Result<()> {
        let candidates = self.candidates.lock().await.clone();
        for ((table, column), stats) in candidates {
            let score = priority_score(&stats);
            if score <= self.config.priority_threshold {
                continue;
            }
            if self.index_exists(&table, &column).await? {
                debug!(table = %table, column = %column, "candidate already indexed; skipped");
                continue;
            }
            suggestions.insert(
                (table.clone(), column.clone()),
                IndexSuggestion {
                    table,
                    column,
                    priority_score: score,
                    suggestion_count: stats.suggestion_count,
                    total_query_count: stats.total_query_count,
                    avg_impact_ms: stats.avg_impact_ms,
                    action: IndexAction::Create,
                    origin: SuggestionOrigin::Telemetry,
                },
            );
        }
        Ok(())
    }

    /// Static schema heuristics: foreign-key and unique columns lacking
    /// an index are always surfaced, regardless of telemetry.
    async fn collect_static_suggestions(
        &self,
        suggestions: &mut HashMap<(String, String), IndexSuggestion>,
    ) -> Result<()> {
        let tables = self.introspection.list_tables().await?;
        for table in tables {
            let columns = match self.introspection.list_schema_columns(&table).await {
                Ok(columns) => columns,
                Err(err) => {
                    warn!(table = %table, error = %err, "column introspection failed; table skipped");
                    continue;
                }
            };
            for column in columns {
                if column.has_index || column.is_primary_key {
                    continue;
                }
                let (score, origin) = if column.is_foreign_key {
                    (FOREIGN_KEY_PRIORITY, SuggestionOrigin::ForeignKey)
                } else if column.is_unique {
                    (UNIQUE_COLUMN_PRIORITY, SuggestionOrigin::UniqueColumn)
                } else {
                    continue;
                };
                let key = (table.clone(), column.name.clone());
                let entry = suggestions.entry(key).or_insert(IndexSuggestion {
                    table: table.clone(),
                    column: column.name,
                    priority_score: score,
                    suggestion_count: 0,
                    total_query_count: 0,
                    avg_impact_ms: 0.0,
                    action: IndexAction::Create,
                    origin,
                });
                // A static heuristic outranks telemetry evidence for the
                // same pair.
                if entry.priority_score < score {
                    entry.priority_score = score;
                    entry.origin = origin;
                }
            }
        }
        Ok(())
    }

    async fn index_exists(&self, table: &str, column: &str) -> Result<bool> {
        let indexes = self.introspection.list_indexes(table).await.map_err(|err| {
            OptimizerError::SchemaIntrospection(format!("list_indexes({table}): {err}"))
        })?;
        Ok(indexes.iter().any(|idx| idx.covers(column)))
    }

    fn cache_report(&self, report: IndexReport) {
        match self.last_report.write() {
            Ok(mut guard) => *guard = Some(report),
            Err(poisoned) => *poisoned.into_inner() = Some(report),
        }
    }
}

/// Priority score: `0.3×suggestion_count + 0.4×total_query_count +
/// 0.3×(avg_impact_ms / 100)`.
fn priority_score(stats: &CandidateStats) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let score = 0.3 * stats.suggestion_count as f64
        + 0.4 * stats.total_query_count as f64
        + 0.3 * (stats.avg_impact_ms / 100.0);
    score
}
