//! Process-wide, time-windowed query statistics store.
//!
//! Writers are per-in-flight-query, so the store is sharded (dashmap)
//! rather than guarded by a single mutex. Readers get point-in-time
//! copies, never live views.

use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use dbtune_domain::config::TelemetryConfig;
use dbtune_domain::types::{QueryObservation, QueryStat, SnapshotOrder};
use tracing::debug;

use crate::analyzer::classify;
use crate::telemetry::normalize_sql;

/// Time-windowed cache of per-digest query statistics.
pub struct QueryTelemetryStore {
    entries: DashMap<String, QueryStat>,
    config: TelemetryConfig,
}

impl QueryTelemetryStore {
    /// Create a store with the given retention configuration.
    pub fn new(config: TelemetryConfig) -> Self {
        Self { entries: DashMap::new(), config }
    }

    /// Record one executed-query observation.
    ///
    /// The statement is normalized into its digest and the matching
    /// [`QueryStat`] is updated atomically (inserted on first sight).
    pub fn record(&self, observation: QueryObservation) {
        let digest = normalize_sql(&observation.sql);
        if digest.is_empty() {
            return;
        }
        let now = Utc::now();

        self.entries
            .entry(digest.clone())
            .and_modify(|stat| {
                stat.count += 1;
                stat.total_latency_ms += observation.elapsed_ms;
                #[allow(clippy::cast_precision_loss)]
                let count = stat.count as f64;
                stat.avg_latency_ms = stat.total_latency_ms / count;
                stat.rows_examined += observation.rows_examined;
                stat.rows_sent += observation.rows_sent;
                stat.scan_count += observation.scan_count;
                stat.full_join_count += observation.full_join_count;
                stat.last_seen = now;
            })
            .or_insert_with(|| QueryStat {
                pattern: classify(&digest),
                digest,
                count: 1,
                total_latency_ms: observation.elapsed_ms,
                avg_latency_ms: observation.elapsed_ms,
                rows_examined: observation.rows_examined,
                rows_sent: observation.rows_sent,
                scan_count: observation.scan_count,
                full_join_count: observation.full_join_count,
                first_seen: now,
                last_seen: now,
            });

        if self.entries.len() > self.config.max_entries {
            self.evict_oldest();
        }
    }

    /// Record a query without engine scan evidence: the common path for
    /// driver-level instrumentation.
    pub fn record_query(&self, sql: &str, elapsed_ms: f64, rows_examined: u64, rows_sent: u64) {
        self.record(QueryObservation::new(sql, elapsed_ms, rows_examined, rows_sent));
    }

    /// Point-in-time copy of up to `limit` entries in the requested order.
    ///
    /// Entries outside the rolling window are pruned first.
    pub fn snapshot(&self, limit: usize, order: SnapshotOrder) -> Vec<QueryStat> {
        self.prune_expired();
        let mut stats: Vec<QueryStat> = self.entries.iter().map(|e| e.value().clone()).collect();
        match order {
            SnapshotOrder::ByCount => stats.sort_by(|a, b| b.count.cmp(&a.count)),
            SnapshotOrder::ByLatency => {
                stats.sort_by(|a, b| {
                    b.avg_latency_ms
                        .partial_cmp(&a.avg_latency_ms)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }
        stats.truncate(limit);
        stats
    }

    /// Point-in-time copy of every live entry, ordered by count.
    pub fn snapshot_all(&self) -> Vec<QueryStat> {
        self.snapshot(usize::MAX, SnapshotOrder::ByCount)
    }

    /// Total executions across every live digest.
    pub fn total_executions(&self) -> u64 {
        self.entries.iter().map(|e| e.value().count).sum()
    }

    /// Number of live digests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no digests.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Remove entries unseen for longer than the rolling window.
    fn prune_expired(&self) {
        // chrono stores durations in milliseconds; clamp far below the
        // representable bound so enormous configured windows stay valid.
        let secs = i64::try_from(self.config.window_secs).unwrap_or(i64::MAX / 2_000).min(i64::MAX / 2_000);
        let cutoff = Utc::now() - ChronoDuration::seconds(secs);
        let before = self.entries.len();
        self.entries.retain(|_, stat| stat.last_seen >= cutoff);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "pruned expired telemetry digests");
        }
    }

    /// Evict least-recently-seen entries until the cap is respected.
    fn evict_oldest(&self) {
        while self.entries.len() > self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().last_seen)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    debug!(digest = %key, "evicted telemetry digest over entry cap");
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> QueryTelemetryStore {
        QueryTelemetryStore::new(TelemetryConfig::default())
    }

    #[test]
    fn repeated_statements_aggregate_under_one_digest() {
        let store = store();
        store.record_query("SELECT * FROM users WHERE id = 1", 10.0, 5, 1);
        store.record_query("SELECT * FROM users WHERE id = 2", 30.0, 5, 1);

        assert_eq!(store.len(), 1);
        let stats = store.snapshot_all();
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].avg_latency_ms - 20.0).abs() < 1e-9);
        assert_eq!(stats[0].rows_examined, 10);
    }

    #[test]
    fn snapshot_orders_by_count_or_latency() {
        let store = store();
        store.record_query("SELECT a FROM x WHERE id = 1", 5.0, 1, 1);
        store.record_query("SELECT a FROM x WHERE id = 2", 5.0, 1, 1);
        store.record_query("SELECT b FROM y WHERE id = 3", 80.0, 1, 1);

        let by_count = store.snapshot(10, SnapshotOrder::ByCount);
        assert!(by_count[0].digest.contains("FROM x"));

        let by_latency = store.snapshot(10, SnapshotOrder::ByLatency);
        assert!(by_latency[0].digest.contains("FROM y"));
    }

    #[test]
    fn entry_cap_evicts_least_recently_seen_first() {
        let store = QueryTelemetryStore::new(TelemetryConfig { max_entries: 2, window_secs: 3600 });
        store.record_query("SELECT 1 FROM a WHERE x = 1", 1.0, 1, 1);
        store.record_query("SELECT 1 FROM b WHERE x = 1", 1.0, 1, 1);
        // Touch the first digest so the second is now the oldest.
        store.record_query("SELECT 1 FROM a WHERE x = 2", 1.0, 1, 1);
        store.record_query("SELECT 1 FROM c WHERE x = 1", 1.0, 1, 1);

        assert_eq!(store.len(), 2);
        let digests: Vec<String> = store.snapshot_all().into_iter().map(|s| s.digest).collect();
        assert!(digests.iter().any(|d| d.contains("FROM a")));
        assert!(digests.iter().any(|d| d.contains("FROM c")));
        assert!(!digests.iter().any(|d| d.contains("FROM b")));
    }

    #[test]
    fn scan_evidence_accumulates() {
        let store = store();
        store.record(
            QueryObservation::new("SELECT * FROM t WHERE a = 1", 1.0, 100, 1)
                .with_scan_evidence(1, 0),
        );
        store.record(
            QueryObservation::new("SELECT * FROM t WHERE a = 2", 1.0, 100, 1)
                .with_scan_evidence(2, 1),
        );

        let stats = store.snapshot_all();
        assert_eq!(stats[0].scan_count, 3);
        assert_eq!(stats[0].full_join_count, 1);
        assert!(stats[0].has_scan_evidence());
    }

    #[test]
    fn concurrent_recording_is_lossless() {
        use std::sync::Arc;

        let store = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    let sql = format!("SELECT * FROM t{} WHERE id = {}", i % 2, j);
                    store.record_query(&sql, 1.0, 1, 1);
                }
            }));
        }
        for handle in handles {
            handle.join().expect("writer thread should finish");
        }

        assert_eq!(store.total_executions(), 800);
        assert_eq!(store.len(), 2);
    }
}
