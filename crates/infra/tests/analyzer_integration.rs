//! End-to-end query pattern analysis scenarios over a live telemetry
//! store.

use std::sync::Arc;

use dbtune_core::analyzer::QueryPatternAnalyzer;
use dbtune_core::telemetry::QueryTelemetryStore;
use dbtune_domain::config::{AnalyzerConfig, TelemetryConfig};
use dbtune_domain::types::{QueryFlag, SuggestionKind};

fn analyzer() -> (Arc<QueryTelemetryStore>, QueryPatternAnalyzer) {
    let store = Arc::new(QueryTelemetryStore::new(TelemetryConfig::default()));
    let analyzer = QueryPatternAnalyzer::new(Arc::clone(&store), AnalyzerConfig::default());
    (store, analyzer)
}

#[test]
fn twelve_in_list_recordings_yield_one_n_plus_one_and_one_inefficiency() {
    let (store, analyzer) = analyzer();
    for i in 0..12 {
        store.record_query(
            &format!("SELECT * FROM items WHERE owner_id IN ({i}, {})", i + 1),
            5.0,
            50,
            1,
        );
    }

    let report = analyzer.analyze();

    let n_plus_one: Vec<_> =
        report.flagged.iter().filter(|f| f.flag == QueryFlag::NPlusOne).collect();
    let inefficient: Vec<_> =
        report.flagged.iter().filter(|f| f.flag == QueryFlag::Inefficient).collect();
    assert_eq!(n_plus_one.len(), 1, "exactly one N+1 suggestion: {report:#?}");
    assert_eq!(inefficient.len(), 1, "exactly one inefficiency suggestion: {report:#?}");
    assert_eq!(report.flagged.len(), 2, "no other flags expected");

    // 12 rows sent over 600 examined.
    assert!((inefficient[0].efficiency_ratio - 0.02).abs() < 1e-9);
    assert_eq!(
        n_plus_one[0].suggestion.as_ref().map(|s| s.kind),
        Some(SuggestionKind::BatchLoad),
    );
}

#[test]
fn n_plus_one_threshold_is_strictly_greater_than() {
    for (executions, expected_flags) in [(3_u64, 0_usize), (10, 0), (11, 1), (15, 1)] {
        let (store, analyzer) = analyzer();
        for i in 0..executions {
            store.record_query(
                &format!("SELECT id FROM orders WHERE user_id IN ({i})"),
                1.0,
                1,
                1,
            );
        }
        let report = analyzer.analyze();
        assert_eq!(
            report.n_plus_one_count(),
            expected_flags,
            "{executions} executions should produce {expected_flags} N+1 flags"
        );
    }
}

#[test]
fn score_degrades_with_flagged_patterns() {
    let (store, analyzer) = analyzer();
    let clean_score = analyzer.analyze().performance_score;
    assert_eq!(clean_score, 100);

    for i in 0..15 {
        store.record_query(&format!("SELECT * FROM t WHERE id IN ({i})"), 150.0, 50, 1);
    }
    let report = analyzer.analyze();
    assert!(report.performance_score < clean_score);
    // One N+1 flag (−2) and one slow flag (−5); 15 executions stay under
    // the query-count baseline.
    assert_eq!(report.performance_score, 93);
}

#[test]
fn window_isolation_keeps_distinct_digests_apart() {
    let (store, analyzer) = analyzer();
    for i in 0..12 {
        store.record_query(&format!("SELECT * FROM a WHERE id IN ({i})"), 1.0, 1, 1);
    }
    for i in 0..4 {
        store.record_query(&format!("SELECT * FROM b WHERE id IN ({i})"), 1.0, 1, 1);
    }

    let report = analyzer.analyze();
    assert_eq!(report.unique_digests, 2);
    assert_eq!(report.n_plus_one_count(), 1, "only the hot digest is flagged");
    assert!(report.flagged.iter().all(|f| f.digest.contains("FROM a")));
}
