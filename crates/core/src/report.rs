//! Consolidated report assembly.

use dbtune_domain::types::{
    AnalyzerReport, IndexReport, OptimizationReport, PartitionReport, PoolManagerStats,
};
use uuid::Uuid;

/// Weight of the analyzer score in the overall score.
const ANALYZER_WEIGHT: f64 = 0.6;
/// Weight of pool health in the overall score.
const POOL_WEIGHT: f64 = 0.2;
/// Weight of partition health in the overall score.
const PARTITION_WEIGHT: f64 = 0.2;

/// Merge the latest component reports into one consolidated snapshot.
pub fn build_report(
    pool: PoolManagerStats,
    analyzer: AnalyzerReport,
    index: IndexReport,
    partitions: PartitionReport,
) -> OptimizationReport {
    let overall_score =
        overall_score(analyzer.performance_score, pool.health(), partitions.health());
    OptimizationReport {
        id: Uuid::new_v4(),
        generated_at: chrono::Utc::now(),
        pool,
        analyzer,
        index,
        partitions,
        overall_score,
    }
}

/// Weighted overall score: `0.6×analyzer + 0.2×pool_health +
/// 0.2×partition_health`, each health in `[0, 1]` scaled to 100.
pub fn overall_score(analyzer_score: u8, pool_health: f64, partition_health: f64) -> u8 {
    let score = ANALYZER_WEIGHT * f64::from(analyzer_score)
        + POOL_WEIGHT * pool_health.clamp(0.0, 1.0) * 100.0
        + PARTITION_WEIGHT * partition_health.clamp(0.0, 1.0) * 100.0;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = score.round().clamp(0.0, 100.0) as u8;
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overall_score_is_weighted_combination() {
        assert_eq!(overall_score(100, 1.0, 1.0), 100);
        assert_eq!(overall_score(0, 0.0, 0.0), 0);
        // 0.6*50 + 0.2*100 + 0.2*0 = 50
        assert_eq!(overall_score(50, 1.0, 0.0), 50);
        // 0.6*80 + 0.2*50 + 0.2*100 = 48 + 10 + 20
        assert_eq!(overall_score(80, 0.5, 1.0), 78);
    }

    #[test]
    fn build_report_embeds_component_reports() {
        let report = build_report(
            PoolManagerStats::from_pools(vec![]),
            AnalyzerReport::empty(),
            IndexReport::empty(),
            PartitionReport::empty(),
        );
        assert_eq!(report.overall_score, 100);
        assert_eq!(report.analyzer.performance_score, 100);
    }
}
