//! Published report store.
//!
//! The consolidated report is the suite's only outward data surface:
//! one keyed entry in a TTL cache, overwritten each consolidation
//! cycle. Consumers (a dashboard, the CLI) read the key and never call
//! into the coordinator's internals.

use std::sync::Arc;
use std::time::Duration;

use dbtune_domain::constants::CONSOLIDATED_REPORT_KEY;
use dbtune_domain::types::OptimizationReport;
use moka::sync::Cache;
use tracing::debug;

/// TTL cache holding the published [`OptimizationReport`].
pub struct ReportStore {
    cache: Cache<String, Arc<OptimizationReport>>,
}

impl ReportStore {
    /// Create a store whose entries expire after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(8).time_to_live(ttl).build();
        Self { cache }
    }

    /// Publish a report, overwriting the previous snapshot.
    pub fn publish(&self, report: OptimizationReport) {
        debug!(report_id = %report.id, score = report.overall_score, "consolidated report published");
        self.cache.insert(CONSOLIDATED_REPORT_KEY.to_string(), Arc::new(report));
    }

    /// The latest published report, if one is live.
    pub fn latest(&self) -> Option<Arc<OptimizationReport>> {
        self.cache.get(CONSOLIDATED_REPORT_KEY)
    }
}
