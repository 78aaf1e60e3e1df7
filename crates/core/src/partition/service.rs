//! Partition manager service.

use std::sync::Arc;

use chrono::{Months, Utc};
use dbtune_domain::types::{ArchiveOutcome, PartitionPolicy, PartitionReport, PartitionStats};
use dbtune_domain::{OptimizerError, Result};
use tracing::{debug, error, info, warn};

use crate::partition::periods::{parse_partition_bound, period_containing, upcoming_periods, partition_name};
use crate::ports::{SchemaAdmin, SchemaIntrospection};

/// Maintains partitions for the configured policies: forward creation,
/// archival past the retention window, and per-partition statistics
/// maintenance.
///
/// Every operation isolates failures to the affected table or partition;
/// one bad item never aborts the rest of a batch.
pub struct PartitionManager {
    admin: Arc<dyn SchemaAdmin>,
    introspection: Arc<dyn SchemaIntrospection>,
    policies: Vec<PartitionPolicy>,
    months_ahead: u32,
}

impl PartitionManager {
    /// Create a manager over the given policies.
    pub fn new(
        admin: Arc<dyn SchemaAdmin>,
        introspection: Arc<dyn SchemaIntrospection>,
        policies: Vec<PartitionPolicy>,
        months_ahead: u32,
    ) -> Self {
        Self { admin, introspection, policies, months_ahead }
    }

    /// The configured policies.
    pub fn policies(&self) -> &[PartitionPolicy] {
        &self.policies
    }

    /// Materialise the current period and the periods covering the next
    /// `months_ahead` months for every policy.
    ///
    /// Idempotent: partitions that already exist are skipped, never an
    /// error. Returns the names of partitions created this call.
    pub async fn create_future_partitions(&self) -> Vec<String> {
        let today = Utc::now().date_naive();
        let mut created = Vec::new();

        for policy in &self.policies {
            match self.admin.table_exists(&policy.table).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(table = %policy.table, "base table missing; policy skipped");
                    continue;
                }
                Err(err) => {
                    warn!(table = %policy.table, error = %err, "existence check failed; policy skipped");
                    continue;
                }
            }

            for bound in upcoming_periods(policy.period, today, self.months_ahead) {
                let name = partition_name(&policy.table, &bound);
                match self.admin.table_exists(&name).await {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(err) => {
                        warn!(partition = %name, error = %err, "existence check failed; skipped");
                        continue;
                    }
                }
                if let Err(err) = self.create_partition(policy, &name).await {
                    error!(partition = %name, error = %err, "partition creation failed");
                    continue;
                }
                info!(partition = %name, "partition created");
                created.push(name);
            }
        }
        created
    }

    /// Archive partitions whose period ended before `now − archive_after`.
    ///
    /// Rows are copied into `archive_<partition>` with ignore-duplicate
    /// semantics; the source is dropped only when the archive holds at
    /// least as many rows as the source did before the copy.
    pub async fn archive_old_partitions(&self) -> Vec<ArchiveOutcome> {
        let today = Utc::now().date_naive();
        let mut outcomes = Vec::new();

        for policy in &self.policies {
            let Some(cutoff) = today.checked_sub_months(Months::new(policy.archive_after_months))
            else {
                continue;
            };
            let partitions = match self.introspection.list_tables_like(&format!("{}_", policy.table)).await
            {
                Ok(partitions) => partitions,
                Err(err) => {
                    warn!(table = %policy.table, error = %err, "partition listing failed; policy skipped");
                    continue;
                }
            };

            for partition in partitions {
                let Some(bound) = parse_partition_bound(&policy.table, &partition, policy.period)
                else {
                    continue;
                };
                if bound.end > cutoff {
                    continue;
                }
                outcomes.push(self.archive_partition(&partition).await);
            }
        }
        outcomes
    }

    /// Refresh storage-engine statistics for every live partition.
    /// Purely maintenance; per-partition failures are logged and skipped.
    /// Returns the number of partitions refreshed.
    pub async fn optimize_indexes(&self) -> usize {
        let mut optimized = 0;
        for policy in &self.policies {
            let partitions = match self.introspection.list_tables_like(&format!("{}_", policy.table)).await
            {
                Ok(partitions) => partitions,
                Err(err) => {
                    warn!(table = %policy.table, error = %err, "partition listing failed; policy skipped");
                    continue;
                }
            };
            for partition in partitions {
                if parse_partition_bound(&policy.table, &partition, policy.period).is_none() {
                    continue;
                }
                match self.admin.refresh_statistics(&partition).await {
                    Ok(()) => optimized += 1,
                    Err(err) => {
                        warn!(partition = %partition, error = %err, "statistics refresh failed; skipped");
                    }
                }
            }
        }
        optimized
    }

    /// Derived per-table partition state: count of materialised partitions
    /// and whether the current period is covered.
    pub async fn partition_stats(&self) -> PartitionReport {
        let today = Utc::now().date_naive();
        let mut tables = Vec::new();

        for policy in &self.policies {
            let partitions = self
                .introspection
                .list_tables_like(&format!("{}_", policy.table))
                .await
                .unwrap_or_default();
            let bounds: Vec<String> = partitions
                .iter()
                .filter(|p| parse_partition_bound(&policy.table, p, policy.period).is_some())
                .cloned()
                .collect();
            let current_period_covered = period_containing(policy.period, today)
                .map(|bound| bounds.contains(&partition_name(&policy.table, &bound)))
                .unwrap_or(false);
            tables.push(PartitionStats {
                table: policy.table.clone(),
                partition_count: bounds.len(),
                current_period_covered,
            });
        }
        PartitionReport { generated_at: Utc::now(), tables }
    }

    /// One maintenance iteration: create, archive, optimize.
    ///
    /// Returns an error only when every policy failed to make progress,
    /// which signals the caller's loop to back off and retry sooner.
    pub async fn run_cycle(&self) -> Result<()> {
        let created = self.create_future_partitions().await;
        let outcomes = self.archive_old_partitions().await;
        let optimized = self.optimize_indexes().await;

        let archive_failures = outcomes.iter().filter(|o| o.error.is_some()).count();
        info!(
            created = created.len(),
            archived = outcomes.len() - archive_failures,
            archive_failures,
            optimized,
            "partition maintenance cycle complete"
        );

        let stats = self.partition_stats().await;
        if !self.policies.is_empty() && stats.tables.iter().all(|t| t.partition_count == 0) && created.is_empty()
        {
            return Err(OptimizerError::Internal(
                "partition maintenance made no progress for any policy".into(),
            ));
        }
        Ok(())
    }

    async fn create_partition(&self, policy: &PartitionPolicy, name: &str) -> Result<()> {
        self.admin
            .create_partition_table(&policy.table, name, &policy.partition_column)
            .await?;
        let index_name = format!("idx_{}_{}", name, policy.partition_column);
        self.admin.create_index(&index_name, name, &policy.partition_column).await
    }

    async fn archive_partition(&self, partition: &str) -> ArchiveOutcome {
        let archive_table = format!("archive_{partition}");
        let mut outcome = ArchiveOutcome {
            partition: partition.to_string(),
            archive_table: archive_table.clone(),
            rows_copied: 0,
            source_rows: 0,
            dropped: false,
            error: None,
        };

        let source_rows = match self.admin.row_count(partition).await {
            Ok(rows) => rows,
            Err(err) => {
                outcome.error = Some(err.to_string());
                return outcome;
            }
        };
        outcome.source_rows = source_rows;

        match self.admin.copy_rows(partition, &archive_table).await {
            Ok(copied) => outcome.rows_copied = copied,
            Err(err) => {
                error!(partition = %partition, error = %err, "archive copy failed");
                outcome.error = Some(err.to_string());
                return outcome;
            }
        }

        // Drop only once the archive provably holds everything the source
        // did; a short copy leaves the source in place for the next cycle.
        if outcome.rows_copied >= source_rows {
            match self.admin.drop_table(partition).await {
                Ok(()) => {
                    info!(partition = %partition, archive = %archive_table, rows = outcome.rows_copied, "partition archived");
                    outcome.dropped = true;
                }
                Err(err) => outcome.error = Some(err.to_string()),
            }
        } else {
            warn!(
                partition = %partition,
                source_rows,
                rows_copied = outcome.rows_copied,
                "archive copy incomplete; source retained"
            );
            outcome.error = Some(format!(
                "archive holds {} of {} source rows; drop skipped",
                outcome.rows_copied, source_rows
            ));
        }
        outcome
    }
}
