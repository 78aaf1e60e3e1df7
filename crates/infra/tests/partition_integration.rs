//! Partition maintenance scenarios against a fake schema driver.

use std::sync::Arc;

use chrono::{Datelike, Months, Utc};
use dbtune_core::partition::PartitionManager;
use dbtune_domain::types::{PartitionPeriod, PartitionPolicy};

mod support;

use support::FakeDriver;

fn monthly_policy(table: &str) -> PartitionPolicy {
    PartitionPolicy {
        table: table.to_string(),
        partition_column: "created_at".to_string(),
        period: PartitionPeriod::Monthly,
        retention_months: 24,
        archive_after_months: 12,
    }
}

fn manager(driver: &Arc<FakeDriver>, policies: Vec<PartitionPolicy>) -> PartitionManager {
    let admin: Arc<dyn dbtune_core::ports::SchemaAdmin> = driver.clone();
    let introspection: Arc<dyn dbtune_core::ports::SchemaIntrospection> = driver.clone();
    PartitionManager::new(admin, introspection, policies, 3)
}

/// Name of a partition `months_back` whole months before the current one.
fn past_partition(table: &str, months_back: u32) -> String {
    let date = Utc::now()
        .date_naive()
        .checked_sub_months(Months::new(months_back))
        .expect("date in range");
    format!("{table}_{:04}_{:02}", date.year(), date.month())
}

#[tokio::test]
async fn create_future_partitions_is_idempotent() {
    let driver = FakeDriver::new();
    driver.add_table("events", 10);
    let manager = manager(&driver, vec![monthly_policy("events")]);

    let created = manager.create_future_partitions().await;
    assert_eq!(created.len(), 4, "current month plus three ahead: {created:?}");
    let tables_after_first = driver.table_names();

    let created_again = manager.create_future_partitions().await;
    assert!(created_again.is_empty(), "second run must be a no-op: {created_again:?}");
    assert_eq!(driver.table_names(), tables_after_first);

    // Each partition gets its supporting index on the partition key.
    let indexes = driver.state().indexes_created.clone();
    assert_eq!(indexes.len(), 4);
    assert!(indexes.iter().all(|name| name.contains("created_at")));
}

#[tokio::test]
async fn missing_base_table_is_skipped() {
    let driver = FakeDriver::new();
    let manager = manager(&driver, vec![monthly_policy("events")]);
    let created = manager.create_future_partitions().await;
    assert!(created.is_empty());
}

#[tokio::test]
async fn old_partitions_are_archived_and_dropped_after_full_copy() {
    let driver = FakeDriver::new();
    driver.add_table("events", 10);
    let old = past_partition("events", 14);
    driver.add_table(&old, 250);
    let manager = manager(&driver, vec![monthly_policy("events")]);

    let outcomes = manager.archive_old_partitions().await;
    assert_eq!(outcomes.len(), 1, "one partition past the archive window: {outcomes:?}");
    let outcome = &outcomes[0];
    assert_eq!(outcome.rows_copied, 250);
    assert!(outcome.dropped);
    assert!(outcome.error.is_none());

    let tables = driver.table_names();
    assert!(!tables.contains(&old), "source partition dropped");
    assert!(tables.contains(&format!("archive_{old}")), "archive table present");
}

#[tokio::test]
async fn short_copy_never_drops_the_source() {
    let driver = FakeDriver::new();
    driver.add_table("events", 10);
    let old = past_partition("events", 14);
    driver.add_table(&old, 250);
    driver.state().copy_shortfall = 10;
    let manager = manager(&driver, vec![monthly_policy("events")]);

    let outcomes = manager.archive_old_partitions().await;
    let outcome = &outcomes[0];
    assert_eq!(outcome.rows_copied, 240);
    assert_eq!(outcome.source_rows, 250);
    assert!(!outcome.dropped, "short copy must retain the source");
    assert!(outcome.error.is_some());
    assert!(driver.table_names().contains(&old), "source partition still present");
}

#[tokio::test]
async fn empty_source_archives_cleanly() {
    let driver = FakeDriver::new();
    driver.add_table("events", 10);
    let old = past_partition("events", 14);
    driver.add_table(&old, 0);
    let manager = manager(&driver, vec![monthly_policy("events")]);

    let outcomes = manager.archive_old_partitions().await;
    assert!(outcomes[0].dropped, "an empty source may be dropped after a zero-row copy");
}

#[tokio::test]
async fn recent_partitions_are_left_alone() {
    let driver = FakeDriver::new();
    driver.add_table("events", 10);
    let recent = past_partition("events", 2);
    driver.add_table(&recent, 100);
    let manager = manager(&driver, vec![monthly_policy("events")]);

    let outcomes = manager.archive_old_partitions().await;
    assert!(outcomes.is_empty(), "partitions inside the window stay: {outcomes:?}");
    assert!(driver.table_names().contains(&recent));
}

#[tokio::test]
async fn optimize_skips_failing_partitions() {
    let driver = FakeDriver::new();
    driver.add_table("events", 10);
    let first = past_partition("events", 1);
    let second = past_partition("events", 2);
    driver.add_table(&first, 10);
    driver.add_table(&second, 10);
    driver.state().fail_statistics.insert(first.clone());
    let manager = manager(&driver, vec![monthly_policy("events")]);

    let optimized = manager.optimize_indexes().await;
    assert_eq!(optimized, 1, "the healthy partition is still refreshed");
    assert_eq!(driver.state().statistics_refreshed, vec![second]);
}

#[tokio::test]
async fn partition_stats_report_current_period_coverage() {
    let driver = FakeDriver::new();
    driver.add_table("events", 10);
    driver.add_table("messages", 10);
    let manager = manager(
        &driver,
        vec![monthly_policy("events"), monthly_policy("messages")],
    );

    // Materialise partitions for events only.
    let today = Utc::now().date_naive();
    driver.add_table(&format!("events_{:04}_{:02}", today.year(), today.month()), 0);

    let report = manager.partition_stats().await;
    let events = report.tables.iter().find(|t| t.table == "events").expect("events stats");
    let messages = report.tables.iter().find(|t| t.table == "messages").expect("messages stats");
    assert!(events.current_period_covered);
    assert_eq!(events.partition_count, 1);
    assert!(!messages.current_period_covered);
    assert!((report.health() - 0.5).abs() < f64::EPSILON);
}
