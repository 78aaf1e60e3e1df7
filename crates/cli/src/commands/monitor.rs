//! `dbtune monitor-performance`: poll query activity over short
//! windows and alert when a threshold is exceeded.

use std::time::{Duration, Instant};

use dbtune_infra::{InitializeOptions, OptimizationCoordinator};

/// Seconds per polling window.
const POLL_WINDOW: Duration = Duration::from_secs(5);

/// Run the command for `duration` seconds, alerting whenever more than
/// `threshold` queries land in one polling window.
pub async fn run(
    coordinator: &OptimizationCoordinator,
    duration: u64,
    threshold: u64,
) -> anyhow::Result<()> {
    coordinator
        .initialize(InitializeOptions { skip_partitioning: true })
        .await?;
    println!("Monitoring query activity for {duration}s (threshold: {threshold} queries / {}s)...", POLL_WINDOW.as_secs());

    let telemetry = coordinator.telemetry().clone();
    let deadline = Instant::now() + Duration::from_secs(duration);
    let mut previous = telemetry.total_executions();
    let mut alerts = 0_u32;

    while Instant::now() < deadline {
        tokio::time::sleep(POLL_WINDOW).await;
        let current = telemetry.total_executions();
        let window_count = current.saturating_sub(previous);
        previous = current;

        if window_count > threshold {
            alerts += 1;
            println!(
                "Alert: {window_count} queries in {}s (threshold: {threshold})",
                POLL_WINDOW.as_secs()
            );
            let report = coordinator.analyzer().analyze();
            let n_plus_one = report.n_plus_one_count();
            if n_plus_one > 0 {
                println!("  N+1 detected: {n_plus_one} suspect digest(s)");
            }
        }
    }

    println!("Monitoring completed ({alerts} alert(s))");
    coordinator.shutdown().await?;
    Ok(())
}
