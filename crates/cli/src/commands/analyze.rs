//! `dbtune analyze-performance`: print the consolidated report.

use dbtune_infra::{InitializeOptions, OptimizationCoordinator};

use crate::output::print_report;

/// Run the command.
///
/// Read-only: partition maintenance is skipped, so analysing never
/// changes the schema.
pub async fn run(coordinator: &OptimizationCoordinator, json: bool) -> anyhow::Result<()> {
    coordinator.initialize(InitializeOptions { skip_partitioning: true }).await?;
    let report = coordinator.run_consolidation_cycle().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    coordinator.shutdown().await?;
    Ok(())
}
