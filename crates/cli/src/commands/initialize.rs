//! `dbtune initialize`: start the suite and run the initial analysis.

use dbtune_infra::{InitializeOptions, OptimizationCoordinator};

/// Flags for the initialize command.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Create the top recommended indexes after the initial analysis.
    pub auto_create_indexes: bool,
    /// Skip partition maintenance entirely.
    pub skip_partitioning: bool,
    /// Run one forced optimization cycle before reporting.
    pub force_optimization: bool,
}

/// Run the command.
pub async fn run(coordinator: &OptimizationCoordinator, options: Options) -> anyhow::Result<()> {
    println!("Initializing database optimization suite...");
    coordinator
        .initialize(InitializeOptions { skip_partitioning: options.skip_partitioning })
        .await?;

    if options.auto_create_indexes {
        let outcomes = coordinator.apply_top_index_suggestions().await;
        let created = outcomes.iter().filter(|o| o.created).count();
        let failed = outcomes.len() - created;
        if outcomes.is_empty() {
            println!("No index suggestions met the auto-create threshold");
        } else if failed == 0 {
            println!("Created {created}/{} recommended indexes", outcomes.len());
        } else {
            println!(
                "Created {created}/{} recommended indexes, {failed} failed: see detail",
                outcomes.len()
            );
            for outcome in outcomes.iter().filter(|o| !o.created) {
                println!(
                    "  failed: {} on {}.{}: {}",
                    outcome.index_name,
                    outcome.table,
                    outcome.column,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    if options.force_optimization {
        println!("Running forced optimization cycle...");
        let report = coordinator.force_optimization_cycle().await;
        println!("Cycle complete, overall score {}/100", report.overall_score);
    }

    println!("\nComponent status:");
    for status in coordinator.component_status().await {
        let marker = if status.running { "ok" } else { "--" };
        println!("  [{marker}] {}", status.name);
    }

    println!("\nOptimization suite initialized");
    coordinator.shutdown().await?;
    Ok(())
}
