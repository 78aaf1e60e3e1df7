//! Console rendering for consolidated reports.

use dbtune_domain::types::OptimizationReport;

/// Print a human-readable report summary.
pub fn print_report(report: &OptimizationReport) {
    println!("=== PERFORMANCE ANALYSIS REPORT ===");
    println!("Generated: {}", report.generated_at.to_rfc3339());
    println!("Overall score: {}/100", report.overall_score);
    println!();

    println!(
        "Pools: {} ({} connections, {} active)",
        report.pool.pool_count, report.pool.total_connections, report.pool.active_connections
    );
    for pool in &report.pool.pools {
        println!(
            "  {}: {}/{} connections ({} idle, {} active, {} timeouts)",
            pool.alias, pool.total, pool.max_connections, pool.available, pool.active,
            pool.acquire_timeouts
        );
    }
    println!();

    let analyzer = &report.analyzer;
    println!(
        "Queries: {} executions across {} digests, score {}/100",
        analyzer.total_executions, analyzer.unique_digests, analyzer.performance_score
    );
    let n_plus_one = analyzer.n_plus_one_count();
    if n_plus_one > 0 {
        println!("N+1 suspects detected: {n_plus_one}");
    } else {
        println!("No N+1 patterns detected");
    }
    if analyzer.slow_count() > 0 {
        println!("Slow query patterns: {}", analyzer.slow_count());
    }
    for flagged in &analyzer.flagged {
        let suggestion = flagged
            .suggestion
            .as_ref()
            .map_or_else(String::new, |s| format!(" -> {}", s.description));
        println!("  [{:?}] {} (x{}){}", flagged.flag, truncate(&flagged.digest, 80), flagged.count, suggestion);
    }
    println!();

    println!(
        "Index suggestions: {} recommended ({} high priority), {} unused",
        report.index.recommended.len(),
        report.index.high_priority_count,
        report.index.unused.len()
    );
    for suggestion in &report.index.recommended {
        println!(
            "  {:?} {}.{} (priority {:.1})",
            suggestion.action, suggestion.table, suggestion.column, suggestion.priority_score
        );
    }
    println!();

    println!("Partitioned tables: {}", report.partitions.tables.len());
    for table in &report.partitions.tables {
        let coverage = if table.current_period_covered { "current" } else { "STALE" };
        println!("  {}: {} partitions ({coverage})", table.table, table.partition_count);
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    }
}
