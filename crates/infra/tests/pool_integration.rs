//! Connection pool behavior under contention, failure, and recovery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dbtune_domain::config::PoolConfig;
use dbtune_domain::OptimizerError;
use dbtune_infra::pool::ConnectionPool;

mod support;

use support::FakeFactory;

fn config(min: u32, max: u32) -> PoolConfig {
    PoolConfig {
        min_connections: min,
        max_connections: max,
        connection_timeout_ms: 100,
        idle_timeout_secs: 300,
        health_check_interval_secs: 60,
        retry_attempts: 3,
    }
}

#[test]
fn exhausted_pool_times_out_then_recovers_on_release() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::new("default", config(2, 4), factory.clone()).expect("pool created");

    let mut handles = Vec::new();
    for _ in 0..4 {
        handles.push(pool.acquire(Duration::from_millis(100)).expect("acquire under max"));
    }
    assert_eq!(pool.stats().active, 4);

    // Fifth acquire must fail with PoolExhausted after ~100ms.
    let started = Instant::now();
    let err = pool.acquire(Duration::from_millis(100)).expect_err("pool is exhausted");
    let waited = started.elapsed();
    assert!(matches!(err, OptimizerError::PoolExhausted { .. }));
    assert!(waited >= Duration::from_millis(100), "timed out early: {waited:?}");
    assert!(waited < Duration::from_secs(1), "timed out late: {waited:?}");

    // Releasing one connection lets the next acquire succeed immediately.
    handles.pop();
    let started = Instant::now();
    let _handle = pool.acquire(Duration::from_millis(100)).expect("acquire after release");
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[test]
fn active_connections_never_exceed_max() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::new("default", config(1, 3), factory.clone()).expect("pool created");

    let mut join_handles = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        join_handles.push(std::thread::spawn(move || {
            for _ in 0..20 {
                if let Ok(mut handle) = pool.acquire(Duration::from_millis(50)) {
                    let _ = handle.execute("SELECT 1", &[]);
                }
            }
        }));
    }

    for _ in 0..50 {
        let stats = pool.stats();
        assert!(stats.total <= 3, "pool exceeded max: {stats:?}");
        std::thread::sleep(Duration::from_millis(1));
    }
    for handle in join_handles {
        handle.join().expect("worker finished");
    }
    assert!(pool.stats().total <= 3);
}

#[test]
fn health_check_restores_minimum_after_mass_invalidation() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::new("default", config(5, 8), factory.clone()).expect("pool created");
    assert_eq!(pool.stats().available, 5);

    factory.invalidate_all();
    pool.health_check();

    let stats = pool.stats();
    assert!(stats.total >= 5, "minimum not restored: {stats:?}");

    // Every connection handed out after the health check passes the probe.
    let mut handle = pool.acquire(Duration::from_millis(100)).expect("acquire succeeds");
    handle.execute("SELECT 1", &[]).expect("connection is live");
}

#[test]
fn invalid_idle_connections_are_replaced_transparently() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::new("default", config(2, 4), factory.clone()).expect("pool created");

    factory.invalidate_all();

    // Without an intervening health check, acquire must still hand out a
    // working connection.
    let mut handle = pool.acquire(Duration::from_millis(200)).expect("acquire succeeds");
    handle.execute("SELECT 1", &[]).expect("connection is live");
}

#[test]
fn acquire_retries_creation_then_surfaces_unavailable() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::new("default", config(0, 2), factory.clone()).expect("pool created");

    factory.fail_next(usize::MAX);
    let err = pool.acquire(Duration::from_millis(500)).expect_err("creation keeps failing");
    assert!(matches!(err, OptimizerError::PoolUnavailable { .. }));

    // Once creation works again the pool serves connections.
    factory.fail_next(0);
    pool.acquire(Duration::from_millis(100)).expect("acquire succeeds again");
}

#[test]
fn pool_with_unreachable_database_fails_construction() {
    let factory = FakeFactory::new();
    factory.fail_next(usize::MAX);
    let err = ConnectionPool::new("default", config(2, 4), factory).expect_err("no connections");
    assert!(matches!(err, OptimizerError::PoolUnavailable { .. }));
}

#[test]
fn release_after_drain_is_safe() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::new("default", config(2, 4), factory).expect("pool created");

    let handle = pool.acquire(Duration::from_millis(100)).expect("acquire succeeds");
    pool.drain();
    drop(handle); // release into the drained pool must not panic

    let stats = pool.stats();
    assert!(stats.total <= 4);
}

#[test]
fn stats_track_queries_and_timeouts() {
    let factory = FakeFactory::new();
    let pool = ConnectionPool::new("default", config(1, 1), factory).expect("pool created");

    let mut handle = pool.acquire(Duration::from_millis(100)).expect("acquire succeeds");
    handle.execute("SELECT 1", &[]).expect("query runs");
    let _ = pool.acquire(Duration::from_millis(20)).expect_err("exhausted");
    drop(handle);

    let stats = pool.stats();
    assert_eq!(stats.queries_executed, 1);
    assert_eq!(stats.acquire_timeouts, 1);
    assert_eq!(stats.alias, "default");
}
