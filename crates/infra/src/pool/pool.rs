//! Bounded connection pool for one database alias.
//!
//! Invariants:
//! - `|available| + |active| + in-flight creations <= max_connections`
//! - after a health check, every idle connection passes the liveness
//!   probe and, when creation succeeds, the pool holds at least
//!   `min_connections`
//!
//! Health check and acquire/release on the same pool are mutually
//! exclusive through the single pool-level mutex; different pools never
//! contend with each other. Acquire ordering across callers is not
//! FIFO: any valid idle connection may be handed out.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use dbtune_domain::config::PoolConfig;
use dbtune_domain::types::PoolStats;
use dbtune_domain::{OptimizerError, Result};
use tracing::{debug, error, info, warn};

use super::connection::{ConnectionFactory, TrackedConnection};

/// Base delay between connection-creation retries; grows linearly per
/// attempt.
const CREATE_RETRY_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Default)]
struct PoolState {
    idle: VecDeque<TrackedConnection>,
    active: HashSet<u64>,
    /// Creations in flight outside the lock; counted against `max`.
    reserved: usize,
}

impl PoolState {
    fn total(&self) -> usize {
        self.idle.len() + self.active.len() + self.reserved
    }
}

#[derive(Default)]
struct PoolCounters {
    created: AtomicU64,
    closed: AtomicU64,
    acquire_timeouts: AtomicU64,
    queries: AtomicU64,
    query_time_total_ms: AtomicU64,
}

/// Bounded pool of live connections for one database alias.
pub struct ConnectionPool {
    alias: String,
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    state: Mutex<PoolState>,
    available: Condvar,
    counters: PoolCounters,
    next_id: AtomicU64,
}

impl ConnectionPool {
    /// Create a pool and establish the minimum connections.
    ///
    /// Individual creation failures during warm-up are logged; the pool
    /// is unusable (and this returns `PoolUnavailable`) only when a
    /// non-zero minimum is configured and not a single connection could
    /// be established.
    pub fn new(
        alias: impl Into<String>,
        config: PoolConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Arc<Self>> {
        let alias = alias.into();
        if config.min_connections > config.max_connections {
            return Err(OptimizerError::InvalidInput(format!(
                "pool '{alias}': min_connections {} exceeds max_connections {}",
                config.min_connections, config.max_connections
            )));
        }

        let pool = Arc::new(Self {
            alias,
            config,
            factory,
            state: Mutex::new(PoolState::default()),
            available: Condvar::new(),
            counters: PoolCounters::default(),
            next_id: AtomicU64::new(1),
        });

        let mut last_error = None;
        {
            let mut state = pool.lock_state();
            for _ in 0..pool.config.min_connections {
                match pool.open_connection() {
                    Ok(conn) => state.idle.push_back(conn),
                    Err(err) => {
                        error!(alias = %pool.alias, error = %err, "initial connection failed");
                        last_error = Some(err);
                    }
                }
            }
            if pool.config.min_connections > 0 && state.idle.is_empty() {
                let reason = last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string());
                return Err(OptimizerError::PoolUnavailable { alias: pool.alias.clone(), reason });
            }
            info!(alias = %pool.alias, connections = state.idle.len(), "connection pool initialised");
        }
        Ok(pool)
    }

    /// The database alias this pool serves.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Check out a connection, blocking up to `timeout`.
    ///
    /// Pops an idle connection when one exists, creates a new one while
    /// under capacity, and otherwise waits for a release. Idle
    /// connections failing the liveness probe are discarded and replaced
    /// transparently: the caller never observes a dead connection.
    ///
    /// # Errors
    /// `PoolExhausted` when `timeout` elapses with the pool at capacity;
    /// `PoolUnavailable` when connection creation keeps failing.
    pub fn acquire(self: &Arc<Self>, timeout: Duration) -> Result<PooledHandle> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock_state();

        loop {
            if let Some(mut conn) = state.idle.pop_front() {
                state.active.insert(conn.id);
                drop(state);
                if conn.probe() {
                    return Ok(PooledHandle::new(Arc::clone(self), conn));
                }
                debug!(alias = %self.alias, "idle connection failed liveness probe; replacing");
                conn.close();
                self.counters.closed.fetch_add(1, Ordering::Relaxed);
                state = self.lock_state();
                state.active.remove(&conn.id);
                continue;
            }

            if state.total() < self.config.max_connections as usize {
                state.reserved += 1;
                drop(state);
                let created = self.create_with_retry();
                let mut state = self.lock_state();
                state.reserved -= 1;
                match created {
                    Ok(conn) => {
                        state.active.insert(conn.id);
                        drop(state);
                        return Ok(PooledHandle::new(Arc::clone(self), conn));
                    }
                    Err(err) => {
                        // The reserved slot is free again; wake a waiter.
                        drop(state);
                        self.available.notify_one();
                        return Err(err);
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                self.counters.acquire_timeouts.fetch_add(1, Ordering::Relaxed);
                let waited_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(alias = %self.alias, waited_ms, "pool exhausted");
                return Err(OptimizerError::PoolExhausted { alias: self.alias.clone(), waited_ms });
            }
            state = self.wait_for_release(state, deadline - now);
        }
    }

    /// Return a connection to the pool.
    ///
    /// The connection goes back to the idle queue when still valid and
    /// the pool is under capacity; otherwise it is closed. Safe to call
    /// while the pool is being drained concurrently.
    pub(crate) fn release(&self, mut conn: TrackedConnection) {
        let valid = conn.probe();
        let mut state = self.lock_state();
        let was_active = state.active.remove(&conn.id);
        let under_capacity = state.total() < self.config.max_connections as usize;

        if valid && was_active && under_capacity {
            conn.touch();
            state.idle.push_back(conn);
            drop(state);
            self.available.notify_one();
        } else {
            drop(state);
            conn.close();
            self.counters.closed.fetch_add(1, Ordering::Relaxed);
            // A slot opened up even though no connection went idle.
            self.available.notify_one();
        }
    }

    /// Validate idle connections, drop idle-expired ones above the
    /// minimum, and top the pool back up to `min_connections`.
    ///
    /// Runs entirely under the pool lock, so it is mutually exclusive
    /// with acquire and release. Creation failures are logged, never
    /// propagated. Active connections are left untouched; they are
    /// validated on release.
    pub fn health_check(&self) {
        let mut state = self.lock_state();
        let now = Instant::now();
        let idle_timeout = Duration::from_secs(self.config.idle_timeout_secs);

        let idle = std::mem::take(&mut state.idle);
        let mut total = idle.len() + state.active.len() + state.reserved;
        let mut kept = VecDeque::with_capacity(idle.len());
        for mut conn in idle {
            if !conn.probe() {
                debug!(alias = %self.alias, id = conn.id, "closing invalid idle connection");
                conn.close();
                self.counters.closed.fetch_add(1, Ordering::Relaxed);
                total -= 1;
                continue;
            }
            if total > self.config.min_connections as usize && conn.idle_for(now) > idle_timeout {
                debug!(
                    alias = %self.alias,
                    id = conn.id,
                    idle_secs = conn.idle_for(now).as_secs(),
                    "closing idle-expired connection"
                );
                conn.close();
                self.counters.closed.fetch_add(1, Ordering::Relaxed);
                total -= 1;
                continue;
            }
            kept.push_back(conn);
        }
        state.idle = kept;

        while state.total() < self.config.min_connections as usize {
            match self.open_connection() {
                Ok(conn) => {
                    state.idle.push_back(conn);
                    self.available.notify_one();
                }
                Err(err) => {
                    error!(alias = %self.alias, error = %err, "health check could not replenish pool");
                    break;
                }
            }
        }
    }

    /// Point-in-time statistics snapshot.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        let queries = self.counters.queries.load(Ordering::Relaxed);
        let total_ms = self.counters.query_time_total_ms.load(Ordering::Relaxed);
        #[allow(clippy::cast_precision_loss)]
        let avg_query_time_ms =
            if queries == 0 { 0.0 } else { total_ms as f64 / queries as f64 };
        PoolStats {
            alias: self.alias.clone(),
            available: state.idle.len(),
            active: state.active.len(),
            total: state.idle.len() + state.active.len(),
            max_connections: self.config.max_connections,
            min_connections: self.config.min_connections,
            connections_created: self.counters.created.load(Ordering::Relaxed),
            connections_closed: self.counters.closed.load(Ordering::Relaxed),
            acquire_timeouts: self.counters.acquire_timeouts.load(Ordering::Relaxed),
            queries_executed: queries,
            avg_query_time_ms,
        }
    }

    /// Close every idle connection. Checked-out connections are closed
    /// as they come back through release (the pool is over capacity from
    /// their perspective once drained).
    pub fn drain(&self) {
        let mut state = self.lock_state();
        let idle = std::mem::take(&mut state.idle);
        drop(state);
        for mut conn in idle {
            conn.close();
            self.counters.closed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_query(&self, busy: Duration) {
        self.counters.queries.fetch_add(1, Ordering::Relaxed);
        self.counters
            .query_time_total_ms
            .fetch_add(busy.as_millis() as u64, Ordering::Relaxed);
    }

    fn open_connection(&self) -> Result<TrackedConnection> {
        let inner = self.factory.connect(&self.alias).map_err(|err| {
            OptimizerError::ConnectionCreateFailed {
                alias: self.alias.clone(),
                reason: err.to_string(),
            }
        })?;
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(TrackedConnection::new(id, inner))
    }

    /// Create a connection, retrying with linear backoff.
    fn create_with_retry(&self) -> Result<TrackedConnection> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match self.open_connection() {
                Ok(conn) => return Ok(conn),
                Err(err) => {
                    warn!(alias = %self.alias, attempt, error = %err, "connection creation failed");
                    last_error = Some(err);
                    if attempt < attempts {
                        std::thread::sleep(CREATE_RETRY_BACKOFF * attempt);
                    }
                }
            }
        }
        let reason = last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string());
        Err(OptimizerError::PoolUnavailable { alias: self.alias.clone(), reason })
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(alias = %self.alias, "pool mutex poisoned, recovering state");
                poisoned.into_inner()
            }
        }
    }

    fn wait_for_release<'a>(
        &'a self,
        state: MutexGuard<'a, PoolState>,
        remaining: Duration,
    ) -> MutexGuard<'a, PoolState> {
        match self.available.wait_timeout(state, remaining) {
            Ok((guard, _)) => guard,
            Err(poisoned) => {
                warn!(alias = %self.alias, "pool mutex poisoned during wait, recovering state");
                poisoned.into_inner().0
            }
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("ConnectionPool")
            .field("alias", &self.alias)
            .field("available", &state.idle.len())
            .field("active", &state.active.len())
            .field("max", &self.config.max_connections)
            .finish()
    }
}

/// RAII handle to a checked-out connection; returns it on drop.
pub struct PooledHandle {
    pool: Arc<ConnectionPool>,
    conn: Option<TrackedConnection>,
}

impl PooledHandle {
    fn new(pool: Arc<ConnectionPool>, conn: TrackedConnection) -> Self {
        Self { pool, conn: Some(conn) }
    }

    /// Execute a statement on the checked-out connection.
    pub fn execute(&mut self, sql: &str, params: &[String]) -> Result<Vec<Vec<String>>> {
        let conn = self.conn.as_mut().ok_or_else(|| {
            OptimizerError::Internal("connection already returned to the pool".into())
        })?;
        let started = Instant::now();
        let result = conn.inner.execute(sql, params);
        let busy = started.elapsed();
        conn.record_use(busy);
        self.pool.record_query(busy);
        result
    }

    /// Alias of the owning pool.
    pub fn alias(&self) -> &str {
        self.pool.alias()
    }
}

impl Drop for PooledHandle {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl std::fmt::Debug for PooledHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandle")
            .field("alias", &self.pool.alias())
            .field("checked_out", &self.conn.is_some())
            .finish()
    }
}
