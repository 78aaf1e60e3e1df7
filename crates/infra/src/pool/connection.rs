//! Connection traits and per-connection bookkeeping.

use std::time::{Duration, Instant};

use dbtune_domain::Result;

/// A live database session owned by exactly one pool at a time.
///
/// While checked out, ownership transfers to the caller for the duration
/// of one unit of work, then returns on handle drop.
pub trait PoolConnection: Send {
    /// Execute `sql` with positional `params`, returning result rows with
    /// every value rendered as text (empty for non-queries).
    fn execute(&mut self, sql: &str, params: &[String]) -> Result<Vec<Vec<String>>>;

    /// Lightweight liveness probe (`SELECT 1` or equivalent).
    fn is_valid(&mut self) -> bool;

    /// Close the underlying session. Must be idempotent.
    fn close(&mut self);
}

/// Creates connections for a database alias.
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection to the database known as `alias`.
    fn connect(&self, alias: &str) -> Result<Box<dyn PoolConnection>>;
}

/// A pooled connection with its lifetime bookkeeping.
pub(crate) struct TrackedConnection {
    pub(crate) id: u64,
    pub(crate) inner: Box<dyn PoolConnection>,
    pub(crate) created_at: Instant,
    pub(crate) last_used: Instant,
    pub(crate) query_count: u64,
    pub(crate) total_busy: Duration,
}

impl TrackedConnection {
    pub(crate) fn new(id: u64, inner: Box<dyn PoolConnection>) -> Self {
        let now = Instant::now();
        Self { id, inner, created_at: now, last_used: now, query_count: 0, total_busy: Duration::ZERO }
    }

    /// Run the liveness probe.
    pub(crate) fn probe(&mut self) -> bool {
        self.inner.is_valid()
    }

    /// Record a completed unit of work.
    pub(crate) fn record_use(&mut self, busy: Duration) {
        self.query_count += 1;
        self.total_busy += busy;
        self.last_used = Instant::now();
    }

    /// Mark the connection as touched without work (release path).
    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// How long the connection has been idle.
    pub(crate) fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used)
    }

    pub(crate) fn close(&mut self) {
        self.inner.close();
    }
}
