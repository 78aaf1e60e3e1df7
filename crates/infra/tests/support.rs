//! Shared fakes for infra integration tests: a scriptable connection
//! factory for pool tests and an in-memory schema driver for advisor,
//! partition, and coordinator tests.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dbtune_core::ports::{SchemaAdmin, SchemaIntrospection};
use dbtune_domain::types::{ColumnMeta, IndexMeta, IndexUsageRecord};
use dbtune_domain::{OptimizerError, Result};
use dbtune_infra::pool::{ConnectionFactory, PoolConnection};

/// Connection whose validity is tied to the factory's epoch: bumping the
/// epoch invalidates every connection created before the bump.
pub struct FakeConnection {
    created_epoch: u64,
    epoch: Arc<AtomicU64>,
    closed: AtomicBool,
}

impl PoolConnection for FakeConnection {
    fn execute(&mut self, _sql: &str, _params: &[String]) -> Result<Vec<Vec<String>>> {
        if !self.is_valid() {
            return Err(OptimizerError::Query("connection is not valid".into()));
        }
        Ok(vec![vec!["1".to_string()]])
    }

    fn is_valid(&mut self) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && self.created_epoch == self.epoch.load(Ordering::SeqCst)
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Scriptable connection factory.
#[derive(Default)]
pub struct FakeFactory {
    epoch: Arc<AtomicU64>,
    created: AtomicUsize,
    fail_remaining: AtomicUsize,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Total connections handed out so far.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Invalidate every connection created so far.
    pub fn invalidate_all(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

impl ConnectionFactory for FakeFactory {
    fn connect(&self, alias: &str) -> Result<Box<dyn PoolConnection>> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(OptimizerError::ConnectionCreateFailed {
                alias: alias.to_string(),
                reason: "scripted failure".into(),
            });
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeConnection {
            created_epoch: self.epoch.load(Ordering::SeqCst),
            epoch: Arc::clone(&self.epoch),
            closed: AtomicBool::new(false),
        }))
    }
}

/// One table of the fake schema.
#[derive(Debug, Clone, Default)]
pub struct FakeTable {
    pub rows: u64,
    pub columns: Vec<ColumnMeta>,
    pub indexes: Vec<IndexMeta>,
}

/// Mutable state behind [`FakeDriver`].
#[derive(Default)]
pub struct FakeSchema {
    pub tables: BTreeMap<String, FakeTable>,
    pub usage: Vec<IndexUsageRecord>,
    pub fail_introspection: bool,
    /// Index names whose creation should fail.
    pub fail_index_creation: HashSet<String>,
    /// Tables whose statistics refresh should fail.
    pub fail_statistics: HashSet<String>,
    /// Rows silently missing from every archive copy.
    pub copy_shortfall: u64,
    pub indexes_created: Vec<String>,
    pub statistics_refreshed: Vec<String>,
}

/// In-memory implementation of the introspection and admin ports.
#[derive(Default)]
pub struct FakeDriver {
    state: Mutex<FakeSchema>,
}

impl FakeDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MutexGuard<'_, FakeSchema> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a table with the given row count.
    pub fn add_table(&self, name: &str, rows: u64) {
        self.state().tables.insert(name.to_string(), FakeTable { rows, ..FakeTable::default() });
    }

    /// Register a column on a table.
    pub fn add_column(&self, table: &str, column: ColumnMeta) {
        self.state().tables.entry(table.to_string()).or_default().columns.push(column);
    }

    /// Register an index on a table.
    pub fn add_index(&self, table: &str, name: &str, columns: &[&str], unique: bool) {
        self.state().tables.entry(table.to_string()).or_default().indexes.push(IndexMeta {
            table: table.to_string(),
            name: name.to_string(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique,
        });
    }

    /// Register an index usage record observed `days_observed` days ago.
    pub fn add_usage(&self, table: &str, index: &str, reads: u64, fetches: u64, days_observed: i64) {
        self.state().usage.push(IndexUsageRecord {
            table: table.to_string(),
            index_name: index.to_string(),
            read_count: reads,
            fetch_count: fetches,
            write_count: 0,
            observed_since: Utc::now() - ChronoDuration::days(days_observed),
        });
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state().tables.keys().cloned().collect()
    }

    fn check_introspection(&self) -> Result<()> {
        if self.state().fail_introspection {
            return Err(OptimizerError::SchemaIntrospection("scripted failure".into()));
        }
        Ok(())
    }
}

/// Column helper: plain column with no index.
pub fn column(table: &str, name: &str) -> ColumnMeta {
    ColumnMeta {
        table: table.to_string(),
        name: name.to_string(),
        data_type: "INTEGER".to_string(),
        is_primary_key: false,
        is_unique: false,
        is_foreign_key: false,
        has_index: false,
    }
}

/// Column helper: foreign-key column.
pub fn fk_column(table: &str, name: &str, has_index: bool) -> ColumnMeta {
    ColumnMeta { is_foreign_key: true, has_index, ..column(table, name) }
}

/// Column helper: unique column.
pub fn unique_column(table: &str, name: &str, has_index: bool) -> ColumnMeta {
    ColumnMeta { is_unique: true, has_index, ..column(table, name) }
}

#[async_trait]
impl SchemaIntrospection for FakeDriver {
    async fn list_tables(&self) -> Result<Vec<String>> {
        self.check_introspection()?;
        Ok(self.table_names())
    }

    async fn list_tables_like(&self, prefix: &str) -> Result<Vec<String>> {
        self.check_introspection()?;
        Ok(self.table_names().into_iter().filter(|t| t.starts_with(prefix)).collect())
    }

    async fn list_schema_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        self.check_introspection()?;
        Ok(self.state().tables.get(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexMeta>> {
        self.check_introspection()?;
        Ok(self.state().tables.get(table).map(|t| t.indexes.clone()).unwrap_or_default())
    }

    async fn index_usage_stats(&self) -> Result<Vec<IndexUsageRecord>> {
        self.check_introspection()?;
        Ok(self.state().usage.clone())
    }
}

#[async_trait]
impl SchemaAdmin for FakeDriver {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.state().tables.contains_key(table))
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.rows)
            .ok_or_else(|| OptimizerError::NotFound(format!("no table '{table}'")))
    }

    async fn create_index(&self, index_name: &str, table: &str, column: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_index_creation.contains(index_name) {
            return Err(OptimizerError::DdlFailed {
                object: index_name.to_string(),
                reason: "scripted failure".into(),
            });
        }
        state.indexes_created.push(index_name.to_string());
        state.tables.entry(table.to_string()).or_default().indexes.push(IndexMeta {
            table: table.to_string(),
            name: index_name.to_string(),
            columns: vec![column.to_string()],
            unique: false,
        });
        Ok(())
    }

    async fn create_partition_table(
        &self,
        _base_table: &str,
        partition: &str,
        _partition_column: &str,
    ) -> Result<()> {
        self.state().tables.entry(partition.to_string()).or_default();
        Ok(())
    }

    async fn copy_rows(&self, source: &str, destination: &str) -> Result<u64> {
        let mut state = self.state();
        let source_rows = state
            .tables
            .get(source)
            .map(|t| t.rows)
            .ok_or_else(|| OptimizerError::NotFound(format!("no table '{source}'")))?;
        let copied = source_rows.saturating_sub(state.copy_shortfall);
        state
            .tables
            .insert(destination.to_string(), FakeTable { rows: copied, ..FakeTable::default() });
        Ok(copied)
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        self.state().tables.remove(table);
        Ok(())
    }

    async fn refresh_statistics(&self, table: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_statistics.contains(table) {
            return Err(OptimizerError::DdlFailed {
                object: table.to_string(),
                reason: "scripted failure".into(),
            });
        }
        state.statistics_refreshed.push(table.to_string());
        Ok(())
    }
}
