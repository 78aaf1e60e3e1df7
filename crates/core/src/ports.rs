//! Database access ports.
//!
//! The optimization suite never speaks to an engine directly; everything
//! flows through these traits. Engine-flavored SQL and DDL text is
//! confined to implementations, keeping the analysis and maintenance
//! logic engine-agnostic and unit-testable against fakes.

use async_trait::async_trait;
use dbtune_domain::types::{ColumnMeta, IndexMeta, IndexUsageRecord};
use dbtune_domain::Result;

/// Port for executing queries against a managed database.
///
/// Implemented by the connection pool manager so that every execution is
/// pooled and feeds the telemetry store.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `sql` against the database known as `alias`, binding
    /// `params` positionally. Returns result rows with every value
    /// rendered as text.
    async fn execute_query(
        &self,
        alias: &str,
        sql: &str,
        params: &[String],
    ) -> Result<Vec<Vec<String>>>;
}

/// Port for read-only schema metadata.
///
/// Failures here must degrade the caller to "no suggestions this cycle",
/// never abort the suite.
#[async_trait]
pub trait SchemaIntrospection: Send + Sync {
    /// List user tables in the schema.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// List tables whose name starts with `prefix`.
    async fn list_tables_like(&self, prefix: &str) -> Result<Vec<String>>;

    /// Describe the columns of `table`.
    async fn list_schema_columns(&self, table: &str) -> Result<Vec<ColumnMeta>>;

    /// List the indexes present on `table`.
    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexMeta>>;

    /// Engine-level index usage counters, when the engine exposes them.
    /// Engines without usage accounting return an empty set.
    async fn index_usage_stats(&self) -> Result<Vec<IndexUsageRecord>>;
}

/// Port for schema maintenance DDL.
///
/// The only place engine-flavored DDL text is allowed. Each operation is
/// idempotent where the underlying engine permits (`IF NOT EXISTS`
/// semantics), so re-running maintenance is never an error.
#[async_trait]
pub trait SchemaAdmin: Send + Sync {
    /// Whether `table` exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Count the rows of `table`.
    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Create a single-column index named `index_name` on
    /// `table(column)`. A no-op when the index already exists.
    async fn create_index(&self, index_name: &str, table: &str, column: &str) -> Result<()>;

    /// Create `partition` with the column shape of `base_table`. A no-op
    /// when the partition already exists.
    async fn create_partition_table(
        &self,
        base_table: &str,
        partition: &str,
        partition_column: &str,
    ) -> Result<()>;

    /// Copy every row of `source` into `destination` with
    /// ignore-duplicate semantics, creating `destination` if needed.
    /// Returns the row count of `destination` after the copy.
    async fn copy_rows(&self, source: &str, destination: &str) -> Result<u64>;

    /// Drop `table` if it exists.
    async fn drop_table(&self, table: &str) -> Result<()>;

    /// Refresh engine statistics for `table` (`ANALYZE` or equivalent).
    async fn refresh_statistics(&self, table: &str) -> Result<()>;
}
