//! SQLite driver.
//!
//! Implements the query, introspection, and schema-admin ports over
//! rusqlite. All SQLite-flavored SQL text in the workspace is confined
//! to this module.
//!
//! SQLite specifics:
//! - There are no native range partitions; partition tables are plain
//!   tables sharing the base table's column shape, selected by their
//!   name-encoded period.
//! - The engine keeps no per-index usage counters, so
//!   `index_usage_stats` returns an empty set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dbtune_core::ports::{SchemaAdmin, SchemaIntrospection};
use dbtune_domain::config::DatabaseConfig;
use dbtune_domain::types::{ColumnMeta, IndexMeta, IndexUsageRecord};
use dbtune_domain::{OptimizerError, Result};
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use tracing::debug;

use crate::pool::{ConnectionFactory, PoolConnection};

/// SQLite implementation of the driver ports.
///
/// Pools are served for every configured alias; introspection and
/// maintenance DDL target the first configured database (the primary).
pub struct SqliteDriver {
    databases: HashMap<String, PathBuf>,
    primary: String,
}

impl SqliteDriver {
    /// Build a driver from the configured databases. The first entry
    /// becomes the primary for introspection and DDL.
    pub fn new(databases: &[DatabaseConfig]) -> Result<Self> {
        let primary = databases
            .first()
            .map(|db| db.alias.clone())
            .ok_or_else(|| OptimizerError::Config("no databases configured".into()))?;
        let databases = databases
            .iter()
            .map(|db| (db.alias.clone(), PathBuf::from(&db.path)))
            .collect();
        Ok(Self { databases, primary })
    }

    /// Driver for a single database.
    pub fn single(alias: impl Into<String>, path: impl AsRef<Path>) -> Self {
        let alias = alias.into();
        let mut databases = HashMap::new();
        databases.insert(alias.clone(), path.as_ref().to_path_buf());
        Self { databases, primary: alias }
    }

    fn open(&self, alias: &str) -> Result<Connection> {
        let path = self
            .databases
            .get(alias)
            .ok_or_else(|| OptimizerError::NotFound(format!("no database for alias '{alias}'")))?;
        Connection::open(path).map_err(|err| OptimizerError::ConnectionCreateFailed {
            alias: alias.to_string(),
            reason: err.to_string(),
        })
    }

    fn open_primary(&self) -> Result<Connection> {
        self.open(&self.primary)
    }
}

impl ConnectionFactory for SqliteDriver {
    fn connect(&self, alias: &str) -> Result<Box<dyn PoolConnection>> {
        let conn = self.open(alias)?;
        Ok(Box::new(SqliteConnection { conn: Some(conn) }))
    }
}

/// One pooled SQLite session.
struct SqliteConnection {
    conn: Option<Connection>,
}

impl PoolConnection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &[String]) -> Result<Vec<Vec<String>>> {
        let conn = self
            .conn
            .as_ref()
            .ok_or_else(|| OptimizerError::Internal("connection is closed".into()))?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let column_count = stmt.column_count();

        if column_count == 0 {
            stmt.execute(rusqlite::params_from_iter(params.iter())).map_err(query_error)?;
            return Ok(Vec::new());
        }

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter())).map_err(query_error)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(query_error)? {
            let mut values = Vec::with_capacity(column_count);
            for i in 0..column_count {
                values.push(render_value(row.get_ref(i).map_err(query_error)?));
            }
            out.push(values);
        }
        Ok(out)
    }

    fn is_valid(&mut self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0)).is_ok())
    }

    fn close(&mut self) {
        self.conn.take();
    }
}

#[async_trait]
impl SchemaIntrospection for SqliteDriver {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.open_primary()?;
        query_names(
            &conn,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            [],
        )
    }

    async fn list_tables_like(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.open_primary()?;
        query_names(
            &conn,
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE ?1 ESCAPE '\\' ORDER BY name",
            [format!("{}%", escape_like(prefix))],
        )
    }

    async fn list_schema_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let conn = self.open_primary()?;
        let indexes = list_indexes_sync(&conn, table)?;
        let foreign_keys = query_names(
            &conn,
            "SELECT \"from\" FROM pragma_foreign_key_list(?1)",
            [table.to_string()],
        )?;

        let mut stmt = conn
            .prepare("SELECT name, type, pk FROM pragma_table_info(?1)")
            .map_err(introspection_error)?;
        let rows = stmt
            .query_map([table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
            })
            .map_err(introspection_error)?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, data_type, pk) = row.map_err(introspection_error)?;
            let has_index = indexes.iter().any(|idx| idx.covers(&name));
            let is_unique = indexes
                .iter()
                .any(|idx| idx.unique && idx.columns.len() == 1 && idx.covers(&name));
            let is_foreign_key = foreign_keys.iter().any(|fk| fk.eq_ignore_ascii_case(&name));
            columns.push(ColumnMeta {
                table: table.to_string(),
                name,
                data_type,
                is_primary_key: pk > 0,
                is_unique,
                is_foreign_key,
                has_index,
            });
        }
        Ok(columns)
    }

    async fn list_indexes(&self, table: &str) -> Result<Vec<IndexMeta>> {
        let conn = self.open_primary()?;
        list_indexes_sync(&conn, table)
    }

    async fn index_usage_stats(&self) -> Result<Vec<IndexUsageRecord>> {
        debug!("sqlite exposes no index usage counters; returning empty set");
        Ok(Vec::new())
    }
}

#[async_trait]
impl SchemaAdmin for SqliteDriver {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let conn = self.open_primary()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .map_err(introspection_error)?;
        Ok(count > 0)
    }

    async fn row_count(&self, table: &str) -> Result<u64> {
        let conn = self.open_primary()?;
        let table = ident(table)?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))
            .map_err(introspection_error)?;
        u64::try_from(count)
            .map_err(|_| OptimizerError::Internal(format!("negative row count for {table}")))
    }

    async fn create_index(&self, index_name: &str, table: &str, column: &str) -> Result<()> {
        let conn = self.open_primary()?;
        let (index_name, table, column) = (ident(index_name)?, ident(table)?, ident(column)?);
        conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS \"{index_name}\" ON \"{table}\" (\"{column}\")"),
            [],
        )
        .map_err(|err| ddl_error(index_name, err))?;
        Ok(())
    }

    async fn create_partition_table(
        &self,
        base_table: &str,
        partition: &str,
        _partition_column: &str,
    ) -> Result<()> {
        let conn = self.open_primary()?;
        let (base_table, partition) = (ident(base_table)?, ident(partition)?);
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{partition}\" AS SELECT * FROM \"{base_table}\" WHERE 0 = 1"
            ),
            [],
        )
        .map_err(|err| ddl_error(partition, err))?;
        Ok(())
    }

    async fn copy_rows(&self, source: &str, destination: &str) -> Result<u64> {
        let conn = self.open_primary()?;
        let (source, destination) = (ident(source)?, ident(destination)?);
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{destination}\" AS SELECT * FROM \"{source}\" WHERE 0 = 1"
            ),
            [],
        )
        .map_err(|err| ddl_error(destination, err))?;
        conn.execute(
            &format!("INSERT OR IGNORE INTO \"{destination}\" SELECT * FROM \"{source}\""),
            [],
        )
        .map_err(|err| ddl_error(destination, err))?;

        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{destination}\""), [], |row| row.get(0))
            .map_err(introspection_error)?;
        u64::try_from(count)
            .map_err(|_| OptimizerError::Internal(format!("negative row count for {destination}")))
    }

    async fn drop_table(&self, table: &str) -> Result<()> {
        let conn = self.open_primary()?;
        let table = ident(table)?;
        conn.execute(&format!("DROP TABLE IF EXISTS \"{table}\""), [])
            .map_err(|err| ddl_error(table, err))?;
        Ok(())
    }

    async fn refresh_statistics(&self, table: &str) -> Result<()> {
        let conn = self.open_primary()?;
        let table = ident(table)?;
        conn.execute_batch(&format!("ANALYZE \"{table}\""))
            .map_err(|err| ddl_error(table, err))?;
        Ok(())
    }
}

fn list_indexes_sync(conn: &Connection, table: &str) -> Result<Vec<IndexMeta>> {
    let mut stmt = conn
        .prepare("SELECT name, \"unique\" FROM pragma_index_list(?1)")
        .map_err(introspection_error)?;
    let index_rows = stmt
        .query_map([table], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
        .map_err(introspection_error)?;

    let mut indexes = Vec::new();
    for row in index_rows {
        let (name, unique) = row.map_err(introspection_error)?;
        let columns = query_names(
            conn,
            "SELECT name FROM pragma_index_info(?1) ORDER BY seqno",
            [name.clone()],
        )?;
        indexes.push(IndexMeta { table: table.to_string(), name, columns, unique: unique != 0 });
    }
    Ok(indexes)
}

fn query_names<P: rusqlite::Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql).map_err(introspection_error)?;
    let rows = stmt.query_map(params, |row| row.get::<_, String>(0)).map_err(introspection_error)?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(introspection_error)?);
    }
    Ok(names)
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned(),
        ValueRef::Blob(blob) => format!("<{} bytes>", blob.len()),
    }
}

/// DDL identifiers are assembled from configuration and introspection
/// output; restrict them to word characters before interpolation.
fn ident(name: &str) -> Result<&str> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.chars().next().is_some_and(|c| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(OptimizerError::InvalidInput(format!("invalid identifier '{name}'")))
    }
}

/// Escape `%` and `_` so a table prefix matches literally in LIKE
/// (paired with `ESCAPE '\'` in the query).
fn escape_like(prefix: &str) -> String {
    prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn query_error(err: rusqlite::Error) -> OptimizerError {
    OptimizerError::Query(err.to_string())
}

fn introspection_error(err: rusqlite::Error) -> OptimizerError {
    OptimizerError::SchemaIntrospection(err.to_string())
}

fn ddl_error(object: &str, err: rusqlite::Error) -> OptimizerError {
    OptimizerError::DdlFailed { object: object.to_string(), reason: err.to_string() }
}
