//! Database driver implementations
//!
//! One module per supported engine; each implements the core ports
//! ([`dbtune_core::ports`]) plus the pool's [`crate::pool::ConnectionFactory`].
//! Engine-flavored SQL and DDL text lives only here.

pub mod sqlite;

pub use sqlite::SqliteDriver;
