//! # DbTune Core
//!
//! Pure optimization logic: no database drivers, no I/O.
//!
//! This crate contains:
//! - The query telemetry store and SQL normalization heuristics
//! - The query pattern analyzer (N+1 and inefficiency detection)
//! - The index advisor (candidate scoring and static schema heuristics)
//! - Partition planning (period math and maintenance decisions)
//! - Port traits through which every database access flows
//!
//! ## Architecture Principles
//! - Only depends on `dbtune-domain`
//! - All external access via the traits in [`ports`]
//! - Engine-flavored DDL text never appears here; it lives behind
//!   [`ports::SchemaAdmin`] implementations

pub mod advisor;
pub mod analyzer;
pub mod partition;
pub mod ports;
pub mod report;
pub mod telemetry;

// Re-export specific items to avoid ambiguity
pub use advisor::IndexAdvisor;
pub use analyzer::{classify, QueryPatternAnalyzer};
pub use partition::PartitionManager;
pub use ports::{QueryExecutor, SchemaAdmin, SchemaIntrospection};
pub use telemetry::{normalize_sql, QueryTelemetryStore};
