//! Index advisor
//!
//! Scores candidate (table, column) pairs for indexing from telemetry
//! evidence and static schema heuristics, and can apply high-confidence
//! suggestions through the [`crate::ports::SchemaAdmin`] port.

pub mod extract;
pub mod service;

pub use extract::{extract_candidate_columns, ColumnRef};
pub use service::IndexAdvisor;
