//! Automatic partitioning and archival
//!
//! Maintains the static table→policy map, materialises forward-looking
//! partitions, and archives partitions past their retention window. All
//! DDL flows through the [`crate::ports::SchemaAdmin`] port.

pub mod periods;
pub mod service;

pub use periods::{parse_partition_bound, period_containing, upcoming_periods, PeriodBound};
pub use service::PartitionManager;
