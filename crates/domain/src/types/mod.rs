//! Domain data types for the optimization suite

pub mod index;
pub mod partition;
pub mod pool;
pub mod report;
pub mod telemetry;

pub use index::*;
pub use partition::*;
pub use pool::*;
pub use report::*;
pub use telemetry::*;
