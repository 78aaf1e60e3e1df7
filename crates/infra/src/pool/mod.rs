//! Connection pooling
//!
//! A bounded pool per configured database alias, plus the manager that
//! owns every pool and runs the periodic health-check loop. Connections
//! are opaque [`PoolConnection`] trait objects produced by a
//! [`ConnectionFactory`], so the pool is engine-agnostic and testable
//! against fakes.

pub mod connection;
pub mod manager;
#[allow(clippy::module_inception)]
pub mod pool;

pub use connection::{ConnectionFactory, PoolConnection};
pub use manager::ConnectionPoolManager;
pub use pool::{ConnectionPool, PooledHandle};
