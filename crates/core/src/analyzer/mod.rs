//! Query pattern analysis
//!
//! Consumes the telemetry store, classifies digests by shape, flags
//! N+1-suspect, slow, and inefficient patterns, and emits descriptive
//! optimization suggestions plus a window performance score. Nothing in
//! this module ever changes the database.

pub mod classify;
pub mod service;

pub use classify::classify;
pub use service::QueryPatternAnalyzer;
