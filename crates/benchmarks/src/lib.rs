//! Per-province benchmark aggregation for the valuation system.
//!
//! This crate handles:
//! - Validating dataset records and partitioning them by province
//! - Computing per-province and national benchmark rows
//! - Publishing immutable snapshots with an atomic pointer swap
//! - Serializing refreshes (overlapping refreshes are dropped)

pub mod aggregation;
pub mod store;

pub use aggregation::BenchmarkSnapshot;
pub use store::{BenchmarkStore, RefreshGuard, RefreshOutcome};
