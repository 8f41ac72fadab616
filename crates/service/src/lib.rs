//! Query boundary for the practice valuation system.
//!
//! Exposes:
//! - `predict` and `benchmarks` over the shared benchmark store
//! - the axum routes `/api/predict`, `/api/benchmarks` and `/api/health`
//! - the startup load and daily benchmark refresh

pub mod query;
pub mod http;
pub mod refresh;

pub use query::{HealthReport, QueryService};
pub use http::router;
pub use refresh::RefreshJob;
