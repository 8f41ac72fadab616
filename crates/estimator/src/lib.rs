//! Valuation estimation for the practice valuation system.
//!
//! This crate provides:
//! - Earnings/revenue blended point estimates anchored to a benchmark row
//! - Bounded physical-capacity adjustment
//! - Log-normal 68% / 95% valuation intervals
//! - Calibration metrics against appraised practices

pub mod model;
pub mod calibration;

pub use model::{IntervalBands, ValuationEstimator};
pub use calibration::{CalibrationEvaluator, CalibrationReport};
