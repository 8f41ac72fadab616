//! Valuation model.
//!
//! The point estimate blends two approaches anchored to the province's
//! benchmark row:
//!
//! - earnings: `ebitda_or_sde * ebitda_multiple`
//! - revenue: `collections * avg_ebitda_margin * ebitda_multiple`
//!
//! The blend is scaled by a bounded physical-capacity factor comparing the
//! practice's operatory count and space per operatory with the province
//! means. The factor does not depend on collections, so the estimate is
//! non-decreasing in collections.
//!
//! Intervals treat the valuation multiple as log-normal: the `p` interval is
//! `estimate * exp(±z_p * sigma)` with `z_p` the two-sided standard normal
//! quantile. They are therefore non-negative, contain the estimate, and the
//! outer interval contains the inner one.
//!
//! Products that overflow saturate at `f64::MAX`, so every output is finite.

use statrs::distribution::{ContinuousCDF, Normal};
use tracing::trace;
use valuation_benchmarks::BenchmarkSnapshot;
use valuation_core::config::EstimatorConfig;
use valuation_core::{
    BenchmarkRow, Error, PracticeFeatures, Result, ValuationDetails, ValuationResult,
};

/// Standard normal quantiles of the two configured interval coverages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBands {
    /// Quantile of the inner (68%) interval.
    pub z_inner: f64,
    /// Quantile of the outer (95%) interval.
    pub z_outer: f64,
}

impl IntervalBands {
    /// Compute the two-sided quantiles for the given coverages.
    pub fn from_coverage(inner: f64, outer: f64) -> Result<Self> {
        if !(0.0 < inner && inner < outer && outer < 1.0) {
            return Err(Error::config(format!(
                "interval coverages must satisfy 0 < inner < outer < 1, got {inner} / {outer}"
            )));
        }
        let normal = Normal::new(0.0, 1.0).map_err(|e| Error::config(e.to_string()))?;
        Ok(Self {
            z_inner: normal.inverse_cdf(0.5 + inner / 2.0),
            z_outer: normal.inverse_cdf(0.5 + outer / 2.0),
        })
    }
}

/// Valuation estimator with precomputed interval quantiles.
#[derive(Debug, Clone)]
pub struct ValuationEstimator {
    config: EstimatorConfig,
    bands: IntervalBands,
}

impl ValuationEstimator {
    /// Create an estimator from configuration.
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        if !(config.log_sigma > 0.0) {
            return Err(Error::config("estimator.log_sigma must be positive"));
        }
        let bands = IntervalBands::from_coverage(config.inner_coverage, config.outer_coverage)?;
        Ok(Self { config, bands })
    }

    /// Interval quantiles in use.
    pub fn bands(&self) -> IntervalBands {
        self.bands
    }

    /// Value a practice against the prior a snapshot holds for its province.
    ///
    /// `details.benchmark_province` is `None` when the national row was used.
    pub fn valuate(&self, features: &PracticeFeatures, snapshot: &BenchmarkSnapshot) -> ValuationResult {
        let (prior, scope) = snapshot.prior_for(features.province);
        let mut result = self.estimate(features, prior);
        result.details.benchmark_province = scope;
        result
    }

    /// Estimate the value of a practice against a benchmark row.
    ///
    /// `details.benchmark_province` reports the row's own province; use
    /// [`ValuationEstimator::valuate`] when the row may be the national one.
    pub fn estimate(&self, features: &PracticeFeatures, benchmark: &BenchmarkRow) -> ValuationResult {
        let cfg = &self.config;

        let earnings_value = saturate(features.ebitda_or_sde * benchmark.ebitda_multiple);
        let revenue_value = saturate(features.collections * benchmark.revenue_multiple());
        let blended = saturate(
            cfg.earnings_weight * earnings_value + (1.0 - cfg.earnings_weight) * revenue_value,
        );

        let capacity_adj = self.capacity_adjustment(features, benchmark);
        let space_adj = self.space_adjustment(features, benchmark);
        let adjustment_factor = (1.0 + capacity_adj + space_adj)
            .clamp(1.0 - cfg.max_adjustment, 1.0 + cfg.max_adjustment);

        let estimate = saturate(blended * adjustment_factor).max(0.0);
        let range_68 = self.interval(estimate, self.bands.z_inner);
        let range_95 = self.interval(estimate, self.bands.z_outer);

        trace!(
            province = %features.province,
            earnings_value,
            revenue_value,
            adjustment_factor,
            estimate,
            "valuation estimated"
        );

        ValuationResult {
            estimate,
            range_68,
            range_95,
            details: ValuationDetails {
                collections: features.collections,
                ebitda_or_sde: features.ebitda_or_sde,
                equipped_ops: features.equipped_ops,
                sqft: features.sqft,
                sqft_per_op: features.sqft_per_op(),
                earnings_value,
                revenue_value,
                capacity_adj,
                space_adj,
                adjustment_factor,
                benchmark_province: Some(benchmark.province),
            },
        }
    }

    /// Premium or discount for operatory count relative to the province mean.
    fn capacity_adjustment(&self, features: &PracticeFeatures, benchmark: &BenchmarkRow) -> f64 {
        if features.equipped_ops == 0 || benchmark.ops_mean <= 0.0 {
            return 0.0;
        }
        let relative = features.equipped_ops as f64 / benchmark.ops_mean - 1.0;
        (self.config.capacity_sensitivity * relative)
            .clamp(-self.config.capacity_band, self.config.capacity_band)
    }

    /// Premium for compact space per operatory, discount for excess space.
    fn space_adjustment(&self, features: &PracticeFeatures, benchmark: &BenchmarkRow) -> f64 {
        if features.equipped_ops == 0 || benchmark.sqft_per_op_mean <= 0.0 {
            return 0.0;
        }
        let ratio = features.sqft_per_op() / benchmark.sqft_per_op_mean;
        let tolerance = self.config.space_tolerance;
        if ratio < 1.0 - tolerance {
            self.config.space_adjustment
        } else if ratio > 1.0 + tolerance {
            -self.config.space_adjustment
        } else {
            0.0
        }
    }

    /// Multiplicative interval around the estimate.
    fn interval(&self, estimate: f64, z: f64) -> [f64; 2] {
        let spread = (z * self.config.log_sigma).exp();
        [(estimate / spread).max(0.0), saturate(estimate * spread)]
    }
}

/// Clamp an overflowed product to the largest finite value.
fn saturate(value: f64) -> f64 {
    value.min(f64::MAX)
}
