//! Configuration structures for the practice valuation system.
//!
//! Every policy constant used by the normalizer, the benchmark aggregation
//! and the estimator lives here so they can be recalibrated without touching
//! the algorithms.

use crate::error::{Error, Result};
use crate::types::Province;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration for the valuation service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Input defaulting configuration.
    pub normalizer: NormalizerConfig,
    /// Benchmark aggregation configuration.
    pub benchmarks: BenchmarkConfig,
    /// Estimator configuration.
    pub estimator: EstimatorConfig,
    /// HTTP service configuration.
    pub service: ServiceConfig,
    /// Dataset source configuration.
    pub dataset: DatasetConfig,
    /// Refresh schedule configuration.
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing sections take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configured constants are usable.
    pub fn validate(&self) -> Result<()> {
        let e = &self.estimator;
        if !(0.0..=1.0).contains(&e.earnings_weight) {
            return Err(Error::config(format!(
                "estimator.earnings_weight must be in [0, 1], got {}",
                e.earnings_weight
            )));
        }
        if !(e.log_sigma > 0.0) || !e.log_sigma.is_finite() {
            return Err(Error::config(format!(
                "estimator.log_sigma must be positive, got {}",
                e.log_sigma
            )));
        }
        if !(0.0 < e.inner_coverage && e.inner_coverage < e.outer_coverage && e.outer_coverage < 1.0)
        {
            return Err(Error::config(format!(
                "interval coverages must satisfy 0 < inner < outer < 1, got {} / {}",
                e.inner_coverage, e.outer_coverage
            )));
        }
        if !(0.0..1.0).contains(&e.max_adjustment) {
            return Err(Error::config("estimator.max_adjustment must be in [0, 1)"));
        }
        if self.normalizer.ebitda_fallback_ratio < 0.0 || self.normalizer.sqft_per_op < 0.0 {
            return Err(Error::config("normalizer ratios must be non-negative"));
        }
        if !(self.benchmarks.national_multiple > 0.0) {
            return Err(Error::config("benchmarks.national_multiple must be positive"));
        }
        if let Some((province, multiple)) = self
            .benchmarks
            .province_multiples
            .iter()
            .find(|(_, m)| !(**m > 0.0))
        {
            return Err(Error::config(format!(
                "benchmarks.province_multiples[{province}] must be positive, got {multiple}"
            )));
        }
        if self.scheduler.hour_utc > 23 || self.scheduler.minute_utc > 59 {
            return Err(Error::config(format!(
                "scheduler time {:02}:{:02} is out of range",
                self.scheduler.hour_utc, self.scheduler.minute_utc
            )));
        }
        Ok(())
    }
}

/// Defaults applied to partially-specified practice inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Earnings assumed as a fraction of collections when none are given.
    pub ebitda_fallback_ratio: f64,
    /// Square footage assumed per equipped operatory when none is given.
    pub sqft_per_op: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            ebitda_fallback_ratio: 0.25,
            sqft_per_op: 290.0,
        }
    }
}

/// Benchmark aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Margin used when no record in a province has usable earnings.
    pub default_margin: f64,
    /// Square footage per operatory used when no record has usable sizes.
    pub default_sqft_per_op: f64,
    /// EBITDA multiple used when neither the data nor a province constant
    /// supplies one.
    pub national_multiple: f64,
    /// Per-province calibrated EBITDA multiples.
    pub province_multiples: BTreeMap<Province, f64>,
}

impl BenchmarkConfig {
    /// Calibration multiple for a province, falling back to the national one.
    pub fn calibrated_multiple(&self, province: Province) -> f64 {
        self.province_multiples
            .get(&province)
            .copied()
            .unwrap_or(self.national_multiple)
    }
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            default_margin: 0.25,
            default_sqft_per_op: 290.0,
            national_multiple: 3.8,
            province_multiples: BTreeMap::new(),
        }
    }
}

/// Estimator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Weight of the earnings-based value in the blend (revenue gets the rest).
    pub earnings_weight: f64,
    /// Adjustment per unit of relative operatory-count deviation.
    pub capacity_sensitivity: f64,
    /// Maximum absolute capacity adjustment.
    pub capacity_band: f64,
    /// Relative deviation of sqft/op from the benchmark tolerated without
    /// adjustment.
    pub space_tolerance: f64,
    /// Adjustment applied when sqft/op falls outside the tolerance.
    pub space_adjustment: f64,
    /// Bound on the combined physical adjustment (factor in [1-x, 1+x]).
    pub max_adjustment: f64,
    /// Standard deviation of log valuation multiples.
    pub log_sigma: f64,
    /// Coverage probability of the inner interval.
    pub inner_coverage: f64,
    /// Coverage probability of the outer interval.
    pub outer_coverage: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            earnings_weight: 0.70,
            capacity_sensitivity: 0.04,
            capacity_band: 0.06,
            space_tolerance: 0.15,
            space_adjustment: 0.03,
            max_adjustment: 0.10,
            log_sigma: 0.15,
            inner_coverage: 0.68,
            outer_coverage: 0.95,
        }
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Socket address to bind.
    pub bind: String,
    /// Round monetary outputs to whole dollars.
    pub round_to_dollars: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            round_to_dollars: true,
        }
    }
}

/// Kind of tabular source backing the benchmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    /// JSON array of records.
    Json,
    /// SQLite table.
    Sqlite,
}

/// Dataset source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Source kind.
    pub kind: DatasetKind,
    /// Path to the JSON file or SQLite database.
    pub path: PathBuf,
    /// Table name for SQLite sources.
    pub table: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            kind: DatasetKind::Json,
            path: PathBuf::from("data/appraisal_dataset.json"),
            table: "appraisal_dataset".to_string(),
        }
    }
}

/// Refresh schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Run the recurring refresh (the startup load always runs).
    pub enabled: bool,
    /// Hour of day (UTC) of the daily refresh.
    pub hour_utc: u32,
    /// Minute of the hour (UTC) of the daily refresh.
    pub minute_utc: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hour_utc: 2,
            minute_utc: 0,
        }
    }
}
