//! Calibration metrics.
//!
//! Replays appraised practices from the dataset through the normalizer and
//! estimator and measures how far estimates land from the appraisals and
//! how often the intervals cover them. The multiples come from the same
//! appraisals, so these are in-sample figures.

use serde::Serialize;
use serde_json::Value;
use statrs::statistics::{Data, OrderStatistics, Statistics};
use valuation_benchmarks::BenchmarkSnapshot;
use valuation_core::config::NormalizerConfig;
use valuation_core::{PracticeRecord, RawPracticeInput};
use valuation_ingestion::normalize;

use crate::model::ValuationEstimator;

/// Calibration metrics over appraised practices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationReport {
    /// Appraised practices evaluated.
    pub samples: usize,
    /// Mean absolute percentage error of the estimate.
    pub mean_abs_pct_error: f64,
    /// Median absolute percentage error of the estimate.
    pub median_abs_pct_error: f64,
    /// Fraction of appraisals inside the 68% interval.
    pub within_68: f64,
    /// Fraction of appraisals inside the 95% interval.
    pub within_95: f64,
}

/// Evaluates an estimator against the appraised records of a dataset.
pub struct CalibrationEvaluator<'a> {
    estimator: &'a ValuationEstimator,
    normalizer: &'a NormalizerConfig,
}

fn to_raw(record: &PracticeRecord) -> RawPracticeInput {
    RawPracticeInput {
        province: Some(Value::from(record.province.as_str())),
        collections: record.collections.map(Value::from),
        ebitda_or_sde: record.ebitda_or_sde.map(Value::from),
        equipped_ops: record.equipped_ops.map(Value::from),
        sqft: record.sqft.map(Value::from),
    }
}

impl<'a> CalibrationEvaluator<'a> {
    /// Create an evaluator.
    pub fn new(estimator: &'a ValuationEstimator, normalizer: &'a NormalizerConfig) -> Self {
        Self {
            estimator,
            normalizer,
        }
    }

    /// Evaluate every record with a positive appraised value.
    pub fn evaluate(&self, records: &[PracticeRecord], snapshot: &BenchmarkSnapshot) -> CalibrationReport {
        let mut errors: Vec<f64> = Vec::new();
        let mut within_68 = 0usize;
        let mut within_95 = 0usize;

        for record in records {
            let Some(appraised) = record.appraised_value.filter(|v| *v > 0.0) else {
                continue;
            };

            let features = normalize(&to_raw(record), self.normalizer);
            let result = self.estimator.valuate(&features, snapshot);

            errors.push((result.estimate - appraised).abs() / appraised);
            if result.range_68[0] <= appraised && appraised <= result.range_68[1] {
                within_68 += 1;
            }
            if result.range_95[0] <= appraised && appraised <= result.range_95[1] {
                within_95 += 1;
            }
        }

        if errors.is_empty() {
            return CalibrationReport::default();
        }

        let samples = errors.len();
        let n = samples as f64;
        let mean_abs_pct_error = errors.iter().mean();
        let median_abs_pct_error = Data::new(errors).median();

        CalibrationReport {
            samples,
            mean_abs_pct_error,
            median_abs_pct_error,
            within_68: within_68 as f64 / n,
            within_95: within_95 as f64 / n,
        }
    }
}
