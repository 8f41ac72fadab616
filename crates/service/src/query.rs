//! Query service.
//!
//! Stateless apart from the shared benchmark store: every call loads the
//! current snapshot once and works from it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use valuation_benchmarks::BenchmarkStore;
use valuation_core::config::NormalizerConfig;
use valuation_core::{BenchmarkRow, Province, RawPracticeInput, Result, ValuationResult};
use valuation_estimator::ValuationEstimator;
use valuation_ingestion::normalize;

/// Liveness and snapshot status.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub version: &'static str,
    /// Whether a benchmark snapshot is available.
    pub ready: bool,
    pub snapshot_generation: Option<u64>,
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// Answers valuation and benchmark queries.
pub struct QueryService {
    store: Arc<BenchmarkStore>,
    estimator: ValuationEstimator,
    normalizer: NormalizerConfig,
    round_to_dollars: bool,
}

impl QueryService {
    /// Create a query service over a shared store.
    pub fn new(
        store: Arc<BenchmarkStore>,
        estimator: ValuationEstimator,
        normalizer: NormalizerConfig,
        round_to_dollars: bool,
    ) -> Self {
        Self {
            store,
            estimator,
            normalizer,
            round_to_dollars,
        }
    }

    /// Value a practice.
    ///
    /// Fails with `BenchmarkUnavailable` only before the first refresh.
    pub fn predict(&self, raw: &RawPracticeInput) -> Result<ValuationResult> {
        let snapshot = self.store.snapshot()?;
        let features = normalize(raw, &self.normalizer);
        let result = self.estimator.valuate(&features, &snapshot);

        debug!(
            province = %features.province,
            national_prior = result.details.benchmark_province.is_none(),
            generation = snapshot.generation,
            estimate = result.estimate,
            "prediction"
        );

        Ok(if self.round_to_dollars {
            result.rounded()
        } else {
            result
        })
    }

    /// All benchmark rows, or the row of one province.
    ///
    /// A code that is unrecognized or has no row yields an empty list.
    pub fn benchmarks(&self, province: Option<&str>) -> Result<Vec<BenchmarkRow>> {
        let snapshot = self.store.snapshot()?;
        Ok(match province {
            None => snapshot.rows().to_vec(),
            Some(code) => Province::parse_code(code)
                .and_then(|p| snapshot.get(p))
                .cloned()
                .into_iter()
                .collect(),
        })
    }

    /// Service status.
    pub fn health(&self) -> HealthReport {
        let snapshot = self.store.snapshot().ok();
        HealthReport {
            ok: true,
            version: env!("CARGO_PKG_VERSION"),
            ready: snapshot.is_some(),
            snapshot_generation: snapshot.as_ref().map(|s| s.generation),
            refreshed_at: snapshot.as_ref().map(|s| s.published_at),
        }
    }
}
