//! Benchmark refresh scheduling.
//!
//! The dataset is loaded once at startup and then daily at a fixed UTC time.
//! Loading is blocking I/O and runs on the blocking pool. After a publish the
//! estimator is replayed against the appraised records and the calibration
//! is logged.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use valuation_benchmarks::{BenchmarkStore, RefreshOutcome};
use valuation_core::config::{NormalizerConfig, SchedulerConfig};
use valuation_core::{Error, Result};
use valuation_estimator::{CalibrationEvaluator, ValuationEstimator};
use valuation_ingestion::DatasetSource;

/// A refresh of the store from one dataset source.
pub struct RefreshJob {
    store: Arc<BenchmarkStore>,
    source: Box<dyn DatasetSource>,
    estimator: ValuationEstimator,
    normalizer: NormalizerConfig,
}

impl RefreshJob {
    pub fn new(
        store: Arc<BenchmarkStore>,
        source: Box<dyn DatasetSource>,
        estimator: ValuationEstimator,
        normalizer: NormalizerConfig,
    ) -> Self {
        Self {
            store,
            source,
            estimator,
            normalizer,
        }
    }

    /// Load, publish and calibrate. Skips if another refresh is running.
    pub fn run_once(&self) -> Result<RefreshOutcome> {
        let Some(guard) = self.store.try_begin_refresh() else {
            info!(source = %self.source.describe(), "benchmark refresh already running, skipped");
            return Ok(RefreshOutcome::Skipped);
        };

        let records = guard.load(self.source.as_ref())?;
        let snapshot = guard.publish(&records)?;

        let report = CalibrationEvaluator::new(&self.estimator, &self.normalizer)
            .evaluate(&records, &snapshot);
        if report.samples > 0 {
            info!(
                generation = snapshot.generation,
                samples = report.samples,
                mean_abs_pct_error = report.mean_abs_pct_error,
                median_abs_pct_error = report.median_abs_pct_error,
                within_68 = report.within_68,
                within_95 = report.within_95,
                "in-sample calibration"
            );
        } else {
            debug!(generation = snapshot.generation, "no appraised records to calibrate against");
        }

        Ok(RefreshOutcome::Published(snapshot))
    }
}

/// Run a refresh on the blocking pool.
pub async fn run_refresh(job: Arc<RefreshJob>) -> Result<RefreshOutcome> {
    tokio::task::spawn_blocking(move || job.run_once())
        .await
        .map_err(|e| Error::Other(format!("refresh task failed: {e}")))?
}

/// First instant strictly after `now` at `hour:minute` UTC.
pub fn next_run_after(now: DateTime<Utc>, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
    let time = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| Error::config(format!("invalid refresh time {hour:02}:{minute:02}")))?;
    let today = Utc.from_utc_datetime(&time);
    Ok(if today > now {
        today
    } else {
        today + Duration::days(1)
    })
}

/// Spawn the daily refresh loop.
pub fn spawn_daily(job: Arc<RefreshJob>, schedule: SchedulerConfig) -> Result<JoinHandle<()>> {
    // Fail at startup rather than inside the loop.
    next_run_after(Utc::now(), schedule.hour_utc, schedule.minute_utc)?;

    Ok(tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Ok(next) = next_run_after(now, schedule.hour_utc, schedule.minute_utc) else {
                return;
            };
            info!(next = %next, "next benchmark refresh scheduled");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if let Err(e) = run_refresh(Arc::clone(&job)).await {
                warn!(error = %e, "scheduled benchmark refresh failed");
            }
        }
    }))
}
