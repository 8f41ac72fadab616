//! Benchmark snapshot store.
//!
//! Readers load the current snapshot through [`arc_swap`] and never block.
//! A refresh builds a complete snapshot off to the side and publishes it
//! with a single pointer store, so a reader sees either the old table or
//! the new one in full. Only one refresh runs at a time; a refresh started
//! while another is in flight is dropped.

use crate::aggregation::BenchmarkSnapshot;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use valuation_core::config::BenchmarkConfig;
use valuation_core::{BenchmarkRow, Error, PracticeRecord, Province, Result};
use valuation_ingestion::{clean_records, DatasetSource};

/// Result of a refresh request.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// A new snapshot was published.
    Published(Arc<BenchmarkSnapshot>),
    /// Another refresh was in progress; nothing was done.
    Skipped,
}

/// Shared store of the current benchmark snapshot.
pub struct BenchmarkStore {
    /// Current snapshot; `None` until the first successful refresh.
    current: ArcSwapOption<BenchmarkSnapshot>,
    /// Set while a refresh holds the guard.
    refreshing: AtomicBool,
    /// Last generation handed out.
    generation: AtomicU64,
    /// Aggregation configuration.
    config: BenchmarkConfig,
}

impl BenchmarkStore {
    /// Create an empty store.
    pub fn new(config: BenchmarkConfig) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            refreshing: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            config,
        }
    }

    /// Whether a snapshot has been published.
    pub fn is_ready(&self) -> bool {
        self.current.load().is_some()
    }

    /// Current snapshot.
    ///
    /// Hold on to the returned `Arc` when several reads must agree.
    pub fn snapshot(&self) -> Result<Arc<BenchmarkSnapshot>> {
        self.current.load_full().ok_or(Error::BenchmarkUnavailable)
    }

    /// Row for a province, `None` when the province had no records.
    pub fn get(&self, province: Province) -> Result<Option<BenchmarkRow>> {
        Ok(self.snapshot()?.get(province).cloned())
    }

    /// Every row of the current snapshot in canonical order.
    pub fn all(&self) -> Result<Vec<BenchmarkRow>> {
        Ok(self.snapshot()?.rows().to_vec())
    }

    /// Claim the refresh slot, or `None` when a refresh is already running.
    pub fn try_begin_refresh(&self) -> Option<RefreshGuard<'_>> {
        self.refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard { store: self })
    }

    /// Load the source and publish a new snapshot.
    ///
    /// On failure the previous snapshot stays in effect and the error is
    /// returned to the caller only.
    pub fn refresh(&self, source: &dyn DatasetSource) -> Result<RefreshOutcome> {
        let Some(guard) = self.try_begin_refresh() else {
            debug!(source = %source.describe(), "refresh already in progress, skipping");
            return Ok(RefreshOutcome::Skipped);
        };
        let records = guard.load(source)?;
        guard.publish(&records).map(RefreshOutcome::Published)
    }
}

/// Exclusive right to refresh the store, released on drop.
pub struct RefreshGuard<'a> {
    store: &'a BenchmarkStore,
}

impl RefreshGuard<'_> {
    /// Load and clean the records of a source.
    pub fn load(&self, source: &dyn DatasetSource) -> Result<Vec<PracticeRecord>> {
        let records = source.load().map_err(|e| {
            warn!(source = %source.describe(), error = %e, "dataset load failed, keeping previous snapshot");
            e
        })?;
        let (records, stats) = clean_records(records);
        debug!(
            source = %source.describe(),
            input = stats.input_records,
            dropped_empty = stats.dropped_empty,
            dropped_duplicates = stats.dropped_duplicates,
            "dataset cleaned"
        );
        Ok(records)
    }

    /// Build a snapshot from records and publish it.
    pub fn publish(self, records: &[PracticeRecord]) -> Result<Arc<BenchmarkSnapshot>> {
        let generation = self.store.generation.load(Ordering::Acquire) + 1;
        let snapshot = BenchmarkSnapshot::build(records, &self.store.config, generation)
            .map_err(|e| {
                warn!(error = %e, "benchmark aggregation failed, keeping previous snapshot");
                e
            })?;
        let snapshot = Arc::new(snapshot);

        self.store.current.store(Some(Arc::clone(&snapshot)));
        self.store.generation.store(generation, Ordering::Release);

        info!(
            generation,
            provinces = snapshot.rows().len(),
            records = snapshot.record_count,
            skipped = snapshot.skipped_records,
            "published benchmark snapshot"
        );
        Ok(snapshot)
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.store.refreshing.store(false, Ordering::Release);
    }
}
