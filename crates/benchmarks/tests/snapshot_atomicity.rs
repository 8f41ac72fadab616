//! Concurrency tests for snapshot publication.
//!
//! A writer alternates between two datasets with different provinces and
//! figures while readers call `all()` in a loop. Every read must equal one of
//! the two complete tables, never a mix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use valuation_benchmarks::{BenchmarkStore, RefreshOutcome};
use valuation_core::config::BenchmarkConfig;
use valuation_core::{BenchmarkRow, PracticeRecord};
use valuation_ingestion::{DatasetSource, StaticSource};

fn record(province: &str, collections: f64, ops: f64) -> PracticeRecord {
    PracticeRecord {
        province: province.to_string(),
        collections: Some(collections),
        ebitda_or_sde: Some(collections * 0.3),
        equipped_ops: Some(ops),
        sqft: Some(ops * 300.0),
        asking_price: None,
        appraised_value: Some(collections * 1.1),
    }
}

fn dataset_a() -> StaticSource {
    StaticSource::new(vec![
        record("ON", 1_000_000.0, 4.0),
        record("ON", 1_400_000.0, 5.0),
    ])
}

fn dataset_b() -> StaticSource {
    StaticSource::new(vec![
        record("ON", 2_000_000.0, 8.0),
        record("BC", 1_800_000.0, 6.0),
        record("AB", 1_600_000.0, 7.0),
        record("NU", 700_000.0, 2.0),
    ])
}

fn table_for(source: &StaticSource) -> Vec<BenchmarkRow> {
    let store = BenchmarkStore::new(BenchmarkConfig::default());
    store.refresh(source).unwrap();
    store.all().unwrap()
}

#[test]
fn readers_never_observe_mixed_snapshots() {
    const READERS: usize = 4;
    const REFRESHES: usize = 500;

    let a = dataset_a();
    let b = dataset_b();
    let expected_a = table_for(&a);
    let expected_b = table_for(&b);
    assert_ne!(expected_a.len(), expected_b.len());

    let store = Arc::new(BenchmarkStore::new(BenchmarkConfig::default()));
    store.refresh(&a).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(READERS + 1));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let store = Arc::clone(&store);
            let done = Arc::clone(&done);
            let barrier = Arc::clone(&barrier);
            let expected_a = expected_a.clone();
            let expected_b = expected_b.clone();
            thread::spawn(move || {
                barrier.wait();
                let mut reads = 0u64;
                while !done.load(Ordering::Acquire) || reads < 100 {
                    let rows = store.all().unwrap();
                    assert!(
                        rows == expected_a || rows == expected_b,
                        "torn read: {rows:?}"
                    );
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    barrier.wait();
    let mut generations = Vec::with_capacity(REFRESHES);
    for i in 0..REFRESHES {
        let source: &dyn DatasetSource = if i % 2 == 0 { &b } else { &a };
        match store.refresh(source).unwrap() {
            RefreshOutcome::Published(snapshot) => generations.push(snapshot.generation),
            RefreshOutcome::Skipped => panic!("single writer should never be skipped"),
        }
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        assert!(reader.join().unwrap() >= 100);
    }
    assert!(generations.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn concurrent_refreshes_publish_or_skip() {
    const WRITERS: usize = 8;

    let store = Arc::new(BenchmarkStore::new(BenchmarkConfig::default()));
    let barrier = Arc::new(Barrier::new(WRITERS));

    let writers: Vec<_> = (0..WRITERS)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let source = if i % 2 == 0 { dataset_a() } else { dataset_b() };
                barrier.wait();
                (0..50)
                    .map(|_| match store.refresh(&source).unwrap() {
                        RefreshOutcome::Published(_) => 1u64,
                        RefreshOutcome::Skipped => 0,
                    })
                    .sum::<u64>()
            })
        })
        .collect();

    let published: u64 = writers.into_iter().map(|w| w.join().unwrap()).sum();
    assert!(published >= 1);
    // Every publish got its own generation.
    assert_eq!(store.snapshot().unwrap().generation, published);
}
