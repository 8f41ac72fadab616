//! Benchmark aggregation.
//!
//! Builds an immutable [`BenchmarkSnapshot`] from cleaned practice records.
//! Ratios are averaged per record (mean of margins, mean of multiples), never
//! computed as ratios of averages, so a few very large practices cannot
//! dominate a province's figures.
//!
//! Provinces without records get no row. The national row, aggregated over
//! every record, stands in for them as the estimator's prior.

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use tracing::warn;
use valuation_core::config::BenchmarkConfig;
use valuation_core::{BenchmarkRow, Error, PracticeRecord, Province, Result};

/// A dataset record that passed validation.
#[derive(Debug, Clone, Copy)]
struct ValidRecord {
    province: Province,
    collections: Option<f64>,
    ebitda: Option<f64>,
    ops: Option<f64>,
    sqft: Option<f64>,
    value: Option<f64>,
}

fn check_numeric(index: usize, column: &str, value: Option<f64>) -> Result<Option<f64>> {
    match value {
        Some(x) if !x.is_finite() || x < 0.0 => Err(Error::data(format!(
            "record {index}: {column} must be a non-negative number, got {x}"
        ))),
        other => Ok(other),
    }
}

fn validate(index: usize, province: Province, record: &PracticeRecord) -> Result<ValidRecord> {
    check_numeric(index, "asking_price", record.asking_price)?;
    check_numeric(index, "appraised_value", record.appraised_value)?;
    Ok(ValidRecord {
        province,
        collections: check_numeric(index, "collections", record.collections)?,
        ebitda: check_numeric(index, "ebitda_or_sde", record.ebitda_or_sde)?,
        ops: check_numeric(index, "equipped_ops", record.equipped_ops)?,
        sqft: check_numeric(index, "sqft", record.sqft)?,
        value: record.observed_value(),
    })
}

/// Arithmetic mean, or `fallback` for an empty sample.
fn mean_or(values: &[f64], fallback: f64) -> f64 {
    if values.is_empty() {
        fallback
    } else {
        values.iter().mean()
    }
}

/// Aggregate one group of records into a row.
fn aggregate(
    province: Province,
    records: &[ValidRecord],
    calibrated_multiple: f64,
    config: &BenchmarkConfig,
) -> BenchmarkRow {
    let collections: Vec<f64> = records.iter().filter_map(|r| r.collections).collect();

    let margins: Vec<f64> = records
        .iter()
        .filter_map(|r| match (r.collections, r.ebitda) {
            (Some(c), Some(e)) if c > 0.0 => Some((e / c).clamp(0.0, 1.0)),
            _ => None,
        })
        .collect();

    let multiples: Vec<f64> = records
        .iter()
        .filter_map(|r| match (r.ebitda, r.value) {
            (Some(e), Some(v)) if e > 0.0 && v > 0.0 => Some(v / e),
            _ => None,
        })
        .filter(|m| m.is_finite())
        .collect();

    let ops: Vec<f64> = records.iter().filter_map(|r| r.ops).collect();

    let sqft_per_op: Vec<f64> = records
        .iter()
        .filter_map(|r| match (r.sqft, r.ops) {
            (Some(s), Some(o)) if s > 0.0 && o > 0.0 => Some(s / o),
            _ => None,
        })
        .filter(|r| r.is_finite())
        .collect();

    BenchmarkRow {
        province,
        avg_collections: mean_or(&collections, 0.0),
        avg_ebitda_margin: mean_or(&margins, config.default_margin),
        ebitda_multiple: mean_or(&multiples, calibrated_multiple),
        ops_mean: mean_or(&ops, 0.0),
        sqft_per_op_mean: mean_or(&sqft_per_op, config.default_sqft_per_op),
        record_count: records.len(),
    }
}

/// Immutable benchmark table published as a unit.
#[derive(Debug, Clone)]
pub struct BenchmarkSnapshot {
    /// Sequence number of this snapshot within its store.
    pub generation: u64,
    /// Time the snapshot was built.
    pub published_at: DateTime<Utc>,
    /// Records aggregated.
    pub record_count: usize,
    /// Records skipped because their province is blank or not recognized.
    pub skipped_records: usize,
    /// Rows in canonical province order; provinces without records omitted.
    rows: Vec<BenchmarkRow>,
    /// Row over all records. Its `province` field carries no meaning.
    national: BenchmarkRow,
}

impl BenchmarkSnapshot {
    /// Validate records and aggregate them into a snapshot.
    ///
    /// Records whose province is blank or not recognized are skipped and
    /// counted. Fails when no record remains, or on a negative or non-finite
    /// numeric column.
    pub fn build(
        records: &[PracticeRecord],
        config: &BenchmarkConfig,
        generation: u64,
    ) -> Result<Self> {
        let mut valid = Vec::with_capacity(records.len());
        let mut skipped_records = 0usize;
        for (index, record) in records.iter().enumerate() {
            match Province::parse_code(&record.province) {
                Some(province) => valid.push(validate(index, province, record)?),
                None => skipped_records += 1,
            }
        }

        if skipped_records > 0 {
            warn!(
                skipped = skipped_records,
                total = records.len(),
                "skipped records with blank or unrecognized province"
            );
        }
        if valid.is_empty() {
            return Err(Error::data(format!(
                "dataset contains no usable records ({} read, {skipped_records} with unrecognized province)",
                records.len()
            )));
        }

        let mut partitions: BTreeMap<Province, Vec<ValidRecord>> = BTreeMap::new();
        for record in &valid {
            partitions.entry(record.province).or_default().push(*record);
        }

        let rows = partitions
            .iter()
            .map(|(&province, group)| {
                aggregate(province, group, config.calibrated_multiple(province), config)
            })
            .collect();

        let national = aggregate(
            Province::default(),
            &valid,
            config.national_multiple,
            config,
        );

        Ok(Self {
            generation,
            published_at: Utc::now(),
            record_count: valid.len(),
            skipped_records,
            rows,
            national,
        })
    }

    /// All rows in canonical order.
    pub fn rows(&self) -> &[BenchmarkRow] {
        &self.rows
    }

    /// Row for a province, if it had records.
    pub fn get(&self, province: Province) -> Option<&BenchmarkRow> {
        self.rows.iter().find(|r| r.province == province)
    }

    /// National-average row.
    pub fn national(&self) -> &BenchmarkRow {
        &self.national
    }

    /// Estimator prior for a province: its own row, else the national row.
    ///
    /// The second element is the province whose row was used, `None` for
    /// the national row.
    pub fn prior_for(&self, province: Province) -> (&BenchmarkRow, Option<Province>) {
        match self.get(province) {
            Some(row) => (row, Some(province)),
            None => (&self.national, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn record(province: &str, collections: f64, ebitda: f64, ops: f64, sqft: f64) -> PracticeRecord {
        PracticeRecord {
            province: province.to_string(),
            collections: Some(collections),
            ebitda_or_sde: Some(ebitda),
            equipped_ops: Some(ops),
            sqft: Some(sqft),
            asking_price: None,
            appraised_value: None,
        }
    }

    fn build(records: &[PracticeRecord]) -> Result<BenchmarkSnapshot> {
        BenchmarkSnapshot::build(records, &BenchmarkConfig::default(), 1)
    }

    #[test]
    fn test_means_per_province() {
        let snapshot = build(&[
            record("ON", 1_000_000.0, 200_000.0, 4.0, 1200.0),
            record("ON", 3_000_000.0, 900_000.0, 8.0, 2000.0),
            record("BC", 2_000_000.0, 500_000.0, 6.0, 1800.0),
        ])
        .unwrap();

        let on = snapshot.get(Province::Ontario).unwrap();
        assert_relative_eq!(on.avg_collections, 2_000_000.0);
        // Mean of 0.20 and 0.30, not 1.1M / 4M.
        assert_relative_eq!(on.avg_ebitda_margin, 0.25);
        assert_relative_eq!(on.ops_mean, 6.0);
        // Mean of 300 and 250.
        assert_relative_eq!(on.sqft_per_op_mean, 275.0);
        assert_eq!(on.record_count, 2);

        assert_eq!(snapshot.rows().len(), 2);
        assert_eq!(snapshot.record_count, 3);
    }

    #[test]
    fn test_rows_in_canonical_order() {
        let snapshot = build(&[
            record("NU", 900_000.0, 200_000.0, 3.0, 900.0),
            record("AB", 1_000_000.0, 250_000.0, 4.0, 1200.0),
            record("ON", 1_000_000.0, 250_000.0, 4.0, 1200.0),
        ])
        .unwrap();
        let order: Vec<Province> = snapshot.rows().iter().map(|r| r.province).collect();
        assert_eq!(
            order,
            vec![Province::Ontario, Province::Alberta, Province::Nunavut]
        );
    }

    #[test]
    fn test_absent_province_omitted_and_national_prior() {
        let snapshot = build(&[
            record("ON", 1_000_000.0, 200_000.0, 4.0, 1200.0),
            record("BC", 3_000_000.0, 600_000.0, 8.0, 2400.0),
        ])
        .unwrap();

        assert!(snapshot.get(Province::Manitoba).is_none());
        let (row, scope) = snapshot.prior_for(Province::Manitoba);
        assert_eq!(scope, None);
        assert_relative_eq!(row.avg_collections, 2_000_000.0);
        assert_eq!(row.record_count, 2);

        let (row, scope) = snapshot.prior_for(Province::BritishColumbia);
        assert_eq!(scope, Some(Province::BritishColumbia));
        assert_relative_eq!(row.avg_collections, 3_000_000.0);
    }

    #[test]
    fn test_multiple_from_data_or_calibration() {
        let mut appraised = record("AB", 1_000_000.0, 250_000.0, 4.0, 1200.0);
        appraised.appraised_value = Some(1_000_000.0);
        let mut listed = record("AB", 2_000_000.0, 500_000.0, 6.0, 1800.0);
        listed.asking_price = Some(2_500_000.0);

        let mut config = BenchmarkConfig::default();
        config.province_multiples.insert(Province::Saskatchewan, 4.5);

        let snapshot = BenchmarkSnapshot::build(
            &[
                appraised,
                listed,
                record("SK", 1_000_000.0, 250_000.0, 4.0, 1200.0),
                record("PE", 1_000_000.0, 250_000.0, 4.0, 1200.0),
            ],
            &config,
            7,
        )
        .unwrap();

        // Mean of 4.0 and 5.0.
        assert_relative_eq!(snapshot.get(Province::Alberta).unwrap().ebitda_multiple, 4.5);
        assert_relative_eq!(snapshot.get(Province::Saskatchewan).unwrap().ebitda_multiple, 4.5);
        assert_relative_eq!(snapshot.get(Province::PrinceEdwardIsland).unwrap().ebitda_multiple, 3.8);
        assert_eq!(snapshot.generation, 7);
    }

    #[test]
    fn test_fallbacks_for_sparse_records() {
        let sparse = PracticeRecord {
            province: "NS".to_string(),
            equipped_ops: Some(5.0),
            ..Default::default()
        };
        let snapshot = build(&[sparse]).unwrap();
        let row = snapshot.get(Province::NovaScotia).unwrap();
        assert_eq!(row.avg_collections, 0.0);
        assert_relative_eq!(row.avg_ebitda_margin, 0.25);
        assert_relative_eq!(row.ebitda_multiple, 3.8);
        assert_relative_eq!(row.ops_mean, 5.0);
        assert_relative_eq!(row.sqft_per_op_mean, 290.0);
    }

    #[test]
    fn test_margin_clamped() {
        let snapshot = build(&[record("ON", 100_000.0, 500_000.0, 2.0, 600.0)]).unwrap();
        assert_relative_eq!(snapshot.get(Province::Ontario).unwrap().avg_ebitda_margin, 1.0);
    }

    #[test]
    fn test_overflowing_ratios_ignored() {
        let mut tiny = record("ON", 1_000_000.0, 1e-310, 1e-310, 1e308);
        tiny.appraised_value = Some(1e308);
        let snapshot = build(&[tiny]).unwrap();
        let row = snapshot.get(Province::Ontario).unwrap();
        assert_relative_eq!(row.ebitda_multiple, 3.8);
        assert_relative_eq!(row.sqft_per_op_mean, 290.0);
    }

    #[test]
    fn test_lowercase_codes_accepted() {
        let snapshot = build(&[record(" yt ", 800_000.0, 200_000.0, 3.0, 870.0)]).unwrap();
        assert!(snapshot.get(Province::Yukon).is_some());
    }

    #[test]
    fn test_unrecognized_provinces_skipped() {
        let mut records: Vec<PracticeRecord> = (0..50)
            .map(|i| record("ON", 1_000_000.0 + i as f64, 250_000.0, 5.0, 1450.0))
            .collect();
        records.push(record("", 900_000.0, 200_000.0, 4.0, 1200.0));
        records.push(record("QC", 1_100_000.0, 300_000.0, 5.0, 1500.0));

        let snapshot = build(&records).unwrap();
        assert_eq!(snapshot.record_count, 50);
        assert_eq!(snapshot.skipped_records, 2);
        assert_eq!(snapshot.rows().len(), 1);
        assert_eq!(snapshot.national().record_count, 50);
    }

    #[test]
    fn test_malformed_datasets_rejected() {
        assert!(matches!(build(&[]), Err(Error::Data(_))));
        assert!(matches!(
            build(&[
                record("QC", 1_000_000.0, 250_000.0, 4.0, 1200.0),
                record(" ", 1_000_000.0, 250_000.0, 4.0, 1200.0),
            ]),
            Err(Error::Data(_))
        ));
        assert!(matches!(
            build(&[record("ON", -1.0, 250_000.0, 4.0, 1200.0)]),
            Err(Error::Data(_))
        ));
        assert!(matches!(
            build(&[record("ON", 1_000_000.0, f64::NAN, 4.0, 1200.0)]),
            Err(Error::Data(_))
        ));
    }
}
