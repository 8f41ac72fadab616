//! Core data types for the practice valuation system.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Currency amount in Canadian dollars.
pub type Cad = f64;

/// Canadian province or territory recognized by the valuation service.
///
/// Declaration order is the canonical order of benchmark rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Province {
    #[default]
    #[serde(rename = "ON")]
    Ontario,
    #[serde(rename = "BC")]
    BritishColumbia,
    #[serde(rename = "AB")]
    Alberta,
    #[serde(rename = "SK")]
    Saskatchewan,
    #[serde(rename = "MB")]
    Manitoba,
    #[serde(rename = "NB")]
    NewBrunswick,
    #[serde(rename = "NS")]
    NovaScotia,
    #[serde(rename = "NL")]
    NewfoundlandLabrador,
    #[serde(rename = "PE")]
    PrinceEdwardIsland,
    #[serde(rename = "YT")]
    Yukon,
    #[serde(rename = "NT")]
    NorthwestTerritories,
    #[serde(rename = "NU")]
    Nunavut,
}

impl Province {
    /// All recognized provinces in canonical order.
    pub const ALL: [Province; 12] = [
        Province::Ontario,
        Province::BritishColumbia,
        Province::Alberta,
        Province::Saskatchewan,
        Province::Manitoba,
        Province::NewBrunswick,
        Province::NovaScotia,
        Province::NewfoundlandLabrador,
        Province::PrinceEdwardIsland,
        Province::Yukon,
        Province::NorthwestTerritories,
        Province::Nunavut,
    ];

    /// Two-letter postal code.
    pub fn code(self) -> &'static str {
        match self {
            Province::Ontario => "ON",
            Province::BritishColumbia => "BC",
            Province::Alberta => "AB",
            Province::Saskatchewan => "SK",
            Province::Manitoba => "MB",
            Province::NewBrunswick => "NB",
            Province::NovaScotia => "NS",
            Province::NewfoundlandLabrador => "NL",
            Province::PrinceEdwardIsland => "PE",
            Province::Yukon => "YT",
            Province::NorthwestTerritories => "NT",
            Province::Nunavut => "NU",
        }
    }

    /// Parse a code, ignoring surrounding whitespace and case.
    pub fn parse_code(code: &str) -> Option<Province> {
        let code = code.trim();
        Province::ALL
            .into_iter()
            .find(|p| p.code().eq_ignore_ascii_case(code))
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Province {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Province::parse_code(s).ok_or_else(|| crate::Error::data(format!("unknown province '{s}'")))
    }
}

/// Practice metrics as submitted by a client.
///
/// Fields hold arbitrary JSON so that garbage input can be coerced instead of
/// rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPracticeInput {
    pub province: Option<Value>,
    pub collections: Option<Value>,
    pub ebitda_or_sde: Option<Value>,
    pub equipped_ops: Option<Value>,
    pub sqft: Option<Value>,
}

/// Fully-resolved practice features passed to the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PracticeFeatures {
    /// Province whose benchmark applies.
    pub province: Province,
    /// Annual gross collections.
    pub collections: Cad,
    /// EBITDA or seller's discretionary earnings.
    pub ebitda_or_sde: Cad,
    /// Equipped treatment rooms.
    pub equipped_ops: u32,
    /// Practice floor area.
    pub sqft: f64,
}

impl PracticeFeatures {
    /// Square footage per equipped operatory, or 0 without operatories.
    #[inline]
    pub fn sqft_per_op(&self) -> f64 {
        if self.equipped_ops > 0 {
            self.sqft / self.equipped_ops as f64
        } else {
            0.0
        }
    }
}

/// Aggregated statistics for one province.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRow {
    /// Province the row describes.
    pub province: Province,
    /// Mean annual collections.
    pub avg_collections: Cad,
    /// Mean of per-practice EBITDA margins, in [0, 1].
    pub avg_ebitda_margin: f64,
    /// EBITDA-to-value multiple.
    pub ebitda_multiple: f64,
    /// Mean equipped operatory count.
    pub ops_mean: f64,
    /// Mean of per-practice square footage per operatory.
    pub sqft_per_op_mean: f64,
    /// Number of dataset records aggregated into the row.
    #[serde(skip)]
    pub record_count: usize,
}

impl BenchmarkRow {
    /// Revenue-to-value multiple implied by the margin and earnings multiple.
    #[inline]
    pub fn revenue_multiple(&self) -> f64 {
        self.avg_ebitda_margin * self.ebitda_multiple
    }
}

/// Intermediate figures behind a valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationDetails {
    pub collections: Cad,
    pub ebitda_or_sde: Cad,
    pub equipped_ops: u32,
    pub sqft: f64,
    pub sqft_per_op: f64,
    /// Earnings times the benchmark multiple.
    pub earnings_value: Cad,
    /// Collections times the implied revenue multiple.
    pub revenue_value: Cad,
    /// Operatory-count adjustment (fraction).
    pub capacity_adj: f64,
    /// Space-efficiency adjustment (fraction).
    pub space_adj: f64,
    /// Multiplicative factor applied to the blended value.
    pub adjustment_factor: f64,
    /// Province row used, or `None` for the national row.
    pub benchmark_province: Option<Province>,
}

/// Point estimate with two nested uncertainty intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub estimate: Cad,
    pub range_68: [Cad; 2],
    pub range_95: [Cad; 2],
    pub details: ValuationDetails,
}

impl ValuationResult {
    /// Check ordering and nesting of the intervals around the estimate.
    pub fn is_consistent(&self) -> bool {
        let [lo68, hi68] = self.range_68;
        let [lo95, hi95] = self.range_95;
        0.0 <= lo95 && lo95 <= lo68 && lo68 <= self.estimate && self.estimate <= hi68 && hi68 <= hi95
    }

    /// Round monetary outputs to whole dollars.
    ///
    /// Rounding is monotone, so ordering and nesting survive it.
    pub fn rounded(mut self) -> Self {
        self.estimate = self.estimate.round();
        self.range_68 = self.range_68.map(f64::round);
        self.range_95 = self.range_95.map(f64::round);
        self.details.earnings_value = self.details.earnings_value.round();
        self.details.revenue_value = self.details.revenue_value.round();
        self.details.sqft_per_op = (self.details.sqft_per_op * 10.0).round() / 10.0;
        self
    }
}

/// One practice record from the benchmark dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeRecord {
    /// Province code as stored in the dataset.
    pub province: String,
    pub collections: Option<Cad>,
    pub ebitda_or_sde: Option<Cad>,
    pub equipped_ops: Option<f64>,
    pub sqft: Option<f64>,
    /// Listing price, used for the multiple when no appraisal exists.
    pub asking_price: Option<Cad>,
    /// Appraised practice value.
    pub appraised_value: Option<Cad>,
}

impl PracticeRecord {
    /// Whether every numeric column is missing.
    pub fn is_empty(&self) -> bool {
        self.numeric_fields().iter().all(Option::is_none)
    }

    /// Numeric columns in dataset order.
    pub fn numeric_fields(&self) -> [Option<f64>; 6] {
        [
            self.collections,
            self.ebitda_or_sde,
            self.equipped_ops,
            self.sqft,
            self.asking_price,
            self.appraised_value,
        ]
    }

    /// Observed sale value: the appraisal, else the asking price.
    pub fn observed_value(&self) -> Option<Cad> {
        self.appraised_value.or(self.asking_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> ValuationDetails {
        ValuationDetails {
            collections: 0.0,
            ebitda_or_sde: 0.0,
            equipped_ops: 0,
            sqft: 0.0,
            sqft_per_op: 0.0,
            earnings_value: 0.0,
            revenue_value: 0.0,
            capacity_adj: 0.0,
            space_adj: 0.0,
            adjustment_factor: 1.0,
            benchmark_province: None,
        }
    }

    #[test]
    fn test_province_codes_round_trip() {
        for province in Province::ALL {
            assert_eq!(Province::parse_code(province.code()), Some(province));
        }
        assert_eq!(Province::parse_code(" bc "), Some(Province::BritishColumbia));
        assert_eq!(Province::parse_code("QC"), None);
        assert_eq!(Province::default(), Province::Ontario);
    }

    #[test]
    fn test_province_serde_uses_codes() {
        let json = serde_json::to_string(&Province::PrinceEdwardIsland).unwrap();
        assert_eq!(json, "\"PE\"");
        let parsed: Province = serde_json::from_str("\"NU\"").unwrap();
        assert_eq!(parsed, Province::Nunavut);
    }

    #[test]
    fn test_province_from_str_error() {
        assert!("XX".parse::<Province>().is_err());
        assert_eq!("ab".parse::<Province>().unwrap(), Province::Alberta);
    }

    #[test]
    fn test_sqft_per_op() {
        let features = PracticeFeatures {
            province: Province::Ontario,
            collections: 1_000_000.0,
            ebitda_or_sde: 250_000.0,
            equipped_ops: 4,
            sqft: 1200.0,
        };
        assert!((features.sqft_per_op() - 300.0).abs() < 1e-10);

        let empty = PracticeFeatures { equipped_ops: 0, ..features };
        assert_eq!(empty.sqft_per_op(), 0.0);
    }

    #[test]
    fn test_benchmark_row_hides_record_count() {
        let row = BenchmarkRow {
            province: Province::Ontario,
            avg_collections: 1_500_000.0,
            avg_ebitda_margin: 0.3,
            ebitda_multiple: 4.0,
            ops_mean: 6.0,
            sqft_per_op_mean: 300.0,
            record_count: 12,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("record_count").is_none());
        assert_eq!(value["province"], "ON");
        assert!((row.revenue_multiple() - 1.2).abs() < 1e-10);
    }

    #[test]
    fn test_rounded_keeps_consistency() {
        let result = ValuationResult {
            estimate: 1000.4,
            range_68: [900.6, 1100.2],
            range_95: [800.5, 1200.9],
            details: details(),
        };
        let rounded = result.rounded();
        assert_eq!(rounded.estimate, 1000.0);
        assert_eq!(rounded.range_68, [901.0, 1100.0]);
        assert_eq!(rounded.range_95, [801.0, 1201.0]);
        assert!(rounded.is_consistent());
    }

    #[test]
    fn test_record_emptiness() {
        let record = PracticeRecord {
            province: "ON".to_string(),
            ..Default::default()
        };
        assert!(record.is_empty());

        let record = PracticeRecord {
            asking_price: Some(900_000.0),
            ..record
        };
        assert!(!record.is_empty());
        assert_eq!(record.observed_value(), Some(900_000.0));
    }
}
