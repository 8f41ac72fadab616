//! Practice input normalization.
//!
//! Resolves a partially-populated client request into a complete feature
//! vector. Normalization is total: malformed or missing values coerce to 0
//! before the defaulting rules run, and an unknown province becomes Ontario.

use serde_json::Value;
use valuation_core::config::NormalizerConfig;
use valuation_core::{PracticeFeatures, Province, RawPracticeInput};

/// Coerce a JSON value to a finite number, or `default` when it is not one.
///
/// Numeric strings are accepted after trimming.
pub fn numeric(value: Option<&Value>, default: f64) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(x) if x.is_finite() => x,
        _ => default,
    }
}

/// Resolve the province, defaulting to Ontario.
pub fn province(value: Option<&Value>) -> Province {
    match value {
        Some(Value::String(s)) => Province::parse_code(s).unwrap_or_default(),
        _ => Province::default(),
    }
}

/// Normalize a raw request into practice features.
pub fn normalize(raw: &RawPracticeInput, config: &NormalizerConfig) -> PracticeFeatures {
    let province = province(raw.province.as_ref());

    let collections = numeric(raw.collections.as_ref(), 0.0).max(0.0);

    let mut ebitda_or_sde = numeric(raw.ebitda_or_sde.as_ref(), 0.0);
    if ebitda_or_sde <= 0.0 {
        ebitda_or_sde = config.ebitda_fallback_ratio * collections;
    }

    // `as` saturates, so absurd counts clamp to u32::MAX instead of wrapping.
    let equipped_ops = numeric(raw.equipped_ops.as_ref(), 0.0).max(0.0).round() as u32;

    let mut sqft = numeric(raw.sqft.as_ref(), 0.0);
    if sqft <= 0.0 {
        sqft = config.sqft_per_op * equipped_ops as f64;
    }

    PracticeFeatures {
        province,
        collections,
        ebitda_or_sde,
        equipped_ops,
        sqft,
    }
}
