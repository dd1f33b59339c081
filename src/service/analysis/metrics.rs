//! Derived rent metrics
//!
//! The model supplies a rate per m² and optionally a total, comparable rates
//! and a confidence score. Everything the dashboard shows beyond that is
//! computed here from the model numbers and the visitor's input.

use serde_json::Value;

const COMPARABLE_LOW_FACTOR: f64 = 0.9;
const COMPARABLE_HIGH_FACTOR: f64 = 1.1;
const MONTHS_PER_YEAR: f64 = 12.0;

/// Permissive number cast for model-supplied values
///
/// `null` and empty strings are 0, booleans are 0/1, numeric strings parse,
/// anything else (including a missing field) is NaN.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        None => f64::NAN,
        Some(Value::Null) => 0.0,
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Array(_)) | Some(Value::Object(_)) => f64::NAN,
    }
}

/// `value`, or `fallback()` when `value` is 0 or NaN
pub fn or_when_unset(value: f64, fallback: impl FnOnce() -> f64) -> f64 {
    if value == 0.0 || value.is_nan() {
        fallback()
    } else {
        value
    }
}

/// Numbers derived for one analysis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RentMetrics {
    pub market_rent_per_sqm: f64,
    pub total_market_rent: f64,
    pub comparable_rent_low: f64,
    pub comparable_rent_high: f64,
    pub comparable_total_min: f64,
    pub comparable_total_max: f64,
    pub potential_yearly_gain: f64,
    pub rent_gap_percentage: f64,
}

/// Compute totals, comparable range, yearly gain and gap from the model's
/// answer and the visitor's size and current rent
///
/// NaN from a non-numeric model value flows through to the affected outputs.
pub fn derive_metrics(data: &Value, size_sqm: f64, current_cold_rent: f64) -> RentMetrics {
    let rate = coerce_number(data.get("estimatedMarketRentPerSqm"));
    let current = or_when_unset(current_cold_rent, || 0.0);

    let total = or_when_unset(coerce_number(data.get("estimatedTotalMarketRent")), || {
        rate * size_sqm
    });

    let comparable_rent_low = coerce_number(data.get("comparableRentLow"));
    let comparable_rent_high = coerce_number(data.get("comparableRentHigh"));

    let comparable_total_min =
        or_when_unset(comparable_rent_low, || rate * COMPARABLE_LOW_FACTOR) * size_sqm;
    let comparable_total_max =
        or_when_unset(comparable_rent_high, || rate * COMPARABLE_HIGH_FACTOR) * size_sqm;

    RentMetrics {
        market_rent_per_sqm: rate,
        total_market_rent: total,
        comparable_rent_low,
        comparable_rent_high,
        comparable_total_min,
        comparable_total_max,
        potential_yearly_gain: yearly_gain(total, current),
        rent_gap_percentage: gap_percentage(total, current),
    }
}

/// Extra yearly income from moving to the target rent, never negative
pub fn yearly_gain(target_rent: f64, current_rent: f64) -> f64 {
    let monthly = target_rent - current_rent;
    // f64::max would swallow NaN
    if monthly.is_nan() {
        return f64::NAN;
    }
    monthly.max(0.0) * MONTHS_PER_YEAR
}

/// Gap between current and target rent in percent of the current rent
///
/// A current rent of zero yields 0 instead of dividing by zero.
pub fn gap_percentage(target_rent: f64, current_rent: f64) -> f64 {
    if current_rent > 0.0 {
        (target_rent - current_rent) / current_rent * 100.0
    } else {
        0.0
    }
}
