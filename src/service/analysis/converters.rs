//! Converters from the model's JSON answer to domain models

use serde_json::Value;

use crate::model::{
    AnalysisResult, FeatureImpact, ImpactDirection, LocationZone, PropertyInput, SourceType,
};
use crate::service::analysis::metrics::{coerce_number, derive_metrics};

const DEFAULT_ZONE_NAME: &str = "Unbekannte Zone";
const DEFAULT_ZONE_DESCRIPTION: &str = "Informationen zur Lage folgen.";
const DEFAULT_ZONE_IMPACT: &str = "0%";
const DEFAULT_ZONE_COLOR: &str = "#94a3b8";

/// Build the analysis result from the extracted object and the visitor input
pub fn convert_analysis(data: &Value, input: &PropertyInput) -> AnalysisResult {
    let metrics = derive_metrics(data, input.size_sqm, input.current_cold_rent);

    AnalysisResult {
        estimated_market_rent_per_sqm: metrics.market_rent_per_sqm,
        estimated_total_market_rent: metrics.total_market_rent,
        comparable_total_min: metrics.comparable_total_min,
        comparable_total_max: metrics.comparable_total_max,
        comparable_rent_low: metrics.comparable_rent_low,
        comparable_rent_high: metrics.comparable_rent_high,
        location_analysis: text_field(data, "locationAnalysis").unwrap_or_default(),
        potential_yearly_gain: metrics.potential_yearly_gain,
        rent_gap_percentage: metrics.rent_gap_percentage,
        source_type: data
            .get("sourceType")
            .and_then(Value::as_str)
            .map(SourceType::from_model)
            .unwrap_or(SourceType::MarketEstimation),
        confidence_score: convert_confidence(data.get("confidenceScore")),
        feature_impacts: array_field(data, "featureImpacts")
            .iter()
            .map(convert_feature_impact)
            .collect(),
        location_zones: array_field(data, "locationZones")
            .iter()
            .enumerate()
            .map(|(i, zone)| convert_zone(i, zone))
            .collect(),
    }
}

/// Confidence in 0..=100; NaN passes through
fn convert_confidence(value: Option<&Value>) -> f64 {
    let score = coerce_number(value);
    if score.is_nan() { score } else { score.clamp(0.0, 100.0) }
}

fn convert_feature_impact(value: &Value) -> FeatureImpact {
    FeatureImpact {
        feature: text_field(value, "feature").unwrap_or_default(),
        impact_percent: coerce_number(value.get("impactPercent")),
        direction: value
            .get("direction")
            .and_then(Value::as_str)
            .map(ImpactDirection::from_model)
            .unwrap_or(ImpactDirection::Neutral),
        description: text_field(value, "description").unwrap_or_default(),
    }
}

/// Convert one zone, filling every missing or empty field with its default
pub fn convert_zone(index: usize, value: &Value) -> LocationZone {
    let examples = value
        .get("examples")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(scalar_text).collect())
        .unwrap_or_default();

    LocationZone {
        id: text_field(value, "id").unwrap_or_else(|| format!("zone-{}", index)),
        name: text_field(value, "name").unwrap_or_else(|| DEFAULT_ZONE_NAME.to_string()),
        description: text_field(value, "description")
            .unwrap_or_else(|| DEFAULT_ZONE_DESCRIPTION.to_string()),
        impact_percent: text_field(value, "impactPercent")
            .unwrap_or_else(|| DEFAULT_ZONE_IMPACT.to_string()),
        color: Some(text_field(value, "color").unwrap_or_else(|| DEFAULT_ZONE_COLOR.to_string())),
        examples: Some(examples),
    }
}

fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Non-empty text of a field; numbers are rendered, zero counts as empty
fn text_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}
