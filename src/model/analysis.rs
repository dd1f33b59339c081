use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Quality of the rent reference the estimate is based on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceType {
    /// Qualified Mietspiegel (statutory, scientifically compiled)
    QualifiedMietspiegel,
    /// Simple Mietspiegel
    SimpleMietspiegel,
    /// No rent index available, estimated from market listings
    MarketEstimation,
}

impl SourceType {
    /// Parse the model's classification, falling back to a plain market estimation
    pub fn from_model(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "QUALIFIED_MIETSPIEGEL" => SourceType::QualifiedMietspiegel,
            "SIMPLE_MIETSPIEGEL" => SourceType::SimpleMietspiegel,
            _ => SourceType::MarketEstimation,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SourceType::QualifiedMietspiegel => "Qualifizierter Mietspiegel",
            SourceType::SimpleMietspiegel => "Einfacher Mietspiegel",
            SourceType::MarketEstimation => "Marktschätzung",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImpactDirection {
    Positive,
    Negative,
    Neutral,
}

impl ImpactDirection {
    pub fn from_model(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => ImpactDirection::Positive,
            "negative" => ImpactDirection::Negative,
            _ => ImpactDirection::Neutral,
        }
    }
}

/// Effect of a single property feature on the achievable rent
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeatureImpact {
    pub feature: String,
    pub impact_percent: f64,
    pub direction: ImpactDirection,
    pub description: String,
}

/// A location-quality zone (Lagezone) around the property
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationZone {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Free text as returned by the model, e.g. "+8%"
    pub impact_percent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub examples: Option<Vec<String>>,
}

/// Outcome of one round-trip to the model plus the derived metrics
///
/// Numbers the model returned in a non-numeric form are carried as NaN and
/// serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub estimated_market_rent_per_sqm: f64,
    pub estimated_total_market_rent: f64,
    /// Lower end of the comparable rent range, total per month
    #[serde(rename = "mietspiegelMin")]
    pub comparable_total_min: f64,
    /// Upper end of the comparable rent range, total per month
    #[serde(rename = "mietspiegelMax")]
    pub comparable_total_max: f64,
    /// Lower comparable rate per m² as returned by the model
    pub comparable_rent_low: f64,
    /// Upper comparable rate per m² as returned by the model
    pub comparable_rent_high: f64,
    pub location_analysis: String,
    pub potential_yearly_gain: f64,
    pub rent_gap_percentage: f64,
    pub source_type: SourceType,
    pub confidence_score: f64,
    pub feature_impacts: Vec<FeatureImpact>,
    pub location_zones: Vec<LocationZone>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_type_from_model() {
        assert_eq!(
            SourceType::from_model("QUALIFIED_MIETSPIEGEL"),
            SourceType::QualifiedMietspiegel
        );
        assert_eq!(
            SourceType::from_model(" simple_mietspiegel "),
            SourceType::SimpleMietspiegel
        );
        assert_eq!(SourceType::from_model("unknown"), SourceType::MarketEstimation);
    }

    #[test]
    fn test_direction_defaults_to_neutral() {
        assert_eq!(ImpactDirection::from_model("Positive"), ImpactDirection::Positive);
        assert_eq!(ImpactDirection::from_model("negative"), ImpactDirection::Negative);
        assert_eq!(ImpactDirection::from_model("up"), ImpactDirection::Neutral);
    }

    #[test]
    fn test_zone_serializes_camel_case() {
        let zone = LocationZone {
            id: "zone-gut".to_string(),
            name: "Gute Lage".to_string(),
            description: "Ruhige Wohnstraßen".to_string(),
            impact_percent: "+8%".to_string(),
            color: Some("#22c55e".to_string()),
            examples: None,
        };

        let json = serde_json::to_value(&zone).unwrap();
        assert_eq!(json["impactPercent"], "+8%");
        assert!(json.get("examples").is_none());
    }
}
