//! Dashboard view model for a finished analysis
//!
//! Everything the widget renders after an analysis: metric cards, the
//! two-bar market comparison, feature factors and the zone explorer. Values
//! are pre-formatted for a German audience.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{AnalysisResult, ImpactDirection, LocationZone, PropertyInput};

const CURRENT_BAR_COLOR: &str = "#1e293b";
const TARGET_BAR_COLOR: &str = "#f5931f";
const ZONE_FALLBACK_COLOR: &str = "#cbd5e1";
const FALLBACK_CITY: &str = "Ihre Stadt";

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MetricCard {
    pub title: String,
    pub value: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartBar {
    pub name: String,
    /// Rent per m²
    pub price: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FactorRow {
    /// e.g. "Balkon (3%)"
    pub title: String,
    pub description: String,
    pub direction: ImpactDirection,
}

/// Visual weight of a zone in the abstract city map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ZoneTier {
    Premium,
    Standard,
    Basic,
}

impl ZoneTier {
    fn from_zone_id(id: &str) -> Self {
        if id.contains("gut") {
            ZoneTier::Premium
        } else if id.contains("mittel") {
            ZoneTier::Standard
        } else {
            ZoneTier::Basic
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneTile {
    pub id: String,
    pub name: String,
    /// e.g. "Einfluss: +8%"
    pub impact_label: String,
    pub color: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub examples: Vec<String>,
    pub tier: ZoneTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneExplorer {
    pub city_name: String,
    pub tiles: Vec<ZoneTile>,
    pub active: Option<ZoneDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub cards: Vec<MetricCard>,
    pub chart: Vec<ChartBar>,
    pub factors: Vec<FactorRow>,
    /// Narrative location assessment
    pub verdict: String,
    /// Comparable monthly rent range, e.g. "756 € – 924 €"
    pub comparable_range: String,
    pub source_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_explorer: Option<ZoneExplorer>,
}

/// Zone preselected when a result arrives: the second one, if any
pub fn default_zone_selection(zones: &[LocationZone]) -> Option<String> {
    zones.get(1).map(|z| z.id.clone())
}

/// Build the dashboard for a result and the input it was computed from
pub fn build_dashboard(
    result: &AnalysisResult,
    input: &PropertyInput,
    selected_zone: Option<&str>,
) -> Dashboard {
    let current_per_sqm = input.current_cold_rent / input.size_sqm;
    let target_per_sqm = result.estimated_market_rent_per_sqm;

    let cards = vec![
        MetricCard {
            title: "Status Quo".to_string(),
            value: format_eur(input.current_cold_rent, 0),
            detail: format_eur_per_sqm(current_per_sqm),
        },
        MetricCard {
            title: "Marktwert-Ziel".to_string(),
            value: format_eur(result.estimated_total_market_rent, 0),
            detail: format_eur_per_sqm(target_per_sqm),
        },
        MetricCard {
            title: "Mehrertrag p.a.".to_string(),
            value: format!("+{}", format_eur(result.potential_yearly_gain, 0)),
            detail: format!(
                "{}% Potential",
                format_signed(result.rent_gap_percentage, 1)
            ),
        },
        MetricCard {
            title: "Präzision".to_string(),
            value: format!("{}%", format_decimal(result.confidence_score, 0)),
            detail: "KI-Konfidenz".to_string(),
        },
    ];

    let chart = vec![
        ChartBar {
            name: "AKTUELL".to_string(),
            price: current_per_sqm,
            color: CURRENT_BAR_COLOR.to_string(),
        },
        ChartBar {
            name: "ZIEL-MARKT".to_string(),
            price: target_per_sqm,
            color: TARGET_BAR_COLOR.to_string(),
        },
    ];

    let factors = result
        .feature_impacts
        .iter()
        .map(|f| FactorRow {
            title: format!("{} ({}%)", f.feature, format_decimal(f.impact_percent, 1)),
            description: f.description.clone(),
            direction: f.direction,
        })
        .collect();

    let zone_explorer = if result.location_zones.is_empty() {
        None
    } else {
        Some(build_zone_explorer(
            &result.location_zones,
            input.city_name().unwrap_or(FALLBACK_CITY),
            selected_zone,
        ))
    };

    Dashboard {
        cards,
        chart,
        factors,
        verdict: result.location_analysis.clone(),
        comparable_range: format!(
            "{} – {}",
            format_eur(result.comparable_total_min, 0),
            format_eur(result.comparable_total_max, 0)
        ),
        source_label: result.source_type.label().to_string(),
        zone_explorer,
    }
}

fn build_zone_explorer(
    zones: &[LocationZone],
    city_name: &str,
    selected_zone: Option<&str>,
) -> ZoneExplorer {
    let tiles = zones
        .iter()
        .map(|z| ZoneTile {
            id: z.id.clone(),
            name: z.name.clone(),
            impact_label: format!("Einfluss: {}", z.impact_percent),
            color: z
                .color
                .clone()
                .unwrap_or_else(|| ZONE_FALLBACK_COLOR.to_string()),
            selected: selected_zone == Some(z.id.as_str()),
        })
        .collect();

    let active = selected_zone
        .and_then(|id| zones.iter().find(|z| z.id == id))
        .map(|z| ZoneDetail {
            id: z.id.clone(),
            name: z.name.clone(),
            description: z.description.clone(),
            examples: z.examples.clone().unwrap_or_default(),
            tier: ZoneTier::from_zone_id(&z.id),
        });

    ZoneExplorer {
        city_name: city_name.to_string(),
        tiles,
        active,
    }
}

/// German currency format, e.g. `1.234 €` or `12,50 €`
pub fn format_eur(value: f64, decimals: u32) -> String {
    format!("{}\u{a0}€", format_decimal(value, decimals))
}

fn format_eur_per_sqm(value: f64) -> String {
    format!("{}/m²", format_eur(value, 2))
}

fn format_signed(value: f64, decimals: u32) -> String {
    let formatted = format_decimal(value, decimals);
    if value.is_finite() && !formatted.starts_with('-') {
        format!("+{}", formatted)
    } else {
        formatted
    }
}

/// German number format with thousands dots and a decimal comma
pub fn format_decimal(value: f64, decimals: u32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "∞" } else { "-∞" }.to_string();
    }

    let scale = 10u64.pow(decimals);
    let scaled = (value.abs() * scale as f64).round() as u64;
    let whole = scaled / scale;
    let fraction = scaled % scale;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && scaled > 0 { "-" } else { "" };
    if decimals == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!(
            "{}{},{:0width$}",
            sign,
            grouped,
            fraction,
            width = decimals as usize
        )
    }
}
