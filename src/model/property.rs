use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PropertyType {
    #[serde(rename = "Wohnung")]
    Apartment,
    #[serde(rename = "Haus")]
    House,
    #[serde(rename = "Gewerbe")]
    Commercial,
}

impl PropertyType {
    pub fn label(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "Wohnung",
            PropertyType::House => "Haus",
            PropertyType::Commercial => "Gewerbe",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum Condition {
    #[serde(rename = "Neubau / Erstbezug")]
    New,
    #[serde(rename = "Neuwertig")]
    Mint,
    #[serde(rename = "Modernisiert")]
    Modernized,
    #[serde(rename = "Gepflegt")]
    WellKept,
    #[serde(rename = "Renovierungsbedürftig")]
    NeedsRenovation,
}

impl Condition {
    pub fn label(&self) -> &'static str {
        match self {
            Condition::New => "Neubau / Erstbezug",
            Condition::Mint => "Neuwertig",
            Condition::Modernized => "Modernisiert",
            Condition::WellKept => "Gepflegt",
            Condition::NeedsRenovation => "Renovierungsbedürftig",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Property details collected by the widget form
///
/// Lives only for the duration of one visitor session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    pub address: String,
    pub property_type: PropertyType,
    /// Living area in m²
    pub size_sqm: f64,
    pub rooms: f64,
    pub year_built: i32,
    pub condition: Condition,
    /// Current monthly base rent (Kaltmiete) in EUR
    pub current_cold_rent: f64,
    #[serde(default)]
    pub has_triple_glazing: bool,
    #[serde(default)]
    pub has_balcony: bool,
    #[serde(default)]
    pub has_floor_heating: bool,
    #[serde(default)]
    pub is_barrier_free: bool,
    #[serde(default)]
    pub has_modern_bathroom: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitary_modernization_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_modernization_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_insulation_year: Option<i32>,
    #[serde(default)]
    pub is_quiet_location: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_green_space_nearby: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_good_infrastructure: Option<bool>,
}

impl Default for PropertyInput {
    fn default() -> Self {
        Self {
            address: String::new(),
            property_type: PropertyType::Apartment,
            size_sqm: 70.0,
            rooms: 3.0,
            year_built: 1985,
            condition: Condition::WellKept,
            current_cold_rent: 600.0,
            has_triple_glazing: false,
            has_balcony: false,
            has_floor_heating: false,
            is_barrier_free: false,
            has_modern_bathroom: true,
            sanitary_modernization_year: None,
            heating_modernization_year: None,
            wall_insulation_year: None,
            is_quiet_location: true,
            has_green_space_nearby: None,
            has_good_infrastructure: None,
        }
    }
}

impl PropertyInput {
    /// Check the fields the analysis cannot do without
    ///
    /// Returns the list of problems, empty when the input can be submitted.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.address.trim().is_empty() {
            problems.push("address must not be empty".to_string());
        }
        if !(self.size_sqm.is_finite() && self.size_sqm > 0.0) {
            problems.push(format!("sizeSqm must be positive, got {}", self.size_sqm));
        }
        if !(self.rooms.is_finite() && self.rooms > 0.0) {
            problems.push(format!("rooms must be positive, got {}", self.rooms));
        }
        if !(self.current_cold_rent.is_finite() && self.current_cold_rent >= 0.0) {
            problems.push(format!(
                "currentColdRent must be zero or positive, got {}",
                self.current_cold_rent
            ));
        }

        problems
    }

    /// City part of the address: the last comma-separated segment
    pub fn city_name(&self) -> Option<&str> {
        self.address
            .rsplit(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
