//! Prompt for the rent potential analysis

use crate::model::PropertyInput;

/// Number of location zones the model is asked to define
pub const ZONE_COUNT: usize = 3;

/// Response contract appended to every prompt
const RESPONSE_CONTRACT: &str = r#"ANTWORTE AUSSCHLIESSLICH MIT EINEM EINZIGEN JSON-OBJEKT, OHNE TEXT DAVOR ODER DANACH:
{
  "estimatedMarketRentPerSqm": zahl,
  "estimatedTotalMarketRent": zahl,
  "comparableRentLow": zahl,
  "comparableRentHigh": zahl,
  "locationAnalysis": "string",
  "sourceType": "QUALIFIED_MIETSPIEGEL" | "SIMPLE_MIETSPIEGEL" | "MARKET_ESTIMATION",
  "confidenceScore": zahl (0-100),
  "featureImpacts": [
    { "feature": "string", "impactPercent": zahl, "direction": "positive" | "negative" | "neutral", "description": "string" }
  ],
  "locationZones": [
    { "id": "string", "name": "string", "description": "string", "impactPercent": "string", "color": "string", "examples": ["string"] }
  ]
}"#;

/// Build the analysis prompt embedding every field of the input
pub fn build_analysis_prompt(input: &PropertyInput) -> String {
    let mut prompt = String::from(
        "DU BIST EIN IMMOBILIEN-EXPERTE FÜR DEN DEUTSCHEN MARKT.\n\
         Analysiere das Miet-Potential für folgende Immobilie:\n",
    );

    prompt.push_str(&format!("ADRESSE: {}\n", input.address.trim()));
    prompt.push_str(&format!(
        "OBJEKT-DETAILS: {}, {}m², {} Zimmer, Baujahr {}, Zustand: {}.\n",
        input.property_type,
        input.size_sqm,
        input.rooms,
        input.year_built,
        input.condition
    ));
    prompt.push_str(&format!(
        "AKTUELLE KALTMIETE: {} EUR pro Monat.\n",
        input.current_cold_rent
    ));
    prompt.push_str(&format!(
        "AUSSTATTUNG: Balkon: {}, 3-fach Glas: {}, Fußbodenheizung: {}, Barrierefrei: {}, \
         Modernes Bad: {}, Ruhige Lage: {}.\n",
        yes_no(input.has_balcony),
        yes_no(input.has_triple_glazing),
        yes_no(input.has_floor_heating),
        yes_no(input.is_barrier_free),
        yes_no(input.has_modern_bathroom),
        yes_no(input.is_quiet_location),
    ));

    let modernizations = modernization_lines(input);
    if !modernizations.is_empty() {
        prompt.push_str(&format!("MODERNISIERUNG: {}.\n", modernizations.join(", ")));
    }

    let surroundings = surrounding_lines(input);
    if !surroundings.is_empty() {
        prompt.push_str(&format!("UMFELD: {}.\n", surroundings.join(", ")));
    }

    prompt.push_str(&format!(
        "\nAUFGABE:\n\
         1. Nutze Google Search für eine präzise Marktanalyse, nenne aber im Ergebnis KEINE URLs oder Quellen-Links.\n\
         2. Berechne eine realistische Marktmiete pro m² basierend auf Lage und Modernisierungsgrad.\n\
         3. Definiere genau {} lokale Lagezonen für diesen Standort.\n\n",
        ZONE_COUNT
    ));
    prompt.push_str(RESPONSE_CONTRACT);
    prompt.push('\n');

    prompt
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "ja" } else { "nein" }
}

fn modernization_lines(input: &PropertyInput) -> Vec<String> {
    [
        ("Sanitär", input.sanitary_modernization_year),
        ("Heizung", input.heating_modernization_year),
        ("Fassadendämmung", input.wall_insulation_year),
    ]
    .into_iter()
    .filter_map(|(label, year)| year.map(|y| format!("{} {}", label, y)))
    .collect()
}

fn surrounding_lines(input: &PropertyInput) -> Vec<String> {
    [
        ("Grünflächen in der Nähe", input.has_green_space_nearby),
        ("Gute Infrastruktur", input.has_good_infrastructure),
    ]
    .into_iter()
    .filter_map(|(label, flag)| flag.map(|f| format!("{}: {}", label, yes_no(f))))
    .collect()
}
