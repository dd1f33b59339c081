//! Rent potential analysis using a generative model
//!
//! One analysis is one round-trip: prompt, model answer, JSON extraction,
//! conversion and derived metrics. Nothing is cached or merged.

use std::sync::Arc;

use crate::model::{AnalysisResult, GeminiConfig, PropertyInput};
use crate::service::analysis::converters::convert_analysis;
use crate::service::analysis::extraction::extract_json;
use crate::service::analysis::prompts::build_analysis_prompt;
use crate::service::llm::{GenerationRequest, GenerativeModel};

pub mod classification;
pub mod converters;
pub mod error;
pub mod extraction;
pub mod metrics;
pub mod prompts;

pub use classification::classify_failure;
pub use error::{AnalysisError, ExtractionError};

/// Service producing an [`AnalysisResult`] for a property
pub struct AnalysisService {
    model: Arc<dyn GenerativeModel>,
    model_name: String,
    web_search: bool,
}

impl AnalysisService {
    pub fn new(model: Arc<dyn GenerativeModel>, config: &GeminiConfig) -> Self {
        tracing::info!(
            model = %config.model,
            web_search = config.web_search,
            "Rent analysis service initialized"
        );

        Self {
            model,
            model_name: config.model.clone(),
            web_search: config.web_search,
        }
    }

    /// Run one analysis for the given input
    pub async fn analyze(&self, input: &PropertyInput) -> Result<AnalysisResult, AnalysisError> {
        let start_time = std::time::Instant::now();

        let request = GenerationRequest {
            model: self.model_name.clone(),
            prompt: build_analysis_prompt(input),
            web_search: self.web_search,
        };
        let prompt_length = request.prompt.len();

        tracing::debug!(
            model = %self.model_name,
            prompt_length = prompt_length,
            "Initiating model call for rent analysis"
        );

        let text = match self.model.generate(&request).await {
            Ok(text) => {
                tracing::info!(
                    model = %self.model_name,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt_length,
                    response_length = text.len(),
                    "Model call for rent analysis completed successfully"
                );
                text
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_name,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    prompt_length = prompt_length,
                    error = %e,
                    "Model call for rent analysis failed"
                );
                return Err(e.into());
            }
        };

        let data = extract_json(&text)?;
        let result = convert_analysis(&data, input);

        tracing::debug!(
            market_rent_per_sqm = result.estimated_market_rent_per_sqm,
            rent_gap_percentage = result.rent_gap_percentage,
            zones_count = result.location_zones.len(),
            "Converted model answer to analysis result"
        );

        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::service::llm::{GenerationRequest, GenerativeModel, LlmError};

    /// Model double returning a canned answer and recording requests
    pub struct ScriptedModel {
        answer: Result<String, String>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedModel {
        pub fn answering(text: &str) -> Self {
            Self {
                answer: Ok(text.to_string()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(status: u16, body: &str) -> Self {
            Self {
                answer: Err(format!("{}|{}", status, body)),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for ScriptedModel {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            match &self.answer {
                Ok(text) => Ok(text.clone()),
                Err(failure) => {
                    let (status, body) = failure.split_once('|').unwrap();
                    Err(LlmError::Status {
                        status: reqwest::StatusCode::from_u16(status.parse().unwrap()).unwrap(),
                        body: body.to_string(),
                    })
                }
            }
        }
    }

    pub const SAMPLE_ANSWER: &str = r##"Hier ist die Analyse:
{
  "estimatedMarketRentPerSqm": 12,
  "estimatedTotalMarketRent": 840,
  "locationAnalysis": "Solide Wohnlage mit guter Anbindung.",
  "sourceType": "SIMPLE_MIETSPIEGEL",
  "confidenceScore": 78,
  "featureImpacts": [
    {"feature": "Modernes Bad", "impactPercent": 4, "direction": "positive", "description": "Zuschlag"}
  ],
  "locationZones": [
    {"id": "zone-einfach", "name": "Einfache Lage", "description": "Verkehrsreich", "impactPercent": "-5%", "color": "#f97316", "examples": []},
    {"id": "zone-mittel", "name": "Mittlere Lage", "description": "Wohngebiet", "impactPercent": "0%", "color": "#94a3b8", "examples": ["Südstadt"]},
    {"id": "zone-gut", "name": "Gute Lage", "description": "Parknähe", "impactPercent": "+8%", "color": "#3b82f6", "examples": ["Altstadt"]}
  ]
}
Viel Erfolg!"##;
}
