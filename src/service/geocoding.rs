//! Photon geocoding client
//!
//! Address autocomplete against photon.komoot.io (or a self-hosted Photon).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::model::{AddressSuggestion, GeocodingConfig};

#[derive(Debug, thiserror::Error)]
pub enum GeocodingError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Seam for address suggestion lookups
#[async_trait]
pub trait AddressGeocoder: Send + Sync {
    async fn suggest(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeocodingError>;
}

// Response models - only the fields we need
#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: FeatureProperties,
}

#[derive(Debug, Default, Deserialize)]
struct FeatureProperties {
    street: Option<String>,
    // Photon returns house numbers as strings, but be lenient
    #[serde(default, deserialize_with = "lenient_string")]
    housenumber: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    postcode: Option<String>,
    city: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Client for the Photon search API
pub struct PhotonClient {
    client: Client,
    base_url: Url,
    limit: u32,
    language: String,
}

impl PhotonClient {
    pub fn new(config: &GeocodingConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            limit: config.limit,
            language: config.language.clone(),
        }
    }

    fn into_suggestions(collection: FeatureCollection) -> Vec<AddressSuggestion> {
        collection
            .features
            .into_iter()
            .map(|f| {
                let p = f.properties;
                AddressSuggestion::from_parts(p.street, p.housenumber, p.postcode, p.city)
            })
            .collect()
    }
}

#[async_trait]
impl AddressGeocoder for PhotonClient {
    async fn suggest(&self, query: &str) -> Result<Vec<AddressSuggestion>, GeocodingError> {
        let url = format!("{}/api/", self.base_url.as_str().trim_end_matches('/'));

        tracing::debug!(query = %query, url = %url, "Fetching address suggestions from Photon");

        let limit = self.limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("limit", limit.as_str()),
                ("lang", self.language.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GeocodingError::ParseError(format!(
                "Unexpected status {}: {}",
                status, body
            )));
        }

        let collection: FeatureCollection = response.json().await.map_err(|e| {
            GeocodingError::ParseError(format!("Failed to deserialize feature collection: {}", e))
        })?;

        let suggestions = Self::into_suggestions(collection);

        tracing::debug!(
            query = %query,
            suggestions_count = suggestions.len(),
            "Fetched address suggestions"
        );

        Ok(suggestions)
    }
}
