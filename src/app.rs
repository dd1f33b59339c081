//! Application state and service initialization
//!
//! This module centralizes all service initialization and dependency injection,
//! making it easier to manage the application lifecycle and test services.

use std::sync::Arc;

use actix_web::web;

use crate::model::Config;
use crate::service::{
    AddressGeocoder, AnalysisService, CredentialProvider, EnvCredentialProvider, GeminiClient,
    PhotonClient, SessionService,
};

/// Application state containing all services and shared resources
#[derive(Clone)]
pub struct AppState {
    /// Host credential capability
    pub credentials: Arc<dyn CredentialProvider>,
    /// Visitor sessions, driving analysis and autocomplete
    pub sessions: Arc<SessionService>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// A missing API key is not fatal: sessions start in key selection
    /// and the readiness probe reports the key as missing.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        if config.gemini.model.trim().is_empty() {
            return Err(AppError::InvalidConfig("gemini.model must not be empty"));
        }
        if config.geocoding.limit == 0 {
            return Err(AppError::InvalidConfig("geocoding.limit must be positive"));
        }
        if config.widget.session_ttl().is_none() {
            return Err(AppError::InvalidConfig(
                "widget.session_ttl_minutes must be positive and in range",
            ));
        }

        let credentials: Arc<dyn CredentialProvider> = Arc::new(EnvCredentialProvider::new());
        Ok(Self::with_credentials(config, credentials))
    }

    /// Build the service graph around a given credential provider
    pub fn with_credentials(config: &Config, credentials: Arc<dyn CredentialProvider>) -> Self {
        let model = Arc::new(GeminiClient::new(&config.gemini, Arc::clone(&credentials)));
        let analysis = Arc::new(AnalysisService::new(model, &config.gemini));
        let geocoder: Arc<dyn AddressGeocoder> = Arc::new(PhotonClient::new(&config.geocoding));

        let sessions = Arc::new(SessionService::new(
            analysis,
            geocoder,
            Arc::clone(&credentials),
            config,
        ));

        Self {
            credentials,
            sessions,
        }
    }

    /// Register the shared state and all routes on an actix app
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::from(Arc::clone(&self.sessions)))
            .app_data(web::Data::from(Arc::clone(&self.credentials)));

        crate::api::session::configure(cfg);
        crate::api::health::configure(cfg);
        crate::api::openapi::configure(cfg);
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
