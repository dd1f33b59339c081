//! Error types for rent potential analysis

use thiserror::Error;

use crate::service::llm::LlmError;

/// The model answer could not be turned into a JSON object
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Die KI hat kein gültiges Ergebnis-Format geliefert.")]
    NoJsonObject,

    #[error("Die Datenanalyse konnte nicht in ein lesbares Format umgewandelt werden.")]
    InvalidJson(#[source] serde_json::Error),
}

/// Error type for rent potential analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Model(#[from] LlmError),

    // Both extraction failures reach the visitor as the conversion message
    #[error("Die Datenanalyse konnte nicht in ein lesbares Format umgewandelt werden.")]
    Extraction(#[from] ExtractionError),
}
