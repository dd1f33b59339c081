//! Visitor-facing classification of analysis failures
//!
//! Classification works on the error text only. A change in the wording of
//! upstream error messages changes the outcome.

const OVERLOADED_MESSAGE: &str =
    "Der Analyse-Server ist momentan überlastet. Bitte versuchen Sie es in wenigen Sekunden erneut.";
const INVALID_CREDENTIAL_MESSAGE: &str =
    "Ihr API-Key scheint ungültig zu sein oder wurde nicht gefunden.";
const GENERIC_MESSAGE: &str = "Die Analyse konnte nicht abgeschlossen werden.";

/// What went wrong, as far as the visitor is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream overload; retrying shortly may help
    Overloaded,
    /// Key missing or rejected; the visitor has to select a key again
    InvalidCredential,
    /// Anything else, carrying the original message
    Other(String),
    /// Failure without any message
    Unknown,
}

impl FailureKind {
    /// Text shown in the error panel
    pub fn user_message(&self) -> &str {
        match self {
            FailureKind::Overloaded => OVERLOADED_MESSAGE,
            FailureKind::InvalidCredential => INVALID_CREDENTIAL_MESSAGE,
            FailureKind::Other(message) => message,
            FailureKind::Unknown => GENERIC_MESSAGE,
        }
    }

    /// Stable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::Overloaded => "overloaded",
            FailureKind::InvalidCredential => "invalid_credential",
            FailureKind::Other(_) => "analysis_failed",
            FailureKind::Unknown => "unknown",
        }
    }

    /// Whether the failure should send the visitor back to key selection
    pub fn requires_credential(&self) -> bool {
        matches!(self, FailureKind::InvalidCredential)
    }
}

/// Classify an error message by keyword
///
/// Overload markers win over credential markers.
pub fn classify_failure(message: &str) -> FailureKind {
    if message.contains("500") || message.contains("Internal Server Error") {
        FailureKind::Overloaded
    } else if message.contains("not found") || message.contains("key") {
        FailureKind::InvalidCredential
    } else if !message.trim().is_empty() {
        FailureKind::Other(message.to_string())
    } else {
        FailureKind::Unknown
    }
}
