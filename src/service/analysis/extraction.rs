//! JSON extraction from free-text model answers

use serde_json::Value;

use crate::service::analysis::error::ExtractionError;

/// Slice the answer from the first `{` to the last `}` and parse it
///
/// This is not a balanced-brace scan: stray braces in prose before or after
/// the object end up inside the slice and make the parse fail. The prompt asks
/// the model to answer with the JSON object only.
pub fn extract_json(text: &str) -> Result<Value, ExtractionError> {
    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        tracing::error!(raw = %text, "No JSON object found in model output");
        return Err(ExtractionError::NoJsonObject);
    };

    if end < start {
        tracing::error!(raw = %text, "Closing brace precedes opening brace in model output");
        return Err(ExtractionError::NoJsonObject);
    }

    serde_json::from_str(&text[start..=end]).map_err(|e| {
        tracing::error!(error = %e, raw = %text, "Failed to parse JSON from model output");
        ExtractionError::InvalidJson(e)
    })
}
