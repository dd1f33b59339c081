pub mod analysis;
pub mod config;
pub mod property;
pub mod suggestion;

pub use analysis::{AnalysisResult, FeatureImpact, ImpactDirection, LocationZone, SourceType};
pub use config::{Config, GeminiConfig, GeocodingConfig};
pub use property::{Condition, PropertyInput, PropertyType};
pub use suggestion::AddressSuggestion;
