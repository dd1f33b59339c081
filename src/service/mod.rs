pub mod analysis;
pub mod credentials;
pub mod dashboard;
pub mod geocoding;
pub mod llm;
pub mod progress;
pub mod session;

pub use analysis::AnalysisService;
pub use credentials::{CredentialProvider, EnvCredentialProvider};
pub use geocoding::{AddressGeocoder, PhotonClient};
pub use llm::GeminiClient;
pub use session::SessionService;
