//! API credential selection
//!
//! The host decides which API key is in use. The widget only asks whether a
//! usable key is selected and can trigger the host's selection flow.

use async_trait::async_trait;
use tokio::sync::RwLock;

const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
const ENV_API_KEY: &str = "API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("Credential selection failed: {0}")]
    SelectionFailed(String),
}

/// Host capability that owns the API credential
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Whether a usable API key is currently selected
    async fn has_selected_api_key(&self) -> Result<bool, CredentialError>;

    /// Run the host's key selection flow
    async fn open_select_key(&self) -> Result<(), CredentialError>;

    /// The key to send with the next model request
    async fn api_key(&self) -> Option<String>;
}

/// Credential provider backed by the process environment
///
/// Selecting a key re-reads `.env` and the environment, so an operator can
/// drop a key in place without restarting the server.
pub struct EnvCredentialProvider {
    key: RwLock<Option<String>>,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self {
            key: RwLock::new(read_key_from_env()),
        }
    }

    /// Provider with a fixed key, used by tests and embedders
    pub fn with_key(key: Option<String>) -> Self {
        Self {
            key: RwLock::new(key.filter(|k| !k.trim().is_empty())),
        }
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn has_selected_api_key(&self) -> Result<bool, CredentialError> {
        Ok(self.key.read().await.is_some())
    }

    async fn open_select_key(&self) -> Result<(), CredentialError> {
        if let Err(e) = dotenvy::dotenv_override() {
            tracing::debug!(error = %e, "No .env file reloaded during key selection");
        }

        let key = read_key_from_env().ok_or_else(|| {
            CredentialError::SelectionFailed(format!(
                "neither {ENV_GEMINI_API_KEY} nor {ENV_API_KEY} is set"
            ))
        })?;

        *self.key.write().await = Some(key);
        tracing::info!("API key selected from environment");
        Ok(())
    }

    async fn api_key(&self) -> Option<String> {
        self.key.read().await.clone()
    }
}

fn read_key_from_env() -> Option<String> {
    [ENV_GEMINI_API_KEY, ENV_API_KEY]
        .into_iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}
