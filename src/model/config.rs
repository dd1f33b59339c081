use chrono::TimeDelta;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

const ENV_CONFIG_PATH: &str = "MIETPOTENTIAL_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
const ENV_GEMINI_BASE_URL: &str = "GEMINI_BASE_URL";
const ENV_PHOTON_BASE_URL: &str = "PHOTON_BASE_URL";

const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";
const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_PHOTON_BASE_URL: &str = "https://photon.komoot.io";

/// Generative model settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub model: String,
    pub base_url: Url,
    /// Let the model ground its answer with web search
    pub web_search: bool,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: default_url(DEFAULT_GEMINI_BASE_URL),
            web_search: true,
        }
    }
}

/// Address autocomplete settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub base_url: Url,
    pub limit: u32,
    pub language: String,
    /// Queries shorter than this (in characters) clear the list without a lookup
    pub min_query_length: usize,
    pub debounce_ms: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_url(DEFAULT_PHOTON_BASE_URL),
            limit: 5,
            language: "de".to_string(),
            min_query_length: 4,
            debounce_ms: 400,
        }
    }
}

impl GeocodingConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Visitor session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    /// Interval between two cosmetic progress phases
    pub progress_interval_ms: u64,
    /// Sessions idle longer than this are dropped
    pub session_ttl_minutes: i64,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 1500,
            session_ttl_minutes: 60,
        }
    }
}

impl WidgetConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Idle time after which a session is dropped; `None` if not positive or out of range
    pub fn session_ttl(&self) -> Option<TimeDelta> {
        TimeDelta::try_minutes(self.session_ttl_minutes).filter(|ttl| *ttl > TimeDelta::zero())
    }
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub geocoding: GeocodingConfig,
    #[serde(default)]
    pub widget: WidgetConfig,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini: GeminiConfig,
    pub geocoding: GeocodingConfig,
    pub widget: WidgetConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            geocoding: GeocodingConfig::default(),
            widget: WidgetConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();

        let mut config = Self {
            gemini: file.gemini,
            geocoding: file.geocoding,
            widget: file.widget,
            port,
            host,
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var(ENV_GEMINI_MODEL) {
            self.gemini.model = model;
        }

        if let Some(url) = env_url(ENV_GEMINI_BASE_URL) {
            self.gemini.base_url = url;
        }

        if let Some(url) = env_url(ENV_PHOTON_BASE_URL) {
            self.geocoding.base_url = url;
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => Self::parse_config(&contents, path),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    fn parse_config(contents: &str, path: &Path) -> Option<ConfigFile> {
        let contents = contents.trim();
        if contents.is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Some(ConfigFile::default());
        }

        match serde_yaml::from_str(contents) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded configuration from file");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_url(name: &str) -> Option<Url> {
    let value = std::env::var(name).ok()?;
    match Url::parse(&value) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(variable = name, error = %e, "Ignoring invalid URL override");
            None
        }
    }
}

// Only called with the literal defaults above
fn default_url(raw: &str) -> Url {
    Url::parse(raw).unwrap_or_else(|_| unreachable!("invalid built-in URL {raw}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_widget_behaviour() {
        let config = Config::default();
        assert_eq!(config.gemini.model, "gemini-3-pro-preview");
        assert!(config.gemini.web_search);
        assert_eq!(config.geocoding.limit, 5);
        assert_eq!(config.geocoding.language, "de");
        assert_eq!(config.geocoding.min_query_length, 4);
        assert_eq!(config.geocoding.debounce(), Duration::from_millis(400));
        assert_eq!(config.widget.progress_interval(), Duration::from_millis(1500));
        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
gemini:
  model: gemini-2.5-flash
  web_search: false
geocoding:
  debounce_ms: 250
"#;
        let file = Config::parse_config(yaml, Path::new("config.yaml")).unwrap();
        assert_eq!(file.gemini.model, "gemini-2.5-flash");
        assert!(!file.gemini.web_search);
        assert_eq!(
            file.gemini.base_url.as_str(),
            "https://generativelanguage.googleapis.com/"
        );
        assert_eq!(file.geocoding.debounce_ms, 250);
        assert_eq!(file.geocoding.limit, 5);
        assert_eq!(file.widget.session_ttl_minutes, 60);
    }

    #[test]
    fn test_session_ttl_bounds() {
        let mut widget = WidgetConfig::default();
        assert_eq!(widget.session_ttl(), Some(TimeDelta::minutes(60)));

        widget.session_ttl_minutes = i64::MAX;
        assert!(widget.session_ttl().is_none());

        widget.session_ttl_minutes = 0;
        assert!(widget.session_ttl().is_none());
    }

    #[test]
    fn test_parse_empty_file_uses_defaults() {
        let file = Config::parse_config("   \n", Path::new("config.yaml")).unwrap();
        assert_eq!(file.geocoding.min_query_length, 4);
    }

    #[test]
    fn test_parse_invalid_yaml_is_rejected() {
        assert!(Config::parse_config("gemini: [unclosed", Path::new("config.yaml")).is_none());
    }
}
