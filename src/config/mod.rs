//! Configuration system for MarketPulse
//!
//! Supports loading configuration from:
//! 1. CLI --config argument
//! 2. ~/.config/marketpulse/config.json
//! 3. Default values
//!
//! Environment variables override config file values:
//! - MARKETPULSE_OLLAMA_URL
//! - MARKETPULSE_MODEL
//! - OPENAI_API_KEY (referenced by name from the model section)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProviderKind {
    #[default]
    Ollama,
    OpenAI,
}

impl std::fmt::Display for ModelProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::OpenAI => write!(f, "openai"),
        }
    }
}

/// Configuration for the text-generation model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider type
    #[serde(default)]
    pub provider: ModelProviderKind,

    /// API base URL
    #[serde(default = "default_ollama_url")]
    pub url: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (environment variable name like "OPENAI_API_KEY")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Top P sampling (0.0 - 1.0)
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_top_p() -> f32 {
    0.9
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProviderKind::Ollama,
            url: default_ollama_url(),
            model: default_model(),
            api_key: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    /// Resolve the API key from the environment variable it names
    pub fn resolve_api_key(&self) -> Option<String> {
        let name = self.api_key.as_deref()?;
        std::env::var(name).ok()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(ConfigError::ValidationError(format!(
                "Top P must be between 0.0 and 1.0, got {}",
                self.top_p
            )));
        }

        if self.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "Model URL cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the post fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Search endpoint URL
    #[serde(default = "default_search_url")]
    pub search_url: String,

    /// Maximum posts requested per keyword
    #[serde(default = "default_max_posts")]
    pub max_posts_per_keyword: usize,

    /// Recency window passed to the search endpoint (e.g. "year")
    #[serde(default = "default_recency_window")]
    pub recency_window: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Transport retry attempts per keyword
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Base backoff delay between retries in milliseconds (doubles per attempt)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_search_url() -> String {
    "https://www.reddit.com/search.json".to_string()
}

fn default_max_posts() -> usize {
    40
}

fn default_recency_window() -> String {
    "year".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    250
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            max_posts_per_keyword: default_max_posts(),
            recency_window: default_recency_window(),
            request_timeout_secs: default_request_timeout(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_posts_per_keyword == 0 {
            return Err(ConfigError::ValidationError(
                "max_posts_per_keyword must be at least 1".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the latent-topic extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Number of latent topics to extract
    #[serde(default = "default_lda_topics")]
    pub lda_topics: usize,

    /// Top keywords reported per latent topic
    #[serde(default = "default_lda_top_words")]
    pub lda_top_words: usize,

    /// Random seed for reproducible topic extraction
    #[serde(default = "default_lda_seed")]
    pub lda_seed: u64,

    /// Minimum number of documents a term must appear in
    #[serde(default = "default_min_doc_frequency")]
    pub min_doc_frequency: usize,

    /// Maximum fraction of documents a term may appear in
    #[serde(default = "default_max_doc_ratio")]
    pub max_doc_ratio: f64,
}

fn default_lda_topics() -> usize {
    3
}

fn default_lda_top_words() -> usize {
    6
}

fn default_lda_seed() -> u64 {
    42
}

fn default_min_doc_frequency() -> usize {
    2
}

fn default_max_doc_ratio() -> f64 {
    0.95
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lda_topics: default_lda_topics(),
            lda_top_words: default_lda_top_words(),
            lda_seed: default_lda_seed(),
            min_doc_frequency: default_min_doc_frequency(),
            max_doc_ratio: default_max_doc_ratio(),
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lda_topics == 0 {
            return Err(ConfigError::ValidationError(
                "lda_topics must be at least 1".to_string(),
            ));
        }

        if self.lda_top_words == 0 {
            return Err(ConfigError::ValidationError(
                "lda_top_words must be at least 1".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.max_doc_ratio) {
            return Err(ConfigError::ValidationError(format!(
                "max_doc_ratio must be between 0.0 and 1.0, got {}",
                self.max_doc_ratio
            )));
        }

        Ok(())
    }
}

/// Policy for keywords the model picked outside the candidate vocabulary.
///
/// The planner does not inherently restrict the model to the closed
/// candidate set; this policy decides what happens to out-of-vocabulary
/// keywords before the plan reaches the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeywordPolicy {
    /// Pass unknown keywords through unchanged (logged as warnings)
    #[default]
    Passthrough,
    /// Drop unknown keywords, keep the rest
    Filter,
    /// Fail the whole plan when any keyword is unknown
    Reject,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Text-generation model settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Post fetcher settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Latent-topic extraction settings
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Policy for model-chosen keywords outside the candidate vocabulary
    #[serde(default)]
    pub keyword_policy: KeywordPolicy,

    /// Bounded wait for each text-generation call, in seconds
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
}

fn default_generation_timeout() -> u64 {
    120
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            fetch: FetchConfig::default(),
            analysis: AnalysisConfig::default(),
            keyword_policy: KeywordPolicy::default(),
            generation_timeout_secs: default_generation_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration with the standard priority:
    /// explicit path, then the user config directory, then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading config from: {:?}", path);
                Self::from_file(path)?
            }
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    tracing::info!("Loading config from: {:?}", default_path);
                    Self::from_file(&default_path)?
                } else {
                    tracing::info!("Using default configuration with environment overrides");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Default config file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("marketpulse").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("MARKETPULSE_OLLAMA_URL") {
            if self.model.provider == ModelProviderKind::Ollama {
                self.model.url = url;
            }
        }
        if let Ok(model) = std::env::var("MARKETPULSE_MODEL") {
            self.model.model = model;
        }
    }

    /// Validate all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        self.fetch.validate()?;
        self.analysis.validate()?;

        if self.generation_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "generation_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.provider, ModelProviderKind::Ollama);
        assert_eq!(config.keyword_policy, KeywordPolicy::Passthrough);
    }

    #[test]
    fn test_temperature_out_of_range() {
        let mut config = AppConfig::default();
        config.model.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let mut config = AppConfig::default();
        config.fetch.retry_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_lda_topics_rejected() {
        let mut config = AppConfig::default();
        config.analysis.lda_topics = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let json = r#"{
            "model": { "provider": "ollama", "model": "llama3.1" },
            "fetch": { "max_posts_per_keyword": 10 },
            "keyword_policy": "filter"
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.fetch.max_posts_per_keyword, 10);
        assert_eq!(config.keyword_policy, KeywordPolicy::Filter);
        // Unspecified sections fall back to defaults
        assert_eq!(config.analysis.lda_topics, 3);
    }
}
