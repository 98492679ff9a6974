//! Model provider abstraction for the text-generation call
//!
//! Supports:
//! - Ollama (local models) - the default backend
//! - OpenAI (GPT models)
//!
//! The provider is the single external collaborator for both the planner
//! (tool selection) and the pipeline (brief generation); everything above
//! it treats text-in/text-out as the whole contract.
//!
//! # Example
//!
//! ```no_run
//! use marketpulse::agent::provider::create_provider;
//! use marketpulse::config::ModelConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = create_provider(ModelConfig::default())?;
//! provider.validate_connection().await?;
//! let response = provider.generate("Hello!").await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

use crate::config::{ModelConfig, ModelProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Response from a model provider
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
}

/// Model provider trait
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a completion for a rendered prompt
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError>;

    /// Validate connection to the provider
    async fn validate_connection(&self) -> Result<(), ProviderError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a model provider from configuration
pub fn create_provider(config: ModelConfig) -> Result<Box<dyn ModelProvider>, ProviderError> {
    match config.provider {
        ModelProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(config))),
        ModelProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(config)?)),
    }
}

// ============================================================================
// Ollama Provider
// ============================================================================

pub struct OllamaProvider {
    config: ModelConfig,
    client: Client,
}

impl OllamaProvider {
    pub fn new(config: ModelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Self { config, client }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    model: String,
    response: String,
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/generate", self.config.url);

        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::ModelError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await?
            )));
        }

        let ollama_response: OllamaResponse = response.json().await?;

        Ok(ProviderResponse {
            content: ollama_response.response,
            model: ollama_response.model,
        })
    }

    async fn validate_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/api/tags", self.config.url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::ConnectionError(format!(
                "Failed to connect to Ollama at {}",
                self.config.url
            )));
        }

        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// OpenAI Provider
// ============================================================================

pub struct OpenAIProvider {
    config: ModelConfig,
    client: Client,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: ModelConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ProviderError::AuthError("OpenAI API key not found".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Ok(Self {
            config,
            client,
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct OpenAIResponse {
    model: String,
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: String,
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.config.url);

        let request = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
            "top_p": self.config.top_p,
            "max_tokens": self.config.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if response.status().as_u16() == 401 {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if !response.status().is_success() {
            return Err(ProviderError::ModelError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await?
            )));
        }

        let openai_response: OpenAIResponse = response.json().await?;
        let content = openai_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?;

        Ok(ProviderResponse {
            content,
            model: openai_response.model,
        })
    }

    async fn validate_connection(&self) -> Result<(), ProviderError> {
        let url = format!("{}/models", self.config.url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if response.status().as_u16() == 401 {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if !response.status().is_success() {
            return Err(ProviderError::ConnectionError(format!(
                "Failed to connect to OpenAI at {}",
                self.config.url
            )));
        }

        Ok(())
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama_provider() {
        let provider = create_provider(ModelConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "llama3.1");
    }

    #[test]
    fn test_openai_provider_requires_api_key() {
        let config = ModelConfig {
            provider: ModelProviderKind::OpenAI,
            api_key: Some("MARKETPULSE_TEST_MISSING_KEY".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            create_provider(config),
            Err(ProviderError::AuthError(_))
        ));
    }
}
