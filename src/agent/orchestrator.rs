//! Research orchestrator - one Planner → Dispatcher run per question
//!
//! Stateless across calls: every question starts a fresh run, and the
//! reply is always a complete bundle (answer + chart rows + latent
//! topics), never an error. Each run gets a uuid for log correlation.

use crate::agent::dispatcher::Dispatcher;
use crate::agent::planner::Planner;
use crate::agent::provider::{create_provider, ModelProvider, ProviderError};
use crate::config::AppConfig;
use crate::pipeline::aggregator::TopicRow;
use crate::pipeline::scorer::Scorer;
use crate::pipeline::topics::LatentTopic;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Orchestrator construction errors
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// The bundle handed back to the caller (CLI or any other boundary).
#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub answer: String,
    pub topic_rows: Vec<TopicRow>,
    pub latent_topics: Vec<LatentTopic>,
}

/// Top-level agent: owns the provider, the scorer singleton and the
/// configuration, and sequences Planner then Dispatcher exactly once per
/// incoming question.
pub struct ResearchOrchestrator {
    config: AppConfig,
    provider: Box<dyn ModelProvider>,
    scorer: Scorer,
}

impl ResearchOrchestrator {
    /// Create an orchestrator from validated configuration.
    pub fn new(config: AppConfig) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let provider = create_provider(config.model.clone())?;

        Ok(Self {
            config,
            provider,
            scorer: Scorer::new(),
        })
    }

    /// Create an orchestrator with an externally constructed provider.
    pub fn with_provider(
        config: AppConfig,
        provider: Box<dyn ModelProvider>,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        Ok(Self {
            config,
            provider,
            scorer: Scorer::new(),
        })
    }

    /// Check that the configured provider is reachable.
    pub async fn validate_connection(&self) -> Result<(), ProviderError> {
        self.provider.validate_connection().await
    }

    /// Answer one research question. Always returns a complete reply;
    /// every failure mode inside the run resolves to a fallback bundle.
    pub async fn handle(&self, question: &str) -> AgentReply {
        let run_id = Uuid::new_v4();
        tracing::info!("run {}: planning for question: {}", run_id, question);

        let generation_timeout = Duration::from_secs(self.config.generation_timeout_secs);
        let planner = Planner::new(
            self.provider.as_ref(),
            self.config.keyword_policy,
            generation_timeout,
        );
        let dispatcher = Dispatcher::new(self.provider.as_ref(), &self.scorer, &self.config);

        let plan = planner.plan(question).await;
        if let Ok(ref request) = plan {
            tracing::info!(
                "run {}: dispatching tool '{}' with keywords {:?}",
                run_id,
                request.name,
                request.keywords()
            );
        }

        let result = dispatcher.dispatch(plan, question).await;
        tracing::info!(
            "run {}: done, {} document(s), {} latent topic(s)",
            run_id,
            result.document_count,
            result.latent_topics.len()
        );

        AgentReply {
            answer: result.answer,
            topic_rows: result.topic_rows,
            latent_topics: result.latent_topics,
        }
    }
}
