//! MarketPulse - market-sentiment research agent for autonomous driving
//!
//! MarketPulse answers free-text research questions about public sentiment
//! toward an autonomous-vehicle product. A language model plans which search
//! keywords to crawl, a resilient pipeline turns the crawled posts into a
//! deterministic topic/sentiment table plus latent topic clusters, and the
//! model turns the aggregates into a natural-language brief.
//!
//! # Architecture
//!
//! - **Pipeline**: Fetcher → Scorer → Aggregator → Topic Extractor, composed
//!   into one deterministic call that never fails outward
//! - **Agent**: Planner (the model picks the tool and keywords) → Dispatcher
//!   (validates and runs the plan, falls back safely) → Orchestrator
//!
//! # Main Modules
//!
//! - [`agent`] - Planner, dispatcher state machine and orchestration
//! - [`pipeline`] - Crawling, sentiment scoring, aggregation, topic modeling
//! - [`config`] - Configuration loading and validation
//!
//! # Example
//!
//! ```rust,no_run
//! use marketpulse::agent::orchestrator::ResearchOrchestrator;
//! use marketpulse::config::AppConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::default();
//! let orchestrator = ResearchOrchestrator::new(config)?;
//! let reply = orchestrator.handle("How does the market feel about FSD safety?").await;
//! println!("{}", reply.answer);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod pipeline;

pub use agent::orchestrator::{AgentReply, ResearchOrchestrator};
pub use agent::provider::{create_provider, ModelProvider};
pub use pipeline::aggregator::{SentimentLabel, Topic, TopicRow};
pub use pipeline::scorer::Scorer;
pub use pipeline::topics::LatentTopic;
pub use pipeline::{Document, PipelineResult, ScoredDocument};
