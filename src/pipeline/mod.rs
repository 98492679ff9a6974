//! Analysis pipeline: crawl → score → aggregate → topic model → brief
//!
//! The pipeline entrypoint [`run_market_sentiment`] is the single "tool" the
//! agent dispatches to. It composes the fetcher, scorer, aggregator and
//! latent-topic extractor into one deterministic call, then asks the
//! text-generation model to turn the aggregates into a natural-language
//! brief. Already-computed aggregates survive a failed or timed-out
//! generation call; only genuinely broken analysis parameters propagate as
//! an error, to be absorbed by the dispatcher.

pub mod aggregator;
pub mod fetcher;
pub mod scorer;
pub mod topics;

use crate::agent::provider::ModelProvider;
use crate::config::AppConfig;
use self::aggregator::TopicRow;
use self::fetcher::Fetcher;
use self::scorer::Scorer;
use self::topics::{extract_latent_topics, LatentTopic, TopicModelError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// One retrieved social-media post, tagged with the keyword that found it.
///
/// Immutable once produced by the fetcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub keyword: String,
    pub title: String,
    pub body: String,
    pub url: String,
}

impl Document {
    /// Derived text used by every downstream stage: title + body.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.body).trim().to_string()
    }
}

/// A document with its sentiment score in [-1, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredDocument {
    #[serde(flatten)]
    pub doc: Document,
    pub sentiment_score: f64,
}

/// The full result bundle of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub answer: String,
    pub topic_rows: Vec<TopicRow>,
    pub latent_topics: Vec<LatentTopic>,
    pub document_count: usize,
}

/// Errors that escape the pipeline (and are absorbed by the dispatcher)
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("topic model failed: {0}")]
    TopicModel(#[from] TopicModelError),
}

/// Run the full market-sentiment analysis for one question.
///
/// Sequencing is strictly fetch → score → aggregate → latent topics →
/// prompt render → generation call. Transport failures die inside the
/// fetcher, an empty filtered vocabulary degrades to empty latent topics,
/// and a failed generation call is replaced by a textual fallback built
/// from the aggregates.
pub async fn run_market_sentiment(
    question: &str,
    keywords: &[String],
    provider: &dyn ModelProvider,
    scorer: &Scorer,
    config: &AppConfig,
) -> Result<PipelineResult, PipelineError> {
    let fetcher = Fetcher::new(&config.fetch);
    let docs = fetcher
        .fetch(keywords, config.fetch.max_posts_per_keyword)
        .await;
    tracing::info!("Fetched {} documents for {} keyword(s)", docs.len(), keywords.len());

    let scored = scorer.score(docs);
    let topic_rows = aggregator::aggregate(&scored);

    let latent_topics = match extract_latent_topics(
        &scored,
        config.analysis.lda_topics,
        config.analysis.lda_top_words,
        &config.analysis,
    ) {
        Ok(topics) => topics,
        Err(TopicModelError::EmptyVocabulary) => {
            tracing::warn!("Topic model vocabulary is empty after filtering, skipping latent topics");
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };

    let prompt = build_answer_prompt(question, keywords, &topic_rows, &latent_topics, scored.len());

    let wait = Duration::from_secs(config.generation_timeout_secs);
    let answer = match timeout(wait, provider.generate(&prompt)).await {
        Ok(Ok(response)) => response.content,
        Ok(Err(e)) => {
            tracing::warn!("Generation call failed, using fallback answer: {}", e);
            fallback_answer(&topic_rows, &e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                "Generation call timed out after {}s, using fallback answer",
                config.generation_timeout_secs
            );
            fallback_answer(&topic_rows, "the generation call timed out")
        }
    };

    Ok(PipelineResult {
        answer,
        topic_rows,
        latent_topics,
        document_count: scored.len(),
    })
}

/// Render the brief-generation prompt from the computed aggregates.
fn build_answer_prompt(
    question: &str,
    keywords: &[String],
    topic_rows: &[TopicRow],
    latent_topics: &[LatentTopic],
    document_count: usize,
) -> String {
    let topic_block = topic_rows
        .iter()
        .map(|row| format!("- {}: {:.2} ({})", row.topic, row.score, row.sentiment))
        .collect::<Vec<_>>()
        .join("\n");

    let latent_block = if latent_topics.is_empty() {
        "(no clear latent topics)".to_string()
    } else {
        latent_topics
            .iter()
            .map(|t| format!("- topic {}: {}", t.topic_id, t.keywords.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are a research assistant analyzing market perception and safety
issues around an autonomous-driving product.

[User question]
{question}

[Documents collected]
{document_count}

[Search keywords used]
{keywords}

[Sentiment score per topic (-1 to +1)]
{topic_block}

[Latent topic clusters (top keywords)]
{latent_block}

Based on the data above:
1) Summarize the current market perception of Safety, Recall, Collision,
   Autopilot and Quality in one line each.
2) List the 2-3 most negative risks as bullets.
3) List the 2-3 most positive signals as bullets.
4) Close with a one-sentence overall conclusion.

Keep it to 4-6 concise, analytical bullet-style lines."#,
        question = question,
        document_count = document_count,
        keywords = keywords.join(", "),
        topic_block = topic_block,
        latent_block = latent_block,
    )
}

/// Best-effort textual answer when the generation call fails or times out.
fn fallback_answer(topic_rows: &[TopicRow], cause: &str) -> String {
    let summary = topic_rows
        .iter()
        .map(|row| format!("{} {:.2} ({})", row.topic, row.score, row.sentiment))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "The language model could not produce a brief ({}). \
         Aggregated sentiment per topic: {}.",
        cause, summary
    )
}
