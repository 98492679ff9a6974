//! Dispatcher - validates the plan and runs the tool, falling back safely
//!
//! A tiny state machine: `AwaitingPlan → Dispatching → Done`, exactly one
//! tool invocation per run and no retries between states. Malformed plans,
//! unknown tool names and execution errors all terminate in `Done` with
//! the fixed default result instead of an error.

use crate::agent::planner::{PlanError, ToolRequest, CRAWL_TOOL};
use crate::agent::provider::ModelProvider;
use crate::config::AppConfig;
use crate::pipeline::aggregator::{SentimentLabel, Topic, TopicRow};
use crate::pipeline::scorer::Scorer;
use crate::pipeline::{run_market_sentiment, PipelineResult};
use serde::Deserialize;

/// Dispatcher states. Failures never transition backwards; each one jumps
/// straight to `Done` with a fallback result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    AwaitingPlan,
    Dispatching,
    Done,
}

/// Typed parameters for the crawl tool.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlParams {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Closed set of dispatchable operations. String-named plans resolve to a
/// variant here; anything unrecognized lands in `Unknown` and takes the
/// default-result path.
#[derive(Debug, Clone)]
pub enum ToolKind {
    CrawlMarketSentiment(CrawlParams),
    Unknown { name: String },
}

impl ToolKind {
    /// Resolve a parsed plan into a dispatchable operation.
    pub fn from_request(request: &ToolRequest) -> Self {
        if request.name != CRAWL_TOOL {
            return Self::Unknown {
                name: request.name.clone(),
            };
        }

        if request.parameters.is_null() {
            return Self::CrawlMarketSentiment(CrawlParams::default());
        }

        match serde_json::from_value(request.parameters.clone()) {
            Ok(params) => Self::CrawlMarketSentiment(params),
            Err(e) => {
                tracing::warn!("Crawl parameters do not match the schema: {}", e);
                Self::Unknown {
                    name: request.name.clone(),
                }
            }
        }
    }
}

/// The pre-baked "no data" chart returned whenever planning or execution
/// fails. The shape is fixed and must stay reproducible exactly.
pub fn default_topic_rows() -> Vec<TopicRow> {
    vec![
        TopicRow {
            topic: Topic::Safety,
            score: -0.42,
            sentiment: SentimentLabel::Negative,
        },
        TopicRow {
            topic: Topic::Recall,
            score: -0.38,
            sentiment: SentimentLabel::Negative,
        },
        TopicRow {
            topic: Topic::Collision,
            score: -0.28,
            sentiment: SentimentLabel::Negative,
        },
        TopicRow {
            topic: Topic::Autopilot,
            score: -0.15,
            sentiment: SentimentLabel::Mixed,
        },
        TopicRow {
            topic: Topic::Quality,
            score: 0.05,
            sentiment: SentimentLabel::Neutral,
        },
    ]
}

fn fallback_result(answer: String) -> PipelineResult {
    PipelineResult {
        answer,
        topic_rows: default_topic_rows(),
        latent_topics: Vec::new(),
        document_count: 0,
    }
}

/// Runs one plan against the analysis pipeline.
pub struct Dispatcher<'a> {
    provider: &'a dyn ModelProvider,
    scorer: &'a Scorer,
    config: &'a AppConfig,
}

impl<'a> Dispatcher<'a> {
    pub fn new(provider: &'a dyn ModelProvider, scorer: &'a Scorer, config: &'a AppConfig) -> Self {
        Self {
            provider,
            scorer,
            config,
        }
    }

    /// Drive the state machine for one planning outcome. Always returns a
    /// complete result bundle, never an error.
    pub async fn dispatch(
        &self,
        plan: Result<ToolRequest, PlanError>,
        question: &str,
    ) -> PipelineResult {
        let mut state = DispatchState::AwaitingPlan;
        tracing::debug!("Dispatcher state: {:?}", state);

        let request = match plan {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Planning failed: {}", e);
                state = DispatchState::Done;
                tracing::debug!("Dispatcher state: {:?}", state);
                return fallback_result(
                    "Could not build a tool-call plan for this question; \
                     showing the default sentiment table instead."
                        .to_string(),
                );
            }
        };

        state = DispatchState::Dispatching;
        tracing::debug!("Dispatcher state: {:?}, tool '{}'", state, request.name);

        let result = match ToolKind::from_request(&request) {
            ToolKind::CrawlMarketSentiment(params) => {
                let query = if params.query.is_empty() {
                    question.to_string()
                } else {
                    params.query
                };

                match run_market_sentiment(
                    &query,
                    &params.keywords,
                    self.provider,
                    self.scorer,
                    self.config,
                )
                .await
                {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!("Tool execution failed: {}", e);
                        fallback_result(format!(
                            "The analysis tool failed while processing this question: {}. \
                             Showing the default sentiment table instead.",
                            e
                        ))
                    }
                }
            }
            ToolKind::Unknown { name } => {
                tracing::warn!("Plan names unrecognized tool '{}'", name);
                fallback_result(format!(
                    "The plan requested an unknown tool ('{}'); \
                     showing the default sentiment table instead.",
                    name
                ))
            }
        };

        state = DispatchState::Done;
        tracing::debug!("Dispatcher state: {:?}", state);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rows_exact_shape() {
        let rows = default_topic_rows();
        let expected = [
            (Topic::Safety, -0.42, SentimentLabel::Negative),
            (Topic::Recall, -0.38, SentimentLabel::Negative),
            (Topic::Collision, -0.28, SentimentLabel::Negative),
            (Topic::Autopilot, -0.15, SentimentLabel::Mixed),
            (Topic::Quality, 0.05, SentimentLabel::Neutral),
        ];

        assert_eq!(rows.len(), expected.len());
        for (row, (topic, score, sentiment)) in rows.iter().zip(expected.iter()) {
            assert_eq!(row.topic, *topic);
            assert_eq!(row.score, *score);
            assert_eq!(row.sentiment, *sentiment);
        }
    }

    #[test]
    fn test_default_rows_serialize_stably() {
        let json = serde_json::to_string(&default_topic_rows()).unwrap();
        assert_eq!(
            json,
            r#"[{"topic":"Safety","score":-0.42,"sentiment":"Negative"},{"topic":"Recall","score":-0.38,"sentiment":"Negative"},{"topic":"Collision","score":-0.28,"sentiment":"Negative"},{"topic":"Autopilot","score":-0.15,"sentiment":"Mixed"},{"topic":"Quality","score":0.05,"sentiment":"Neutral"}]"#
        );
    }

    #[test]
    fn test_unknown_tool_name_resolves_to_unknown() {
        let request = ToolRequest {
            name: "delete_everything".to_string(),
            parameters: serde_json::json!({}),
        };
        assert!(matches!(
            ToolKind::from_request(&request),
            ToolKind::Unknown { .. }
        ));
    }

    #[test]
    fn test_crawl_request_resolves_with_typed_params() {
        let request = ToolRequest {
            name: CRAWL_TOOL.to_string(),
            parameters: serde_json::json!({
                "query": "how safe is fsd?",
                "keywords": ["fsd", "safety"]
            }),
        };

        match ToolKind::from_request(&request) {
            ToolKind::CrawlMarketSentiment(params) => {
                assert_eq!(params.query, "how safe is fsd?");
                assert_eq!(params.keywords, vec!["fsd", "safety"]);
            }
            other => panic!("expected crawl tool, got {:?}", other),
        }
    }

    #[test]
    fn test_crawl_request_with_missing_params_still_resolves() {
        let request = ToolRequest {
            name: CRAWL_TOOL.to_string(),
            parameters: serde_json::Value::Null,
        };

        match ToolKind::from_request(&request) {
            ToolKind::CrawlMarketSentiment(params) => {
                assert!(params.query.is_empty());
                assert!(params.keywords.is_empty());
            }
            other => panic!("expected crawl tool, got {:?}", other),
        }
    }
}
