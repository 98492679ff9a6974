//! Planner - lets the model choose the tool and its keywords
//!
//! The planner renders a prompt describing the single available tool and
//! the closed candidate keyword vocabulary, asks the model for a JSON-only
//! reply, and extracts that one structured payload from whatever free text
//! actually comes back. Parsing failures are explicit ([`PlanError`]) and
//! propagate to the dispatcher; the planner itself never falls back.

use crate::agent::provider::{ModelProvider, ProviderError};
use crate::config::KeywordPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// The one tool the planner may select.
pub const CRAWL_TOOL: &str = "crawl_market_sentiment";

/// Closed candidate vocabulary the model picks search keywords from.
pub const CANDIDATE_KEYWORDS: &[&str] = &[
    "tesla",
    "musk",
    "fsd",
    "autopilot",
    "robotaxi",
    "cybercab",
    "self-driving",
    "autonomous driving",
    "driverless",
    "safety",
    "crash",
    "collision",
    "recall",
    "investigation",
    "nhtsa",
    "dmv",
    "cpuc",
    "disengagement",
    "permit",
    "ride-hailing",
];

/// Planning errors. All of them terminate the run at the dispatcher with
/// the default result; none is recovered here.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("malformed plan: {0}")]
    MalformedPlan(String),

    #[error("plan rejected, unknown keywords: {0:?}")]
    UnknownKeywords(Vec<String>),

    #[error("planning timed out after {0}s")]
    Timeout(u64),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// The structured payload extracted from the model's planning reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ToolRequest {
    /// The keywords array inside `parameters`, if present and well-typed.
    pub fn keywords(&self) -> Vec<String> {
        self.parameters
            .get("keywords")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Plans one tool call per question through the model provider.
pub struct Planner<'a> {
    provider: &'a dyn ModelProvider,
    policy: KeywordPolicy,
    generation_timeout: Duration,
}

impl<'a> Planner<'a> {
    pub fn new(
        provider: &'a dyn ModelProvider,
        policy: KeywordPolicy,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            policy,
            generation_timeout,
        }
    }

    /// Ask the model which tool to run for this question and parse its
    /// reply into a [`ToolRequest`].
    pub async fn plan(&self, question: &str) -> Result<ToolRequest, PlanError> {
        let prompt = build_planner_prompt(question);

        let response = match timeout(self.generation_timeout, self.provider.generate(&prompt)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(PlanError::Timeout(self.generation_timeout.as_secs())),
        };

        tracing::debug!("Planner reply: {}", response.content);

        let mut request = parse_tool_request(&response.content)?;
        if request.name == CRAWL_TOOL {
            self.apply_keyword_policy(&mut request)?;
        }

        Ok(request)
    }

    /// Enforce the configured policy on keywords outside the candidate
    /// vocabulary. The model is not trusted to stay inside the closed set.
    fn apply_keyword_policy(&self, request: &mut ToolRequest) -> Result<(), PlanError> {
        let keywords = request.keywords();
        let unknown: Vec<String> = keywords
            .iter()
            .filter(|kw| !is_candidate(kw))
            .cloned()
            .collect();

        if unknown.is_empty() {
            return Ok(());
        }

        match self.policy {
            KeywordPolicy::Passthrough => {
                for kw in &unknown {
                    tracing::warn!("Model picked out-of-vocabulary keyword '{}'", kw);
                }
                Ok(())
            }
            KeywordPolicy::Filter => {
                let kept: Vec<String> = keywords.into_iter().filter(|kw| is_candidate(kw)).collect();
                tracing::warn!(
                    "Dropped {} out-of-vocabulary keyword(s): {:?}",
                    unknown.len(),
                    unknown
                );
                if kept.is_empty() {
                    return Err(PlanError::MalformedPlan(
                        "no candidate keywords survived filtering".to_string(),
                    ));
                }
                request.parameters["keywords"] = serde_json::json!(kept);
                Ok(())
            }
            KeywordPolicy::Reject => Err(PlanError::UnknownKeywords(unknown)),
        }
    }
}

fn is_candidate(keyword: &str) -> bool {
    let lowered = keyword.to_lowercase();
    CANDIDATE_KEYWORDS.contains(&lowered.as_str())
}

/// Render the tool-selection prompt for one question.
fn build_planner_prompt(question: &str) -> String {
    format!(
        r#"You are a research assistant investigating market perception and
safety issues around autonomous-driving products.

You have exactly one tool available:

1) "{tool}"
   - description: crawls recent social-media posts for the given keywords,
     scores their sentiment and extracts topic clusters.
   - parameters:
     * query: the user's original question (string)
     * keywords: the search keywords to use (array of strings, at most 5)

Pick keywords only from the candidate list below. Choose the 3-5 most
relevant ones for this question.

Candidate keywords:
{candidates}

[User question]
{question}

Reply with JSON only, no explanations:

{{
  "name": "{tool}",
  "parameters": {{
    "query": "the user question verbatim",
    "keywords": ["tesla", "fsd", "safety"]
  }}
}}"#,
        tool = CRAWL_TOOL,
        candidates = CANDIDATE_KEYWORDS.join(", "),
        question = question,
    )
}

/// Parse the model's free-text reply into a [`ToolRequest`].
pub fn parse_tool_request(reply: &str) -> Result<ToolRequest, PlanError> {
    let payload = extract_json(reply).ok_or_else(|| {
        PlanError::MalformedPlan("no JSON object found in model reply".to_string())
    })?;

    let request: ToolRequest = serde_json::from_str(&payload)
        .map_err(|e| PlanError::MalformedPlan(format!("invalid JSON payload: {}", e)))?;

    if request.name.is_empty() {
        return Err(PlanError::MalformedPlan("empty tool name".to_string()));
    }

    Ok(request)
}

/// Locate the single JSON object inside a noisy model reply: strip an
/// optional markdown code fence, then take the span from the first `{`
/// to the last `}`.
pub fn extract_json(reply: &str) -> Option<String> {
    let mut text = reply.trim();

    if let Some(start) = text.find("```") {
        let fenced = &text[start + 3..];
        let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
        if let Some(end) = fenced.find("```") {
            text = fenced[..end].trim();
        }
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last < first {
        return None;
    }

    Some(text[first..=last].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_bare_object() {
        let reply = r#"{"name": "crawl_market_sentiment"}"#;
        assert_eq!(extract_json(reply).unwrap(), reply);
    }

    #[test]
    fn test_extract_json_with_fence() {
        let reply = "Sure! ```json\n{\"name\":\"crawl_market_sentiment\",\"parameters\":{\"query\":\"q\",\"keywords\":[\"fsd\"]}}\n```";
        let payload = extract_json(reply).unwrap();
        let request: ToolRequest = serde_json::from_str(&payload).unwrap();
        assert_eq!(request.name, "crawl_market_sentiment");
        assert_eq!(request.keywords(), vec!["fsd".to_string()]);
    }

    #[test]
    fn test_extract_json_with_surrounding_prose() {
        let reply = "Here is my plan:\n{\"name\": \"x\", \"parameters\": {}}\nHope this helps!";
        let payload = extract_json(reply).unwrap();
        assert!(payload.starts_with('{'));
        assert!(payload.ends_with('}'));
        assert!(serde_json::from_str::<serde_json::Value>(&payload).is_ok());
    }

    #[test]
    fn test_extract_json_unterminated_fence() {
        let reply = "```json\n{\"name\": \"x\"}";
        let payload = extract_json(reply).unwrap();
        assert_eq!(payload, "{\"name\": \"x\"}");
    }

    #[test]
    fn test_extract_json_no_braces() {
        assert!(extract_json("I cannot help with that.").is_none());
        assert!(extract_json("").is_none());
    }

    #[test]
    fn test_parse_rejects_braceless_reply() {
        let err = parse_tool_request("no structure here").unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan(_)));
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let err = parse_tool_request("{name: unquoted}").unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan(_)));
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        let err = parse_tool_request(r#"{"name": "", "parameters": {}}"#).unwrap_err();
        assert!(matches!(err, PlanError::MalformedPlan(_)));
    }

    #[test]
    fn test_keywords_missing_parameters() {
        let request = parse_tool_request(r#"{"name": "crawl_market_sentiment"}"#).unwrap();
        assert!(request.keywords().is_empty());
    }

    #[test]
    fn test_candidate_check_is_case_insensitive() {
        assert!(is_candidate("Tesla"));
        assert!(is_candidate("NHTSA"));
        assert!(!is_candidate("bitcoin"));
    }

    #[test]
    fn test_planner_prompt_lists_tool_and_candidates() {
        let prompt = build_planner_prompt("Is FSD safe?");
        assert!(prompt.contains(CRAWL_TOOL));
        assert!(prompt.contains("Is FSD safe?"));
        for kw in CANDIDATE_KEYWORDS {
            assert!(prompt.contains(kw), "missing candidate '{}'", kw);
        }
    }
}
