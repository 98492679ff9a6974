//! Topic aggregation over the fixed taxonomy
//!
//! Maps scored documents onto the five chart topics by case-insensitive
//! keyword containment and reduces each topic to a mean score plus a
//! discrete sentiment label. The taxonomy, its keyword lists and their
//! order are load-time constants.

use super::ScoredDocument;
use serde::{Deserialize, Serialize};

/// The fixed chart topics, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topic {
    Safety,
    Recall,
    Collision,
    Autopilot,
    Quality,
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safety => write!(f, "Safety"),
            Self::Recall => write!(f, "Recall"),
            Self::Collision => write!(f, "Collision"),
            Self::Autopilot => write!(f, "Autopilot"),
            Self::Quality => write!(f, "Quality"),
        }
    }
}

/// Topic → keyword patterns, in declared topic order. A document belongs
/// to a topic when its text contains any pattern, case-insensitively;
/// keyword sets overlap on purpose and documents are not deduplicated
/// across topics.
pub const TAXONOMY: &[(Topic, &[&str])] = &[
    (Topic::Safety, &["safety", "crash", "collision"]),
    (Topic::Recall, &["recall"]),
    (Topic::Collision, &["collision", "crash"]),
    (
        Topic::Autopilot,
        &["fsd", "autopilot", "self-driving", "driverless"],
    ),
    (Topic::Quality, &["quality", "defect", "issue", "problem"]),
];

/// Discrete sentiment label derived from a topic score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Negative,
    Mixed,
    Neutral,
    Positive,
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Negative => write!(f, "Negative"),
            Self::Mixed => write!(f, "Mixed"),
            Self::Neutral => write!(f, "Neutral"),
            Self::Positive => write!(f, "Positive"),
        }
    }
}

/// Map a score in [-1, 1] to its label band. Bands are evaluated in
/// order; a boundary score belongs to the first band it satisfies.
pub fn label_for_score(score: f64) -> SentimentLabel {
    if score < -0.2 {
        SentimentLabel::Negative
    } else if score < 0.1 {
        SentimentLabel::Mixed
    } else if score < 0.3 {
        SentimentLabel::Neutral
    } else {
        SentimentLabel::Positive
    }
}

/// One row of the topic/sentiment chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRow {
    pub topic: Topic,
    pub score: f64,
    pub sentiment: SentimentLabel,
}

/// Aggregate scored documents over the fixed taxonomy.
pub fn aggregate(scored: &[ScoredDocument]) -> Vec<TopicRow> {
    aggregate_with(scored, TAXONOMY)
}

/// Aggregate over an explicit taxonomy: one row per topic, in taxonomy
/// order, regardless of input document order. An unmatched topic scores
/// 0.0 with the label derived from 0.0.
pub fn aggregate_with(
    scored: &[ScoredDocument],
    taxonomy: &[(Topic, &[&str])],
) -> Vec<TopicRow> {
    taxonomy
        .iter()
        .map(|(topic, keywords)| {
            let matching: Vec<f64> = scored
                .iter()
                .filter(|doc| {
                    let text = doc.doc.text().to_lowercase();
                    keywords.iter().any(|kw| text.contains(&kw.to_lowercase()))
                })
                .map(|doc| doc.sentiment_score)
                .collect();

            let score = if matching.is_empty() {
                0.0
            } else {
                matching.iter().sum::<f64>() / matching.len() as f64
            };

            TopicRow {
                topic: *topic,
                score,
                sentiment: label_for_score(score),
            }
        })
        .collect()
}
