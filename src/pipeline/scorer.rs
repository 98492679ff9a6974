//! Lexicon-based sentiment scorer
//!
//! Scores document text with a weighted polarity lexicon tuned to
//! automotive / autonomous-driving discussion, with a small negation
//! window and intensity modifiers. Scores are deterministic for a given
//! text and clamped to [-1, 1]; text without any lexicon hit (including
//! empty text) scores 0.0.
//!
//! The lexicon is built exactly once per `Scorer` instance, lazily on
//! first use behind a thread-safe accessor. The scorer is meant to be
//! constructed by the process owner and shared by reference across
//! requests; it is immutable after initialization.

use super::{Document, ScoredDocument};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// How many tokens after a negation still get their polarity inverted.
const NEGATION_WINDOW: usize = 3;

/// Polarity lexicon: term weights, intensity modifiers and negations.
struct Lexicon {
    weights: HashMap<&'static str, f64>,
    modifiers: HashMap<&'static str, f64>,
    negations: HashSet<&'static str>,
}

impl Lexicon {
    fn build() -> Self {
        let weighted: &[(&str, f64)] = &[
            // strongly positive
            ("amazing", 0.8),
            ("excellent", 0.8),
            ("flawless", 0.85),
            ("impressive", 0.7),
            ("love", 0.7),
            ("great", 0.7),
            ("success", 0.7),
            ("breakthrough", 0.75),
            ("praised", 0.65),
            // moderately positive
            ("safe", 0.6),
            ("safer", 0.65),
            ("safely", 0.55),
            ("reliable", 0.65),
            ("smooth", 0.6),
            ("smoothly", 0.6),
            ("improved", 0.55),
            ("improvement", 0.55),
            ("improvements", 0.55),
            ("good", 0.5),
            ("confident", 0.5),
            ("progress", 0.5),
            ("works", 0.35),
            ("working", 0.3),
            ("comfortable", 0.45),
            ("convenient", 0.45),
            // strongly negative
            ("fatal", -0.95),
            ("death", -0.9),
            ("deaths", -0.9),
            ("died", -0.9),
            ("crash", -0.85),
            ("crashes", -0.85),
            ("crashed", -0.85),
            ("terrifying", -0.8),
            ("dangerous", -0.8),
            ("unsafe", -0.8),
            ("terrible", -0.8),
            ("horrible", -0.8),
            ("worst", -0.85),
            ("accident", -0.75),
            ("accidents", -0.75),
            ("failure", -0.75),
            ("failures", -0.75),
            ("failed", -0.7),
            ("defect", -0.7),
            ("defects", -0.7),
            ("defective", -0.7),
            ("malfunction", -0.7),
            ("injury", -0.7),
            ("injured", -0.7),
            // moderately negative
            ("lawsuit", -0.65),
            ("recall", -0.6),
            ("recalls", -0.6),
            ("recalled", -0.6),
            ("broken", -0.6),
            ("scary", -0.6),
            ("flaw", -0.55),
            ("flaws", -0.55),
            ("glitch", -0.5),
            ("glitches", -0.5),
            ("problem", -0.5),
            ("problems", -0.5),
            ("investigation", -0.5),
            ("complaint", -0.45),
            ("complaints", -0.45),
            ("issue", -0.4),
            ("issues", -0.4),
            ("disengagement", -0.4),
            ("disengagements", -0.4),
            ("concern", -0.35),
            ("concerns", -0.35),
        ];

        let modifier_list: &[(&str, f64)] = &[
            ("extremely", 1.5),
            ("incredibly", 1.5),
            ("very", 1.3),
            ("really", 1.25),
            ("quite", 1.1),
            ("somewhat", 0.7),
            ("slightly", 0.6),
            ("barely", 0.4),
        ];

        let negation_list = [
            "not", "no", "never", "hardly", "without", "isn't", "wasn't", "don't", "doesn't",
            "didn't", "won't", "can't", "couldn't",
        ];

        Self {
            weights: weighted.iter().copied().collect(),
            modifiers: modifier_list.iter().copied().collect(),
            negations: negation_list.iter().copied().collect(),
        }
    }
}

/// Sentiment scorer with a lazily-built, process-lifetime lexicon
pub struct Scorer {
    lexicon: OnceLock<Lexicon>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer {
    pub fn new() -> Self {
        Self {
            lexicon: OnceLock::new(),
        }
    }

    fn lexicon(&self) -> &Lexicon {
        self.lexicon.get_or_init(|| {
            tracing::debug!("Building sentiment lexicon");
            Lexicon::build()
        })
    }

    /// Score every document's derived text.
    pub fn score(&self, docs: Vec<Document>) -> Vec<ScoredDocument> {
        docs.into_iter()
            .map(|doc| {
                let sentiment_score = self.score_text(&doc.text());
                ScoredDocument {
                    doc,
                    sentiment_score,
                }
            })
            .collect()
    }

    /// Score one text. Pure: the same text always yields the same score.
    pub fn score_text(&self, text: &str) -> f64 {
        let lexicon = self.lexicon();

        let mut total = 0.0;
        let mut hits = 0usize;
        let mut modifier = 1.0;
        let mut negated_for = 0usize;

        for raw in text.split_whitespace() {
            let token = raw
                .trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase();
            if token.is_empty() {
                continue;
            }

            if lexicon.negations.contains(token.as_str()) {
                negated_for = NEGATION_WINDOW;
                continue;
            }

            if let Some(factor) = lexicon.modifiers.get(token.as_str()) {
                modifier = *factor;
                continue;
            }

            if let Some(weight) = lexicon.weights.get(token.as_str()) {
                let mut score = weight * modifier;
                if negated_for > 0 {
                    // invert with damping, an outright flip overshoots
                    score = -score * 0.8;
                }
                total += score;
                hits += 1;
                modifier = 1.0;
            }

            negated_for = negated_for.saturating_sub(1);
        }

        if hits == 0 {
            return 0.0;
        }

        (total / hits as f64).clamp(-1.0, 1.0)
    }
}
