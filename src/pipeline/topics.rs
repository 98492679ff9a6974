//! Latent topic extraction
//!
//! Surfaces keyword clusters in the crawled corpus that are independent of
//! the fixed chart taxonomy: a bag-of-words vectorizer (English stop words,
//! document-frequency filtering) feeds a seeded LDA model fitted by
//! collapsed Gibbs sampling, and each component is reported as its
//! top-weighted vocabulary terms.

use super::ScoredDocument;
use crate::config::AnalysisConfig;
use ndarray::{Array1, Array2};
use rand::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

/// Document-topic prior
const ALPHA: f64 = 0.1;
/// Topic-word prior
const BETA: f64 = 0.01;
/// Gibbs sampling sweeps over the corpus
const GIBBS_SWEEPS: usize = 200;

/// Errors from the topic extractor. `EmptyVocabulary` is a configuration
/// problem the pipeline downgrades to an empty result; everything else is
/// a genuine execution error.
#[derive(Error, Debug)]
pub enum TopicModelError {
    #[error("vocabulary is empty after frequency filtering")]
    EmptyVocabulary,

    #[error("number of topics must be positive")]
    InvalidTopicCount,

    #[error("number of keywords per topic must be positive")]
    InvalidTopWords,
}

/// One unsupervised keyword cluster, keywords most-weighted first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatentTopic {
    pub topic_id: usize,
    pub keywords: Vec<String>,
}

/// Extract `k` latent topics with `top_n` keywords each from the corpus.
///
/// An empty corpus yields an empty list. Term order inside the vocabulary
/// is alphabetical and ties in component weight are broken by that order,
/// so results are fully deterministic for a fixed seed.
pub fn extract_latent_topics(
    scored: &[ScoredDocument],
    k: usize,
    top_n: usize,
    params: &AnalysisConfig,
) -> Result<Vec<LatentTopic>, TopicModelError> {
    if scored.is_empty() {
        return Ok(Vec::new());
    }
    if k == 0 {
        return Err(TopicModelError::InvalidTopicCount);
    }
    if top_n == 0 {
        return Err(TopicModelError::InvalidTopWords);
    }

    let vectorizer = Vectorizer::new();
    let tokenized: Vec<Vec<String>> = scored
        .iter()
        .map(|doc| vectorizer.tokenize(&doc.doc.text()))
        .collect();

    let (dtm, vocabulary) =
        vectorizer.fit(&tokenized, params.min_doc_frequency, params.max_doc_ratio)?;

    let topic_word_counts = fit_lda(&dtm, k, params.lda_seed);

    let mut topics = Vec::with_capacity(k);
    for topic_idx in 0..k {
        let mut weighted: Vec<(usize, f64)> = (0..vocabulary.len())
            .map(|word_idx| (word_idx, topic_word_counts[[topic_idx, word_idx]] + BETA))
            .collect();
        // stable sort: ties keep vocabulary (alphabetical) order
        weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        weighted.truncate(top_n);

        topics.push(LatentTopic {
            topic_id: topic_idx,
            keywords: weighted
                .into_iter()
                .map(|(idx, _)| vocabulary[idx].clone())
                .collect(),
        });
    }

    Ok(topics)
}

/// Bag-of-words vectorizer: cleaning, stop-word removal and
/// document-frequency filtering.
struct Vectorizer {
    stop_words: HashSet<&'static str>,
    url_pattern: Regex,
    html_pattern: Regex,
    special_pattern: Regex,
    number_pattern: Regex,
}

impl Vectorizer {
    fn new() -> Self {
        Self {
            stop_words: default_stop_words(),
            url_pattern: Regex::new(r"https?://\S+").unwrap(),
            html_pattern: Regex::new(r"<[^>]+>").unwrap(),
            special_pattern: Regex::new(r"[^\w\s]").unwrap(),
            number_pattern: Regex::new(r"\b\d+\b").unwrap(),
        }
    }

    /// Clean and split one text into lowercase tokens.
    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut cleaned = self.url_pattern.replace_all(text, " ").to_string();
        cleaned = self.html_pattern.replace_all(&cleaned, " ").to_string();
        cleaned = self.special_pattern.replace_all(&cleaned, " ").to_string();
        cleaned = self.number_pattern.replace_all(&cleaned, " ").to_string();
        cleaned = cleaned.to_lowercase();

        cleaned
            .unicode_words()
            .filter(|word| {
                let len = word.len();
                (2..=50).contains(&len) && !self.stop_words.contains(word)
            })
            .map(|s| s.to_string())
            .collect()
    }

    /// Build the document-term matrix over the frequency-filtered,
    /// alphabetically ordered vocabulary.
    fn fit(
        &self,
        tokenized: &[Vec<String>],
        min_df: usize,
        max_df_ratio: f64,
    ) -> Result<(Array2<f64>, Vec<String>), TopicModelError> {
        let n_docs = tokenized.len();
        let max_df = (n_docs as f64 * max_df_ratio) as usize;

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for doc in tokenized {
            let unique: HashSet<&str> = doc.iter().map(|t| t.as_str()).collect();
            for token in unique {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        let mut vocabulary: Vec<String> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= min_df && *df <= max_df)
            .map(|(token, _)| token.to_string())
            .collect();
        vocabulary.sort();

        if vocabulary.is_empty() {
            return Err(TopicModelError::EmptyVocabulary);
        }

        let index: HashMap<&str, usize> = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.as_str(), i))
            .collect();

        let mut dtm = Array2::zeros((n_docs, vocabulary.len()));
        for (doc_idx, doc) in tokenized.iter().enumerate() {
            for token in doc {
                if let Some(&word_idx) = index.get(token.as_str()) {
                    dtm[[doc_idx, word_idx]] += 1.0;
                }
            }
        }

        Ok((dtm, vocabulary))
    }
}

/// Fit LDA by collapsed Gibbs sampling and return topic-word counts
/// (`n_topics` x vocabulary size).
fn fit_lda(dtm: &Array2<f64>, n_topics: usize, seed: u64) -> Array2<f64> {
    let n_docs = dtm.nrows();
    let n_words = dtm.ncols();
    let mut rng = StdRng::seed_from_u64(seed);

    // word occurrence list per document
    let doc_words: Vec<Vec<usize>> = (0..n_docs)
        .map(|doc_idx| {
            let mut words = Vec::new();
            for word_idx in 0..n_words {
                for _ in 0..dtm[[doc_idx, word_idx]] as usize {
                    words.push(word_idx);
                }
            }
            words
        })
        .collect();

    let mut topic_word_counts: Array2<f64> = Array2::zeros((n_topics, n_words));
    let mut doc_topic_counts: Array2<f64> = Array2::zeros((n_docs, n_topics));
    let mut topic_counts: Array1<f64> = Array1::zeros(n_topics);

    // random initial assignment
    let mut assignments: Vec<Vec<usize>> = Vec::with_capacity(n_docs);
    for (doc_idx, words) in doc_words.iter().enumerate() {
        let mut doc_assignments = Vec::with_capacity(words.len());
        for &word_idx in words {
            let topic = rng.gen_range(0..n_topics);
            doc_assignments.push(topic);
            topic_word_counts[[topic, word_idx]] += 1.0;
            doc_topic_counts[[doc_idx, topic]] += 1.0;
            topic_counts[topic] += 1.0;
        }
        assignments.push(doc_assignments);
    }

    let beta_sum = BETA * n_words as f64;

    for _ in 0..GIBBS_SWEEPS {
        for (doc_idx, words) in doc_words.iter().enumerate() {
            for (pos, &word_idx) in words.iter().enumerate() {
                let old_topic = assignments[doc_idx][pos];
                topic_word_counts[[old_topic, word_idx]] -= 1.0;
                doc_topic_counts[[doc_idx, old_topic]] -= 1.0;
                topic_counts[old_topic] -= 1.0;

                // sample a topic proportional to
                // P(topic | doc) * P(word | topic)
                let mut probs = Vec::with_capacity(n_topics);
                let mut total = 0.0;
                for topic in 0..n_topics {
                    let doc_topic = doc_topic_counts[[doc_idx, topic]] + ALPHA;
                    let topic_word =
                        (topic_word_counts[[topic, word_idx]] + BETA) / (topic_counts[topic] + beta_sum);
                    let prob = doc_topic * topic_word;
                    total += prob;
                    probs.push(prob);
                }

                let threshold = rng.gen::<f64>() * total;
                let mut cumsum = 0.0;
                let mut new_topic = n_topics - 1;
                for (topic, &prob) in probs.iter().enumerate() {
                    cumsum += prob;
                    if cumsum >= threshold {
                        new_topic = topic;
                        break;
                    }
                }

                topic_word_counts[[new_topic, word_idx]] += 1.0;
                doc_topic_counts[[doc_idx, new_topic]] += 1.0;
                topic_counts[new_topic] += 1.0;
                assignments[doc_idx][pos] = new_topic;
            }
        }
    }

    topic_word_counts
}

/// Default English stop words
fn default_stop_words() -> HashSet<&'static str> {
    [
        // articles
        "a", "an", "the",
        // pronouns
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
        "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
        "who", "whom", "this", "that", "these", "those",
        // verbs
        "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "having",
        "do", "does", "did", "doing", "would", "should", "could", "ought", "might", "must",
        "shall", "will", "can", "may",
        // prepositions
        "at", "by", "for", "from", "in", "into", "of", "on", "to", "with", "about", "against",
        "between", "during", "before", "after", "above", "below", "up", "down", "out", "off",
        "over", "under", "again", "further", "then", "once",
        // conjunctions
        "and", "but", "or", "nor", "so", "yet", "both", "either", "neither", "not", "only",
        "than", "when", "where", "while", "if", "because", "as", "until", "although",
        // other common words
        "here", "there", "all", "each", "few", "more", "most", "other", "some", "such", "no",
        "any", "own", "same", "too", "very", "just", "also", "now", "how", "why", "well",
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Document;

    fn scored(text: &str) -> ScoredDocument {
        ScoredDocument {
            doc: Document {
                keyword: "kw".to_string(),
                title: text.to_string(),
                body: String::new(),
                url: String::new(),
            },
            sentiment_score: 0.0,
        }
    }

    fn corpus() -> Vec<ScoredDocument> {
        vec![
            scored("autopilot crash investigation autopilot highway"),
            scored("autopilot crash report highway accident"),
            scored("robotaxi permit approval robotaxi expansion"),
            scored("robotaxi permit ride-hailing expansion launch"),
            scored("recall notice steering recall defect"),
            scored("recall defect steering complaint"),
        ]
    }

    #[test]
    fn test_empty_corpus_returns_empty() {
        let params = AnalysisConfig::default();
        let topics = extract_latent_topics(&[], 3, 6, &params).unwrap();
        assert!(topics.is_empty());
    }

    #[test]
    fn test_zero_topics_is_an_error() {
        let params = AnalysisConfig::default();
        let err = extract_latent_topics(&corpus(), 0, 6, &params).unwrap_err();
        assert!(matches!(err, TopicModelError::InvalidTopicCount));
    }

    #[test]
    fn test_empty_vocabulary_is_surfaced() {
        let params = AnalysisConfig::default();
        // every term appears in exactly one document, so min_df=2 drops all
        let docs = vec![scored("alpha bravo"), scored("charlie delta")];
        let err = extract_latent_topics(&docs, 2, 3, &params).unwrap_err();
        assert!(matches!(err, TopicModelError::EmptyVocabulary));
    }

    #[test]
    fn test_k_topics_with_top_n_keywords() {
        let params = AnalysisConfig::default();
        let topics = extract_latent_topics(&corpus(), 3, 2, &params).unwrap();
        assert_eq!(topics.len(), 3);
        for (i, topic) in topics.iter().enumerate() {
            assert_eq!(topic.topic_id, i);
            assert_eq!(topic.keywords.len(), 2);
        }
    }

    #[test]
    fn test_top_n_capped_by_vocabulary_size() {
        let params = AnalysisConfig::default();
        // shared vocabulary is small; ask for far more keywords than exist
        let topics = extract_latent_topics(&corpus(), 2, 50, &params).unwrap();
        for topic in topics {
            assert!(topic.keywords.len() < 50);
            assert!(!topic.keywords.is_empty());
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let params = AnalysisConfig::default();
        let first = extract_latent_topics(&corpus(), 3, 4, &params).unwrap();
        let second = extract_latent_topics(&corpus(), 3, 4, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tokenizer_strips_noise() {
        let vectorizer = Vectorizer::new();
        let tokens = vectorizer.tokenize("Visit https://example.com! The <b>crash</b> of 2024");
        assert!(tokens.contains(&"crash".to_string()));
        assert!(!tokens.iter().any(|t| t.contains("http")));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"2024".to_string()));
    }

    #[test]
    fn test_vocabulary_is_alphabetical() {
        let vectorizer = Vectorizer::new();
        let tokenized: Vec<Vec<String>> = corpus()
            .iter()
            .map(|d| vectorizer.tokenize(&d.doc.text()))
            .collect();
        let (_, vocabulary) = vectorizer.fit(&tokenized, 2, 0.95).unwrap();
        let mut sorted = vocabulary.clone();
        sorted.sort();
        assert_eq!(vocabulary, sorted);
    }
}
