//! Near-duplicate headline removal using TF-IDF cosine similarity.
//!
//! Titles are tokenised into lowercase words of two or more characters with
//! English stop words removed. Each title becomes an L2-normalised TF-IDF
//! vector (raw term counts, smoothed IDF `ln((1 + n) / (1 + df)) + 1`). Walking
//! the list in order, a title is kept unless it is more similar than the
//! threshold to an earlier title that was itself kept.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::Trend;

const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"\b\w\w+\b") {
        Ok(re) => re,
        Err(e) => unreachable!("token pattern is a valid literal: {e}"),
    })
}

fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    token_pattern()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Sparse L2-normalised TF-IDF vectors, one per document.
fn tfidf_vectors(documents: &[Vec<String>]) -> Vec<HashMap<&str, f64>> {
    let n = documents.len() as f64;
    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        let mut seen: Vec<&str> = doc.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for term in seen {
            *document_frequency.entry(term).or_default() += 1;
        }
    }

    documents
        .iter()
        .map(|doc| {
            let mut vector: HashMap<&str, f64> = HashMap::new();
            for term in doc {
                *vector.entry(term.as_str()).or_default() += 1.0;
            }
            for (term, weight) in vector.iter_mut() {
                let df = document_frequency.get(term).copied().unwrap_or(0) as f64;
                *weight *= ((1.0 + n) / (1.0 + df)).ln() + 1.0;
            }
            let norm = vector.values().map(|w| w * w).sum::<f64>().sqrt();
            if norm > 0.0 {
                vector.values_mut().for_each(|w| *w /= norm);
            }
            vector
        })
        .collect()
}

fn cosine(a: &HashMap<&str, f64>, b: &HashMap<&str, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum()
}

/// Drops trends whose titles are near-duplicates of an earlier kept title.
///
/// Order of the survivors is preserved. Lists shorter than two are returned
/// unchanged.
pub fn dedupe_trends(trends: Vec<Trend>, threshold: f64) -> Vec<Trend> {
    if trends.len() < 2 {
        return trends;
    }

    let tokens: Vec<Vec<String>> = trends.iter().map(|t| tokenize(&t.title)).collect();
    let vectors = tfidf_vectors(&tokens);

    let mut kept_indices: Vec<usize> = Vec::with_capacity(trends.len());
    for i in 0..trends.len() {
        let duplicate = kept_indices
            .iter()
            .any(|&k| cosine(&vectors[k], &vectors[i]) > threshold);
        if duplicate {
            tracing::debug!(title = trends[i].title.as_str(), "dropping near-duplicate trend");
        } else {
            kept_indices.push(i);
        }
    }

    let mut keep = vec![false; trends.len()];
    for k in kept_indices {
        keep[k] = true;
    }
    trends
        .into_iter()
        .zip(keep)
        .filter_map(|(trend, kept)| kept.then_some(trend))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trends(titles: &[&str]) -> Vec<Trend> {
        titles.iter().map(|t| Trend::new(*t, "RSS Feed")).collect()
    }

    fn titles(trends: &[Trend]) -> Vec<&str> {
        trends.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn tokenizer_lowercases_and_drops_stop_words_and_short_tokens() {
        assert_eq!(
            tokenize("The Fed raises a RATE in 2024"),
            vec!["fed", "raises", "rate", "2024"]
        );
    }

    #[test]
    fn near_duplicate_headlines_are_removed() {
        let input = trends(&[
            "Fed raises interest rates again",
            "Fed raises interest rates by quarter point",
            "Wildfire spreads across northern California",
        ]);
        let out = dedupe_trends(input, 0.3);
        assert_eq!(
            titles(&out),
            vec![
                "Fed raises interest rates again",
                "Wildfire spreads across northern California"
            ]
        );
    }

    #[test]
    fn distinct_headlines_survive_in_order() {
        let input = trends(&[
            "Chipmaker unveils new processor",
            "Election results contested in capital",
            "Central bank holds rates steady",
        ]);
        let out = dedupe_trends(input.clone(), 0.3);
        assert_eq!(out, input);
    }

    #[test]
    fn identical_titles_collapse_to_first() {
        let out = dedupe_trends(trends(&["Same story", "Same story", "Same story"]), 0.3);
        assert_eq!(titles(&out), vec!["Same story"]);
    }

    #[test]
    fn stop_word_only_titles_are_never_duplicates() {
        let out = dedupe_trends(trends(&["The", "Of the"]), 0.3);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn short_lists_pass_through() {
        assert!(dedupe_trends(vec![], 0.3).is_empty());
        assert_eq!(dedupe_trends(trends(&["Only"]), 0.3).len(), 1);
    }
}
