use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::vocabulary::VocabularyIndex;

/// Sparse term -> weight mapping with non-negative weights.
///
/// Only terms present in the vocabulary at build time appear as keys, so
/// stored vectors stay valid as the vocabulary grows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SparseVector(BTreeMap<String, f32>);

impl SparseVector {
    /// Create an empty vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-zero features.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the vector has no features (norm 0).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Weight of `term`, if present.
    pub fn get(&self, term: &str) -> Option<f32> {
        self.0.get(term).copied()
    }

    /// Iterate `(term, weight)` pairs in term order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(t, w)| (t.as_str(), *w))
    }

    /// Iterate the terms in term order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Euclidean (L2) norm.
    pub fn norm(&self) -> f32 {
        self.0.values().map(|w| w * w).sum::<f32>().sqrt()
    }
}

impl FromIterator<(String, f32)> for SparseVector {
    fn from_iter<I: IntoIterator<Item = (String, f32)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(_, w)| *w > 0.0).collect())
    }
}

/// Build a TF-IDF vector for `tokens` against the current vocabulary.
///
/// TF is the raw count of a term in `tokens`; IDF comes from
/// [`VocabularyIndex::idf`]. Terms the vocabulary has never seen are dropped.
/// The vocabulary is only read, never modified.
pub fn build_vector(tokens: &[String], vocabulary: &VocabularyIndex) -> SparseVector {
    let mut term_freq: HashMap<&str, f32> = HashMap::new();
    for token in tokens {
        *term_freq.entry(token.as_str()).or_insert(0.0) += 1.0;
    }

    term_freq
        .into_iter()
        .filter_map(|(term, tf)| {
            vocabulary
                .idf(term)
                .map(|idf| (term.to_string(), tf * idf))
        })
        .collect()
}

/// Top `max_count` terms of `vector` by descending weight.
///
/// Equal weights keep the order in which the terms first appear in `tokens`.
pub fn extract_keywords(vector: &SparseVector, tokens: &[String], max_count: usize) -> Vec<String> {
    let mut first_seen: HashMap<&str, usize> = HashMap::new();
    for (pos, token) in tokens.iter().enumerate() {
        first_seen.entry(token.as_str()).or_insert(pos);
    }

    let mut ranked: Vec<(&str, f32, usize)> = vector
        .iter()
        .map(|(term, weight)| {
            let pos = first_seen.get(term).copied().unwrap_or(usize::MAX);
            (term, weight, pos)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(max_count);

    ranked.into_iter().map(|(term, _, _)| term.to_string()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| (*w).to_string()).collect()
    }

    #[test]
    fn test_weight_is_tf_times_idf() {
        let mut vocab = VocabularyIndex::new();
        vocab.register_document(["rust", "fast"]);
        vocab.register_document(["rust", "safe"]);

        let vector = build_vector(&tokens(&["rust", "rust", "fast"]), &vocab);
        let idf_rust = vocab.idf("rust").unwrap();
        let idf_fast = vocab.idf("fast").unwrap();
        assert!((vector.get("rust").unwrap() - 2.0 * idf_rust).abs() < 1e-6);
        assert!((vector.get("fast").unwrap() - idf_fast).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_terms_are_dropped() {
        let mut vocab = VocabularyIndex::new();
        vocab.register_document(["rust"]);
        let vector = build_vector(&tokens(&["rust", "cobol"]), &vocab);
        assert_eq!(vector.len(), 1);
        assert!(vector.get("cobol").is_none());
    }

    #[test]
    fn test_build_does_not_touch_vocabulary() {
        let mut vocab = VocabularyIndex::new();
        vocab.register_document(["rust"]);
        let before = vocab.clone();
        let _ = build_vector(&tokens(&["rust", "go"]), &vocab);
        assert_eq!(vocab, before);
    }

    #[test]
    fn test_single_document_vector_is_not_empty() {
        let mut vocab = VocabularyIndex::new();
        let doc = tokens(&["optimized", "database", "queries"]);
        vocab.register_document(doc.iter().map(String::as_str));
        let vector = build_vector(&doc, &vocab);
        assert_eq!(vector.len(), 3);
        assert!(vector.norm() > 0.0);
    }

    #[test]
    fn test_keywords_by_weight_then_first_occurrence() {
        let mut vocab = VocabularyIndex::new();
        vocab.register_document(["alpha", "beta", "gamma"]);
        vocab.register_document(["alpha"]);

        // beta and gamma share a weight; gamma appears first in the text.
        let doc = tokens(&["gamma", "alpha", "beta"]);
        let vector = build_vector(&doc, &vocab);
        let keywords = extract_keywords(&vector, &doc, 10);
        assert_eq!(keywords, vec!["gamma", "beta", "alpha"]);

        let top = extract_keywords(&vector, &doc, 1);
        assert_eq!(top, vec!["gamma"]);
    }

    #[test]
    fn test_repeated_term_ranks_first() {
        let mut vocab = VocabularyIndex::new();
        vocab.register_document(["cache", "layer"]);
        let doc = tokens(&["layer", "cache", "cache"]);
        let vector = build_vector(&doc, &vocab);
        assert_eq!(extract_keywords(&vector, &doc, 5), vec!["cache", "layer"]);
    }
}
