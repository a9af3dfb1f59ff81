use std::collections::{BTreeSet, HashMap};

/// Document-frequency table for one namespace.
///
/// Tracks, for every term, how many registered documents contain it at least
/// once, along with the total number of registered documents `N`. A term whose
/// frequency drops to zero is removed outright.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabularyIndex {
    /// term -> number of documents containing it
    document_frequency: HashMap<String, usize>,
    /// Total number of registered documents.
    total_documents: usize,
}

impl VocabularyIndex {
    /// Create a new, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one document given its terms. Duplicates count once.
    ///
    /// An empty term set is a no-op and does not change `N`.
    pub fn register_document<'a, I>(&mut self, terms: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = terms.into_iter().collect();
        if distinct.is_empty() {
            return;
        }
        for term in distinct {
            *self.document_frequency.entry(term.to_string()).or_insert(0) += 1;
        }
        self.total_documents += 1;
    }

    /// Exact inverse of [`VocabularyIndex::register_document`].
    ///
    /// # Panics
    ///
    /// Panics if a term or the document itself was never registered; that can
    /// only happen when the caller's bookkeeping is broken.
    pub fn unregister_document<'a, I>(&mut self, terms: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let distinct: BTreeSet<&str> = terms.into_iter().collect();
        if distinct.is_empty() {
            return;
        }
        assert!(
            self.total_documents > 0,
            "unregistering a document from an empty vocabulary"
        );
        for term in distinct {
            match self.document_frequency.get_mut(term) {
                Some(df) if *df > 1 => *df -= 1,
                Some(_) => {
                    self.document_frequency.remove(term);
                }
                None => panic!("unregistering term '{term}' that has no document frequency"),
            }
        }
        self.total_documents -= 1;
    }

    /// Number of documents containing `term` (0 if absent).
    pub fn document_frequency(&self, term: &str) -> usize {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    /// Total number of registered documents `N`.
    pub fn total_documents(&self) -> usize {
        self.total_documents
    }

    /// Number of distinct terms.
    pub fn term_count(&self) -> usize {
        self.document_frequency.len()
    }

    /// True when no document is registered.
    pub fn is_empty(&self) -> bool {
        self.total_documents == 0 && self.document_frequency.is_empty()
    }

    /// Smoothed inverse document frequency, or `None` for unknown terms.
    ///
    /// ```text
    /// idf(t) = ln((1 + N) / (1 + df(t))) + 1
    /// ```
    pub fn idf(&self, term: &str) -> Option<f32> {
        let df = self.document_frequency(term);
        if df == 0 {
            return None;
        }
        let n = self.total_documents as f32;
        Some(((1.0 + n) / (1.0 + df as f32)).ln() + 1.0)
    }
}
