use recollect_core::{RecollectError, RecollectResult};
use serde::{Deserialize, Serialize};

use crate::normalizer::{CustomStopWords, LanguageMode};
use crate::similarity::{RankOptions, RecencyBoost};
use crate::store::InsertPolicy;

/// Per-namespace memory configuration, passed on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum number of memories kept in the namespace.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Minimum similarity, in `[0, 1]`, for a search hit.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
    /// Maximum number of search hits.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    /// Evict the oldest memory when full instead of rejecting the store.
    #[serde(default = "default_true")]
    pub auto_cleanup: bool,
    /// Favour recently stored or recently retrieved memories in search.
    #[serde(default = "default_true")]
    pub boost_recent: bool,
    /// How stop words are chosen.
    #[serde(default)]
    pub language_mode: LanguageMode,
    /// Extra stop words per language.
    #[serde(default)]
    pub custom_stop_words: CustomStopWords,
    /// Maximum number of keywords kept per memory.
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: usize,
}

fn default_max_entries() -> usize {
    1000
}

fn default_similarity_threshold() -> f32 {
    0.1
}

fn default_search_limit() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_keyword_limit() -> usize {
    10
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            similarity_threshold: default_similarity_threshold(),
            search_limit: default_search_limit(),
            auto_cleanup: true,
            boost_recent: true,
            language_mode: LanguageMode::default(),
            custom_stop_words: CustomStopWords::default(),
            keyword_limit: default_keyword_limit(),
        }
    }
}

impl MemoryConfig {
    /// Check every option is in range.
    pub fn validate(&self) -> RecollectResult<()> {
        let mut errors = Vec::new();
        if self.max_entries < 1 {
            errors.push("max_entries must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            errors.push(format!(
                "similarity_threshold must be between 0.0 and 1.0, got {}",
                self.similarity_threshold
            ));
        }
        if self.search_limit < 1 {
            errors.push("search_limit must be at least 1".to_string());
        }
        if self.keyword_limit < 1 {
            errors.push("keyword_limit must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(RecollectError::Config(errors.join("; ")))
        }
    }

    pub(crate) fn insert_policy(&self) -> InsertPolicy {
        InsertPolicy {
            max_entries: self.max_entries,
            auto_cleanup: self.auto_cleanup,
            keyword_limit: self.keyword_limit,
        }
    }

    pub(crate) fn rank_options(&self) -> RankOptions {
        RankOptions {
            threshold: self.similarity_threshold,
            limit: self.search_limit,
            boost: self.boost_recent.then(RecencyBoost::default),
        }
    }
}
