//! TF-IDF semantic memory, partitioned by namespace.
//!
//! Stores short notes per namespace ("preset"), indexes them as sparse
//! TF-IDF vectors, and answers similarity and recency queries while keeping
//! each namespace within a configured capacity.
//!
//! # Main types
//!
//! - [`VectorMemoryService`]: Store, search, list-recent, and clear, with per-namespace locking.
//! - [`MemoryConfig`]: Per-call options: capacity, threshold, language mode, stop words.
//! - [`MemoryStore`]: Ordered records plus vocabulary for one namespace; handles eviction.
//! - [`VocabularyIndex`]: Document-frequency table used to compute IDF.
//! - [`SparseVector`]: Term -> weight mapping built by [`build_vector`].
//! - [`MemoryBackend`]: Durable backing; [`JsonlBackend`] persists one JSONL file per namespace.

/// Durable backing for namespace records.
pub mod backend;
/// Per-namespace configuration.
pub mod config;
/// Tokenization, stop words, and language detection.
pub mod normalizer;
/// Orchestration of the public operations.
pub mod service;
/// Cosine similarity, recency boost, and ranking.
pub mod similarity;
/// Record collection with capacity and eviction.
pub mod store;
mod stopwords;
/// TF-IDF vectors and keyword extraction.
pub mod vector;
/// Document-frequency bookkeeping.
pub mod vocabulary;

pub use backend::{InMemoryBackend, JsonlBackend, MemoryBackend, PersistedNamespace};
pub use config::MemoryConfig;
pub use normalizer::{normalize, tokenize, CustomStopWords, Language, LanguageMode};
pub use service::{NamespaceStats, StoredMemory, VectorMemoryService};
pub use similarity::{
    cosine_similarity, rank, rank_with, RankOptions, RecencyBoost, SearchResult,
};
pub use store::{InsertPolicy, Insertion, MemoryId, MemoryRecord, MemoryStore};
pub use vector::{build_vector, extract_keywords, SparseVector};
pub use vocabulary::VocabularyIndex;
