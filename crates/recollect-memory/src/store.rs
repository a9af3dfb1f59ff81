use chrono::{DateTime, Utc};
use recollect_core::{Namespace, RecollectError, RecollectResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::vector::{build_vector, extract_keywords, SparseVector};
use crate::vocabulary::VocabularyIndex;

/// Per-namespace record id. Strictly increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryId(pub u64);

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single note stored in vector memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique within the namespace.
    pub id: MemoryId,
    /// Namespace the record belongs to.
    pub namespace: Namespace,
    /// Original note text.
    pub content: String,
    /// UTC creation time.
    pub created_at: DateTime<Utc>,
    /// TF-IDF weights as computed when the record was stored.
    pub vector: SparseVector,
    /// Most-weighted terms first.
    pub keywords: Vec<String>,
    /// Last time the record was returned by a boosted search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    /// Reference time for recency: last access if any, else creation.
    pub fn last_touched(&self) -> DateTime<Utc> {
        self.last_accessed_at
            .map_or(self.created_at, |accessed| accessed.max(self.created_at))
    }
}

/// Capacity rules applied by [`MemoryStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPolicy {
    /// Maximum number of records kept in the namespace.
    pub max_entries: usize,
    /// Evict the oldest record instead of rejecting when full.
    pub auto_cleanup: bool,
    /// Maximum number of keywords kept on the record.
    pub keyword_limit: usize,
}

/// Outcome of a successful insert, sufficient to undo it.
#[derive(Debug, Clone)]
pub struct Insertion {
    /// The newly stored record.
    pub record: MemoryRecord,
    /// Records evicted to make room, oldest first.
    pub evicted: Vec<MemoryRecord>,
}

/// Ordered record collection and vocabulary of one namespace.
///
/// Records are kept oldest-first. Every record's vector terms are registered
/// in the vocabulary exactly once for as long as the record is held.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    records: VecDeque<MemoryRecord>,
    vocabulary: VocabularyIndex,
    next_id: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store. Ids start at 1.
    pub fn new() -> Self {
        Self {
            records: VecDeque::new(),
            vocabulary: VocabularyIndex::new(),
            next_id: 1,
        }
    }

    /// Rebuild a store from persisted records.
    ///
    /// Records are ordered by id and the vocabulary is re-registered from each
    /// record's vector terms. Duplicate ids are rejected. The id sequence
    /// resumes after the larger of `next_id` and the highest record id.
    pub fn restore(
        mut records: Vec<MemoryRecord>,
        next_id: Option<MemoryId>,
    ) -> RecollectResult<Self> {
        records.sort_by_key(|r| r.id);
        let mut seen = HashSet::new();
        let mut store = Self::new();
        if let Some(MemoryId(next)) = next_id {
            store.next_id = store.next_id.max(next);
        }
        for record in records {
            if !seen.insert(record.id) {
                return Err(RecollectError::Storage(format!(
                    "duplicate memory id {} in namespace '{}'",
                    record.id, record.namespace
                )));
            }
            store.vocabulary.register_document(record.vector.terms());
            store.next_id = store.next_id.max(record.id.0 + 1);
            store.records.push_back(record);
        }
        Ok(store)
    }

    /// Store a new note built from its normalized `tokens`.
    ///
    /// When the namespace is full, either the oldest records are evicted first
    /// (`auto_cleanup`) or the insert is rejected with
    /// [`RecollectError::CapacityExceeded`] and nothing changes. The new
    /// document is registered before its vector is built, so its own terms
    /// count towards `N` and document frequency.
    pub fn insert(
        &mut self,
        namespace: &Namespace,
        content: &str,
        tokens: &[String],
        policy: InsertPolicy,
        now: DateTime<Utc>,
    ) -> RecollectResult<Insertion> {
        let max_entries = policy.max_entries.max(1);
        if self.records.len() >= max_entries && !policy.auto_cleanup {
            return Err(RecollectError::CapacityExceeded { max_entries });
        }

        let mut evicted = Vec::new();
        while self.records.len() >= max_entries {
            if let Some(oldest) = self.records.pop_front() {
                self.vocabulary.unregister_document(oldest.vector.terms());
                evicted.push(oldest);
            }
        }

        self.vocabulary
            .register_document(tokens.iter().map(String::as_str));
        let vector = build_vector(tokens, &self.vocabulary);
        let keywords = extract_keywords(&vector, tokens, policy.keyword_limit);

        let record = MemoryRecord {
            id: MemoryId(self.next_id),
            namespace: namespace.clone(),
            content: content.to_string(),
            created_at: now,
            vector,
            keywords,
            last_accessed_at: None,
        };
        self.next_id += 1;
        self.records.push_back(record.clone());

        Ok(Insertion { record, evicted })
    }

    /// Undo the most recent [`MemoryStore::insert`].
    ///
    /// # Panics
    ///
    /// Panics if `insertion` is not the latest insert on this store.
    pub fn rollback(&mut self, insertion: Insertion) {
        let latest = self.records.pop_back();
        assert_eq!(
            latest.as_ref().map(|r| r.id),
            Some(insertion.record.id),
            "rollback of an insertion that is not the latest"
        );
        self.vocabulary
            .unregister_document(insertion.record.vector.terms());
        for record in insertion.evicted.into_iter().rev() {
            self.vocabulary.register_document(record.vector.terms());
            self.records.push_front(record);
        }
    }

    /// Up to `limit` records, most recent first.
    pub fn list_recent(&self, limit: usize) -> Vec<MemoryRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    /// Remove every record and reset the vocabulary. Returns the number removed.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.records.len();
        for record in self.records.drain(..) {
            self.vocabulary.unregister_document(record.vector.terms());
        }
        debug_assert!(self.vocabulary.is_empty(), "vocabulary outlived its records");
        removed
    }

    /// Set `last_accessed_at` on the given records. Returns how many were found.
    pub fn touch(&mut self, ids: &[MemoryId], now: DateTime<Utc>) -> usize {
        let mut touched = 0;
        for record in self.records.iter_mut().filter(|r| ids.contains(&r.id)) {
            record.last_accessed_at = Some(now);
            touched += 1;
        }
        touched
    }

    /// All records, oldest first.
    pub fn all_records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.records.iter()
    }

    /// All records as one slice, oldest first.
    pub fn contiguous_records(&mut self) -> &[MemoryRecord] {
        self.records.make_contiguous()
    }

    /// Id the next insert will receive.
    pub fn next_id(&self) -> MemoryId {
        MemoryId(self.next_id)
    }

    /// The namespace vocabulary.
    pub fn vocabulary(&self) -> &VocabularyIndex {
        &self.vocabulary
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no record is held.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
