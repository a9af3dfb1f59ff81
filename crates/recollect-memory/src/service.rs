use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock as SyncRwLock;
use recollect_core::{ErrorKind, Namespace, OperationResult, RecollectResult};
use serde::Serialize;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::backend::{InMemoryBackend, MemoryBackend};
use crate::config::MemoryConfig;
use crate::normalizer::normalize;
use crate::similarity::{rank_with, RankOptions, SearchResult};
use crate::store::{Insertion, MemoryId, MemoryRecord, MemoryStore};
use crate::vector::{build_vector, SparseVector};

/// Summary of a successfully stored memory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMemory {
    /// Id of the new record.
    pub id: MemoryId,
    /// Number of non-zero features in its vector.
    pub vector_size: usize,
    /// Most-weighted terms first.
    pub keywords: Vec<String>,
    /// Ids of records evicted to make room, oldest first.
    pub evicted: Vec<MemoryId>,
    /// Creation time of the new record.
    pub created_at: DateTime<Utc>,
}

/// Size of one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NamespaceStats {
    /// Records held.
    pub records: usize,
    /// Distinct terms in the vocabulary.
    pub vocabulary_terms: usize,
    /// Documents registered in the vocabulary (records with at least one term).
    pub total_documents: usize,
}

#[derive(Default)]
struct NamespaceSlot {
    store: MemoryStore,
    loaded: bool,
    /// The file may lag memory; the next persist rewrites it whole.
    stale_on_disk: bool,
    /// Access stamps taken under the read lock, folded into records on the
    /// next write.
    pending_access: SyncRwLock<HashMap<MemoryId, DateTime<Utc>>>,
}

impl NamespaceSlot {
    fn fold_access(&mut self) {
        let pending = std::mem::take(self.pending_access.get_mut());
        let mut touched = 0;
        for (id, at) in pending {
            touched += self.store.touch(&[id], at);
        }
        if touched > 0 {
            self.stale_on_disk = true;
        }
    }

    fn rank_and_stamp(
        &self,
        query: &SparseVector,
        options: &RankOptions,
        stamp: bool,
        now: DateTime<Utc>,
    ) -> Vec<SearchResult> {
        let mut results = {
            let pending = self.pending_access.read();
            rank_with(query, self.store.all_records(), options, now, |record| {
                pending
                    .get(&record.id)
                    .map_or(record.last_touched(), |at| (*at).max(record.last_touched()))
            })
        };
        if stamp && !results.is_empty() {
            let mut pending = self.pending_access.write();
            for result in &mut results {
                pending.insert(result.record.id, now);
                result.record.last_accessed_at = Some(now);
            }
        }
        results
    }

    fn list_recent(&self, limit: usize) -> Vec<MemoryRecord> {
        let mut records = self.store.list_recent(limit);
        let pending = self.pending_access.read();
        for record in &mut records {
            if let Some(at) = pending.get(&record.id) {
                record.last_accessed_at = Some(*at);
            }
        }
        records
    }
}

type SlotHandle = Arc<RwLock<NamespaceSlot>>;

/// Semantic memory service: store, search, list-recent, and clear, per namespace.
///
/// Each namespace has its own async read/write lock, created lazily on first
/// use. Stores and clears hold the write lock for the whole
/// evict/register/build/insert/persist sequence, so searches observe either
/// the state before a mutation or after it. Searches only take the read lock;
/// the access times they record are kept aside and written out with the next
/// mutation (or [`VectorMemoryService::flush`]). Different namespaces never
/// contend; the registry lock is only held to look up or create a slot.
pub struct VectorMemoryService {
    namespaces: SyncRwLock<HashMap<Namespace, SlotHandle>>,
    backend: Arc<dyn MemoryBackend>,
}

impl VectorMemoryService {
    /// Create a service persisting through `backend`.
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self {
            namespaces: SyncRwLock::new(HashMap::new()),
            backend,
        }
    }

    /// Create a service that keeps memories in process memory only.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend))
    }

    fn slot(&self, namespace: &Namespace) -> SlotHandle {
        if let Some(slot) = self.namespaces.read().get(namespace) {
            return Arc::clone(slot);
        }
        let mut namespaces = self.namespaces.write();
        Arc::clone(namespaces.entry(namespace.clone()).or_default())
    }

    async fn write_loaded(
        &self,
        namespace: &Namespace,
    ) -> RecollectResult<OwnedRwLockWriteGuard<NamespaceSlot>> {
        let mut slot = self.slot(namespace).write_owned().await;
        if !slot.loaded {
            let persisted = self.backend.load(namespace).await?;
            slot.store = MemoryStore::restore(persisted.records, persisted.next_id)?;
            slot.loaded = true;
            debug!(namespace = %namespace, records = slot.store.len(), "Namespace loaded");
        }
        slot.fold_access();
        Ok(slot)
    }

    async fn read_loaded(
        &self,
        namespace: &Namespace,
    ) -> RecollectResult<OwnedRwLockReadGuard<NamespaceSlot>> {
        let slot = self.slot(namespace).read_owned().await;
        if slot.loaded {
            return Ok(slot);
        }
        drop(slot);
        Ok(self.write_loaded(namespace).await?.downgrade())
    }

    /// Rewrite the whole namespace file from memory.
    async fn rewrite_all(
        &self,
        namespace: &Namespace,
        slot: &mut NamespaceSlot,
    ) -> RecollectResult<()> {
        let next_id = slot.store.next_id();
        let result = self
            .backend
            .rewrite(namespace, slot.store.contiguous_records(), next_id)
            .await;
        slot.stale_on_disk = result.is_err();
        result
    }

    /// Store `text` as a new memory in `namespace`.
    ///
    /// Fails with [`ErrorKind::CapacityExceeded`] when the namespace is full and
    /// `auto_cleanup` is off. Text without searchable words is stored but
    /// reported with [`ErrorKind::EmptyInput`].
    pub async fn store(
        &self,
        namespace: &Namespace,
        text: &str,
        config: &MemoryConfig,
    ) -> OperationResult<StoredMemory> {
        if let Err(e) = config.validate() {
            warn!(namespace = %namespace, error = %e, "Rejected store with invalid config");
            return OperationResult::from_error(&e);
        }
        let tokens = normalize(text, config.language_mode, &config.custom_stop_words);

        let mut slot = match self.write_loaded(namespace).await {
            Ok(slot) => slot,
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to load namespace");
                return OperationResult::from_error(&e);
            }
        };

        let insertion = match slot.store.insert(
            namespace,
            text,
            &tokens,
            config.insert_policy(),
            Utc::now(),
        ) {
            Ok(insertion) => insertion,
            Err(e) => {
                warn!(namespace = %namespace, error = %e, "Memory store rejected");
                return OperationResult::from_error(&e);
            }
        };

        let appended = insertion.evicted.is_empty() && !slot.stale_on_disk;
        let persisted = if appended {
            self.backend.append(namespace, &insertion.record).await
        } else {
            self.rewrite_all(namespace, &mut slot).await
        };
        if let Err(e) = persisted {
            error!(namespace = %namespace, error = %e, "Failed to persist memory, rolling back");
            slot.store.rollback(insertion);
            if appended {
                // A failed append can leave a torn or complete line behind.
                if let Err(repair) = self.rewrite_all(namespace, &mut slot).await {
                    error!(
                        namespace = %namespace,
                        error = %repair,
                        "Failed to repair memory file, will rewrite on next store"
                    );
                }
            }
            return OperationResult::from_error(&e);
        }
        drop(slot);

        let Insertion { record, evicted } = insertion;
        let stored = StoredMemory {
            id: record.id,
            vector_size: record.vector.len(),
            keywords: record.keywords,
            evicted: evicted.iter().map(|r| r.id).collect(),
            created_at: record.created_at,
        };
        info!(
            namespace = %namespace,
            record_id = %stored.id,
            features = stored.vector_size,
            evicted = stored.evicted.len(),
            "Stored memory"
        );

        if tokens.is_empty() {
            return OperationResult::warning(
                format!(
                    "Stored memory #{} but it has no searchable words, so no search will match it.",
                    stored.id
                ),
                ErrorKind::EmptyInput,
                stored,
            );
        }

        let mut message = format!(
            "Stored memory #{} with {} features. Keywords: {}.",
            stored.id,
            stored.vector_size,
            stored.keywords.join(", ")
        );
        if !stored.evicted.is_empty() {
            message.push_str(&format!(
                " Removed {} oldest memories to stay within {} entries.",
                stored.evicted.len(),
                config.max_entries
            ));
        }
        OperationResult::success(message, stored)
    }

    /// Find memories in `namespace` similar in meaning to `query`.
    ///
    /// A read: never changes the vocabulary and never writes to the backend.
    /// With `boost_recent`, returned records get their last-access time stamped
    /// in memory.
    pub async fn search(
        &self,
        namespace: &Namespace,
        query: &str,
        config: &MemoryConfig,
    ) -> OperationResult<Vec<SearchResult>> {
        if let Err(e) = config.validate() {
            warn!(namespace = %namespace, error = %e, "Rejected search with invalid config");
            return OperationResult::from_error(&e);
        }
        let tokens = normalize(query, config.language_mode, &config.custom_stop_words);

        let slot = match self.read_loaded(namespace).await {
            Ok(slot) => slot,
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to load namespace");
                return OperationResult::from_error(&e);
            }
        };
        let query_vector = build_vector(&tokens, slot.store.vocabulary());
        let results = slot.rank_and_stamp(
            &query_vector,
            &config.rank_options(),
            config.boost_recent,
            Utc::now(),
        );
        drop(slot);
        debug!(namespace = %namespace, hits = results.len(), "Memory search finished");

        if results.is_empty() {
            return OperationResult::success(
                format!("No similar memories found for query: '{query}'. Try broader search terms."),
                results,
            );
        }
        OperationResult::success(
            format!("Found {} similar memories for '{query}'.", results.len()),
            results,
        )
    }

    /// Up to `limit` memories of `namespace`, most recent first.
    pub async fn list_recent(
        &self,
        namespace: &Namespace,
        limit: usize,
    ) -> OperationResult<Vec<MemoryRecord>> {
        let slot = match self.read_loaded(namespace).await {
            Ok(slot) => slot,
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to load namespace");
                return OperationResult::from_error(&e);
            }
        };
        let records = slot.list_recent(limit);
        drop(slot);

        if records.is_empty() {
            return OperationResult::success("No memories stored yet.", records);
        }
        OperationResult::success(format!("Recent {} memories.", records.len()), records)
    }

    /// Remove every memory of `namespace` and reset its vocabulary.
    ///
    /// Succeeds on an empty or unknown namespace. Returns the number removed.
    /// The id sequence carries on where it was.
    pub async fn clear(&self, namespace: &Namespace) -> OperationResult<usize> {
        let mut slot = match self.write_loaded(namespace).await {
            Ok(slot) => slot,
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to load namespace");
                return OperationResult::from_error(&e);
            }
        };
        if let Err(e) = self.backend.clear(namespace, slot.store.next_id()).await {
            error!(namespace = %namespace, error = %e, "Failed to clear persisted memories");
            return OperationResult::from_error(&e);
        }
        let removed = slot.store.clear_all();
        slot.stale_on_disk = false;
        drop(slot);

        info!(namespace = %namespace, removed, "Cleared memories");
        if removed == 0 {
            return OperationResult::success("No memories to clear.", 0);
        }
        OperationResult::success(format!("Cleared {removed} memories."), removed)
    }

    /// Write out access times recorded by searches since the last mutation.
    ///
    /// Returns whether anything was written.
    pub async fn flush(&self, namespace: &Namespace) -> OperationResult<bool> {
        let mut slot = match self.write_loaded(namespace).await {
            Ok(slot) => slot,
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to load namespace");
                return OperationResult::from_error(&e);
            }
        };
        if !slot.stale_on_disk {
            return OperationResult::success("Nothing to save.", false);
        }
        if let Err(e) = self.rewrite_all(namespace, &mut slot).await {
            warn!(namespace = %namespace, error = %e, "Failed to save access times");
            return OperationResult::from_error(&e);
        }
        debug!(namespace = %namespace, "Saved access times");
        OperationResult::success("Access times saved.", true)
    }

    /// Record and vocabulary counts for `namespace`; doubles as a health check.
    pub async fn stats(&self, namespace: &Namespace) -> OperationResult<NamespaceStats> {
        let slot = match self.read_loaded(namespace).await {
            Ok(slot) => slot,
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to load namespace");
                return OperationResult::from_error(&e);
            }
        };
        let stats = NamespaceStats {
            records: slot.store.len(),
            vocabulary_terms: slot.store.vocabulary().term_count(),
            total_documents: slot.store.vocabulary().total_documents(),
        };
        OperationResult::success(
            format!(
                "Vector memory is available: {} memories, {} terms.",
                stats.records, stats.vocabulary_terms
            ),
            stats,
        )
    }
}
