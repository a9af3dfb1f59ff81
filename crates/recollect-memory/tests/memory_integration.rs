#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the recollect-memory crate.
//!
//! Covers self-retrieval, eviction and capacity rejection, clear, stop-word
//! handling across language modes, the multi-store ranking scenario, JSONL
//! persistence, namespace isolation, and concurrent access.

use std::collections::HashSet;
use std::sync::Arc;

use tempfile::TempDir;

use recollect_core::{ErrorKind, Namespace};
use recollect_memory::{
    cosine_similarity, CustomStopWords, JsonlBackend, Language, LanguageMode, MemoryBackend,
    MemoryConfig, VectorMemoryService,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn config(max_entries: usize, auto_cleanup: bool) -> MemoryConfig {
    MemoryConfig {
        max_entries,
        auto_cleanup,
        similarity_threshold: 0.1,
        search_limit: 5,
        ..MemoryConfig::default()
    }
}

async fn contents(service: &VectorMemoryService, ns: &Namespace) -> Vec<String> {
    service
        .list_recent(ns, usize::MAX)
        .await
        .payload
        .unwrap()
        .into_iter()
        .map(|r| r.content)
        .collect()
}

async fn open_jsonl(dir: &std::path::Path) -> VectorMemoryService {
    let backend = Arc::new(JsonlBackend::new(dir).await.unwrap());
    VectorMemoryService::new(backend as Arc<dyn MemoryBackend>)
}

// ---------------------------------------------------------------------------
// 1. A stored text is its own best match
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stored_text_is_top_match_for_itself() {
    let service = VectorMemoryService::in_memory();
    let ns = Namespace::new("self-match");
    let cfg = config(100, true);

    let texts = [
        "optimized database queries using indexes",
        "the borrow checker rejects dangling references",
        "кэширование ответов ускорило сервис",
        "rust memory",
        "deployed the new release to staging on friday",
    ];

    for text in texts {
        let stored = service.store(&ns, text, &cfg).await.payload.unwrap();
        let hits = service.search(&ns, text, &cfg).await.payload.unwrap();
        assert!(!hits.is_empty(), "no hits for '{text}'");
        assert_eq!(hits[0].record.id, stored.id, "'{text}' should rank itself first");
        assert!(
            hits[0].score >= 0.99,
            "self similarity for '{text}' was {}",
            hits[0].score
        );
    }
}

// ---------------------------------------------------------------------------
// 2. Auto-cleanup evicts the oldest record
// ---------------------------------------------------------------------------

#[tokio::test]
async fn auto_cleanup_evicts_oldest() {
    let service = VectorMemoryService::in_memory();
    let ns = Namespace::new("evict");
    let cfg = config(3, true);

    let mut ids = Vec::new();
    for text in ["first alpha", "second beta", "third gamma", "fourth delta"] {
        let result = service.store(&ns, text, &cfg).await;
        assert!(result.success);
        ids.push(result.payload.unwrap());
    }

    assert_eq!(ids[3].evicted, vec![ids[0].id]);
    let stats = service.stats(&ns).await.payload.unwrap();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.total_documents, 3);

    let remaining = contents(&service, &ns).await;
    assert_eq!(remaining, vec!["fourth delta", "third gamma", "second beta"]);

    let hits = service.search(&ns, "alpha", &cfg).await.payload.unwrap();
    assert!(hits.is_empty(), "evicted memory must not be found");
}

// ---------------------------------------------------------------------------
// 3. Without auto-cleanup a full namespace rejects stores
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_namespace_rejects_without_cleanup() {
    let service = VectorMemoryService::in_memory();
    let ns = Namespace::new("full");
    let cfg = config(2, false);

    assert!(service.store(&ns, "first note", &cfg).await.success);
    assert!(service.store(&ns, "second note", &cfg).await.success);
    let before = service.stats(&ns).await.payload.unwrap();

    let result = service.store(&ns, "third note", &cfg).await;
    assert!(!result.success);
    assert_eq!(result.kind, Some(ErrorKind::CapacityExceeded));
    assert_eq!(service.stats(&ns).await.payload.unwrap(), before);
    assert_eq!(contents(&service, &ns).await, vec!["second note", "first note"]);
}

// ---------------------------------------------------------------------------
// 4. Clear resets records and vocabulary
// ---------------------------------------------------------------------------

#[tokio::test]
async fn clear_resets_namespace() {
    let service = VectorMemoryService::in_memory();
    let ns = Namespace::new("clear");
    let cfg = config(10, true);

    service.store(&ns, "rust ownership model", &cfg).await;
    service.store(&ns, "python garbage collector", &cfg).await;

    let cleared = service.clear(&ns).await;
    assert!(cleared.success);
    assert_eq!(cleared.payload, Some(2));

    let hits = service.search(&ns, "rust ownership", &cfg).await;
    assert!(hits.success);
    assert!(hits.payload.unwrap().is_empty());

    let stats = service.stats(&ns).await.payload.unwrap();
    assert_eq!(stats.records, 0);
    assert_eq!(stats.total_documents, 0);
    assert_eq!(stats.vocabulary_terms, 0);

    // Clearing again is a successful no-op.
    let again = service.clear(&ns).await;
    assert!(again.success);
    assert_eq!(again.payload, Some(0));
}

// ---------------------------------------------------------------------------
// 5. Disjoint vocabularies have zero similarity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disjoint_memories_score_zero() {
    let service = VectorMemoryService::in_memory();
    let ns = Namespace::new("disjoint");
    let cfg = config(10, true);

    service.store(&ns, "compiler borrow checker", &cfg).await;
    service.store(&ns, "pasta dinner recipe", &cfg).await;

    let records = service.list_recent(&ns, 2).await.payload.unwrap();
    assert_eq!(cosine_similarity(&records[0].vector, &records[1].vector), 0.0);
}

// ---------------------------------------------------------------------------
// 6. Stop words never become keywords
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_words_never_in_keywords() {
    let english_stop = ["the", "is", "in", "and", "it", "was", "of"];
    let russian_stop = ["это", "была", "очень", "она", "и", "на"];

    let cases: Vec<(LanguageMode, &str, Vec<&str>)> = vec![
        (
            LanguageMode::Auto,
            "the cache is in the database and it was fast",
            english_stop.to_vec(),
        ),
        (
            LanguageMode::Auto,
            "это была очень хорошая база и она на сервере",
            russian_stop.to_vec(),
        ),
        (
            LanguageMode::Forced(Language::English),
            "it was the end of the migration",
            english_stop.to_vec(),
        ),
        (
            LanguageMode::Forced(Language::Russian),
            "это была миграция базы и она прошла",
            russian_stop.to_vec(),
        ),
        (
            LanguageMode::Multilingual,
            "the кэш и the database это fast",
            english_stop.iter().chain(russian_stop.iter()).copied().collect(),
        ),
    ];

    for (mode, text, stop_words) in cases {
        let service = VectorMemoryService::in_memory();
        let ns = Namespace::new("stop-words");
        let cfg = MemoryConfig {
            language_mode: mode,
            ..config(10, true)
        };
        let stored = service.store(&ns, text, &cfg).await.payload.unwrap();
        assert!(!stored.keywords.is_empty(), "{mode:?}: no keywords for '{text}'");
        for keyword in &stored.keywords {
            assert!(
                !stop_words.contains(&keyword.as_str()),
                "{mode:?}: stop word '{keyword}' kept as keyword of '{text}'"
            );
        }
    }
}

#[tokio::test]
async fn custom_stop_words_never_in_keywords() {
    let service = VectorMemoryService::in_memory();
    let ns = Namespace::new("custom");
    let cfg = MemoryConfig {
        custom_stop_words: CustomStopWords::new()
            .with_csv(Language::English, "agent, memory")
            .with_csv(Language::Russian, "агент"),
        ..config(10, true)
    };

    let en = service
        .store(&ns, "agent stored a memory about deployments", &cfg)
        .await
        .payload
        .unwrap();
    assert_eq!(en.keywords, vec!["stored", "deployments"]);

    let ru = service
        .store(&ns, "агент это запомнил", &cfg)
        .await
        .payload
        .unwrap();
    assert_eq!(ru.keywords, vec!["запомнил"]);
}

// ---------------------------------------------------------------------------
// 7. Capacity plus ranking scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn agent_scenario_ranks_related_memories() {
    let service = VectorMemoryService::in_memory();
    let ns = Namespace::new("agent-1");
    let cfg = config(3, true);

    for text in [
        "optimized database queries using indexes",
        "improved SQL index performance",
        "cooked pasta for dinner",
        "added caching layer to reduce database load",
    ] {
        assert!(service.store(&ns, text, &cfg).await.success);
    }

    let remaining = contents(&service, &ns).await;
    assert_eq!(remaining.len(), 3);
    assert!(!remaining.contains(&"optimized database queries using indexes".to_string()));

    let result = service.search(&ns, "database performance", &cfg).await;
    assert!(result.success);
    let hits = result.payload.unwrap();
    let found: Vec<&str> = hits.iter().map(|h| h.record.content.as_str()).collect();
    assert_eq!(
        found,
        vec![
            "improved SQL index performance",
            "added caching layer to reduce database load",
        ]
    );
    assert!(hits.iter().all(|h| h.score >= cfg.similarity_threshold));
    assert!(hits[0].score >= hits[1].score);
}

// ---------------------------------------------------------------------------
// 8. Namespaces are isolated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn namespaces_are_isolated() {
    let service = VectorMemoryService::in_memory();
    let a = Namespace::new("preset-a");
    let b = Namespace::new("preset-b");
    let cfg = config(1, false);

    assert!(service.store(&a, "rust async runtime", &cfg).await.success);
    // b has its own capacity.
    assert!(service.store(&b, "rust borrow checker", &cfg).await.success);

    let hits = service.search(&b, "async runtime", &cfg).await.payload.unwrap();
    assert!(hits.is_empty(), "search must not cross namespaces");

    service.clear(&a).await;
    assert_eq!(service.stats(&a).await.payload.unwrap().records, 0);
    assert_eq!(service.stats(&b).await.payload.unwrap().records, 1);
}

// ---------------------------------------------------------------------------
// 9. JSONL persistence survives a restart
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jsonl_backend_restores_records_and_vocabulary() {
    let tmp = TempDir::new().unwrap();
    let ns = Namespace::new("persisted");
    let cfg = config(3, true);

    let (stats_before, first_hits) = {
        let backend = Arc::new(JsonlBackend::new(tmp.path()).await.unwrap());
        let service = VectorMemoryService::new(backend as Arc<dyn MemoryBackend>);
        for text in [
            "optimized database queries using indexes",
            "improved SQL index performance",
            "cooked pasta for dinner",
            "added caching layer to reduce database load",
        ] {
            service.store(&ns, text, &cfg).await;
        }
        let hits = service
            .search(&ns, "database performance", &config(3, true))
            .await
            .payload
            .unwrap();
        (service.stats(&ns).await.payload.unwrap(), hits)
    };

    let backend = Arc::new(JsonlBackend::new(tmp.path()).await.unwrap());
    let service = VectorMemoryService::new(backend as Arc<dyn MemoryBackend>);
    assert_eq!(service.stats(&ns).await.payload.unwrap(), stats_before);

    let hits = service
        .search(&ns, "database performance", &cfg)
        .await
        .payload
        .unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.record.id).collect();
    let first_ids: Vec<_> = first_hits.iter().map(|h| h.record.id).collect();
    assert_eq!(ids, first_ids);

    // Ids keep increasing after reload.
    let next = service.store(&ns, "new note", &cfg).await.payload.unwrap();
    assert!(first_ids.iter().all(|id| *id < next.id));

    // Clear removes the file contents too.
    service.clear(&ns).await;
    let backend = Arc::new(JsonlBackend::new(tmp.path()).await.unwrap());
    let reloaded = VectorMemoryService::new(backend as Arc<dyn MemoryBackend>);
    assert_eq!(reloaded.stats(&ns).await.payload.unwrap().records, 0);
}

#[tokio::test]
async fn ids_are_not_reused_after_clear_and_restart() {
    let tmp = TempDir::new().unwrap();
    let ns = Namespace::new("ids");
    let cfg = config(10, true);

    let service = open_jsonl(tmp.path()).await;
    service.store(&ns, "first note", &cfg).await;
    service.store(&ns, "second note", &cfg).await;
    service.clear(&ns).await;
    let third = service.store(&ns, "third note", &cfg).await.payload.unwrap();
    assert_eq!(third.id.0, 3);
    service.clear(&ns).await;
    drop(service);

    let restarted = open_jsonl(tmp.path()).await;
    let fourth = restarted.store(&ns, "fourth note", &cfg).await.payload.unwrap();
    assert_eq!(fourth.id.0, 4);
}

// ---------------------------------------------------------------------------
// 10. Concurrent access
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_stores_keep_invariants() {
    let service = Arc::new(VectorMemoryService::in_memory());
    let cfg = config(10, true);
    let mut handles = Vec::new();

    for ns_index in 0..4 {
        for i in 0..25 {
            let service = Arc::clone(&service);
            let cfg = cfg.clone();
            handles.push(tokio::spawn(async move {
                let ns = Namespace::new(format!("ns-{ns_index}"));
                let text = format!("shared topic unique{}", word(i));
                let stored = service.store(&ns, &text, &cfg).await;
                let searched = service.search(&ns, "shared topic", &cfg).await;
                (stored.success, searched.success)
            }));
        }
    }

    for handle in handles {
        let (stored, searched) = handle.await.unwrap();
        assert!(stored && searched);
    }

    for ns_index in 0..4 {
        let ns = Namespace::new(format!("ns-{ns_index}"));
        let stats = service.stats(&ns).await.payload.unwrap();
        assert_eq!(stats.records, 10);
        assert_eq!(stats.total_documents, 10);
        // "shared", "topic", and one unique word per record.
        assert_eq!(stats.vocabulary_terms, 12);

        let records = service.list_recent(&ns, 100).await.payload.unwrap();
        let ids: HashSet<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids.len(), 10);
        assert!(records.windows(2).all(|w| w[0].id > w[1].id));
    }
}

/// Letters-only suffix so every generated note has a distinct token.
fn word(i: usize) -> String {
    let letters = ['a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j'];
    i.to_string()
        .chars()
        .filter_map(|d| d.to_digit(10))
        .map(|d| letters[d as usize])
        .collect()
}
