use chrono::{DateTime, Utc};
use recollect_memory::{MemoryRecord, NamespaceStats, SearchResult, StoredMemory};

const SEARCH_PREVIEW_CHARS: usize = 200;
const RECENT_PREVIEW_CHARS: usize = 150;

/// Shorten `text` to at most `max_chars` characters, marking the cut with `…`.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn line_date(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %H:%M").to_string()
}

pub fn stored(message: &str, stored: &StoredMemory) -> String {
    let mut out = message.to_string();
    if !stored.evicted.is_empty() {
        let ids: Vec<String> = stored.evicted.iter().map(ToString::to_string).collect();
        out.push_str(&format!("\nEvicted: #{}", ids.join(", #")));
    }
    out
}

pub fn search(message: &str, results: &[SearchResult]) -> String {
    let mut out = message.to_string();
    for hit in results {
        out.push_str(&format!(
            "\n• [{:.1}% match, {}] {}",
            hit.score * 100.0,
            line_date(hit.record.created_at),
            truncate(&hit.record.content, SEARCH_PREVIEW_CHARS)
        ));
    }
    out
}

pub fn recent(message: &str, records: &[MemoryRecord]) -> String {
    let mut out = message.to_string();
    for record in records {
        out.push_str(&format!(
            "\n• [{}, {} features] {}",
            line_date(record.created_at),
            record.vector.len(),
            truncate(&record.content, RECENT_PREVIEW_CHARS)
        ));
    }
    out
}

pub fn stats(message: &str, stats: &NamespaceStats) -> String {
    format!(
        "{message}\nRecords: {}\nTerms: {}\nIndexed documents: {}",
        stats.records, stats.vocabulary_terms, stats.total_documents
    )
}
