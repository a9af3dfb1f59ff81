use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::store::MemoryRecord;
use crate::vector::SparseVector;

/// Cosine similarity between two sparse vectors, in `[0, 1]`.
///
/// Returns 0 when either vector is empty.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let dot: f32 = small
        .iter()
        .filter_map(|(term, w)| large.get(term).map(|v| w * v))
        .sum();
    let na = a.norm();
    let nb = b.norm();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        (dot / (na * nb)).clamp(0.0, 1.0)
    }
}

/// Age-based boost applied to similarity scores.
///
/// A fresh record has its score raised to the power `1 - weight`; the exponent
/// drifts back to 1 with a half-life of `half_life`, so the boost shrinks as a
/// record ages, never lifts a score above 1, and leaves a zero score at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecencyBoost {
    /// Maximum exponent reduction, in `[0, 1)`.
    pub weight: f32,
    /// Age at which half of the boost remains.
    pub half_life: Duration,
}

impl Default for RecencyBoost {
    fn default() -> Self {
        Self {
            weight: 0.1,
            half_life: Duration::days(7),
        }
    }
}

impl RecencyBoost {
    /// Boosted score for a record of the given age. Negative ages count as zero.
    pub fn apply(&self, score: f32, age: Duration) -> f32 {
        let age_secs = age.num_seconds().max(0) as f64;
        let half_life_secs = self.half_life.num_seconds().max(1) as f64;
        let decay = 0.5f64.powf(age_secs / half_life_secs) as f32;
        let exponent = 1.0 - self.weight.clamp(0.0, 0.99) * decay;
        score.clamp(0.0, 1.0).powf(exponent).clamp(0.0, 1.0)
    }
}

/// Parameters for [`rank`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankOptions {
    /// Minimum (boosted) score to be returned.
    pub threshold: f32,
    /// Maximum number of results.
    pub limit: usize,
    /// Recency boost, if enabled.
    pub boost: Option<RecencyBoost>,
}

/// A stored record paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The matching record.
    pub record: MemoryRecord,
    /// Similarity after any recency boost, in `[0, 1]`.
    pub score: f32,
}

/// Score every candidate against `query` and return the best matches.
///
/// Scores strictly below `options.threshold` are dropped. Results are sorted by
/// descending score; equal scores put the most recently created record first.
pub fn rank<'a, I>(
    query: &SparseVector,
    candidates: I,
    options: &RankOptions,
    now: DateTime<Utc>,
) -> Vec<SearchResult>
where
    I: IntoIterator<Item = &'a MemoryRecord>,
{
    rank_with(query, candidates, options, now, MemoryRecord::last_touched)
}

/// [`rank`] with the recency age measured from `last_touched(record)` instead
/// of the record's own timestamps.
pub fn rank_with<'a, I, F>(
    query: &SparseVector,
    candidates: I,
    options: &RankOptions,
    now: DateTime<Utc>,
    last_touched: F,
) -> Vec<SearchResult>
where
    I: IntoIterator<Item = &'a MemoryRecord>,
    F: Fn(&MemoryRecord) -> DateTime<Utc>,
{
    let mut scored: Vec<(&MemoryRecord, f32)> = candidates
        .into_iter()
        .map(|record| {
            let mut score = cosine_similarity(query, &record.vector);
            if let Some(boost) = &options.boost {
                score = boost.apply(score, now - last_touched(record));
            }
            (record, score)
        })
        .filter(|(_, score)| *score >= options.threshold)
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(b.0.id.cmp(&a.0.id)));
    scored.truncate(options.limit);

    scored
        .into_iter()
        .map(|(record, score)| SearchResult {
            record: record.clone(),
            score,
        })
        .collect()
}
