//! Fuzzy resolution of free-text fund names to fund codes.
//!
//! Names extracted from screenshots are noisy and often truncated, so a
//! keyword is sent to the search endpoint and every candidate is scored
//! against it. Feeder funds (the ones sold to retail investors) are preferred
//! over their on-exchange counterparts with near-identical names.

use crate::core::cache::TimedCache;
use crate::core::clock::Clock;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Marks a feeder/linked fund in its name.
pub const FEEDER_MARKER: &str = "联接";

const MIN_FRAGMENT_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub code: String,
    pub name: String,
    pub fund_type: Option<String>,
}

/// Best candidate accepted for a keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundMatch {
    pub fund_code: String,
    pub fund_name: String,
    pub score: f64,
}

#[async_trait]
pub trait FundSearchProvider: Send + Sync {
    async fn search(&self, keyword: &str) -> Result<Vec<SearchCandidate>>;
}

/// Trims and replaces full-width parentheses with their ASCII forms.
pub fn normalize_fragment(fragment: &str) -> String {
    fragment.trim().replace('（', "(").replace('）', ")")
}

/// Six-digit codes starting with 5 or 1 denote on-exchange traded variants.
pub fn is_exchange_traded_code(code: &str) -> bool {
    code.len() == 6
        && code.chars().all(|c| c.is_ascii_digit())
        && (code.starts_with('5') || code.starts_with('1'))
}

fn char_prefix(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Composite similarity between a normalized fragment and a candidate.
/// Lengths are counted in characters.
pub fn score_candidate(fragment: &str, candidate: &SearchCandidate) -> f64 {
    let name = normalize_fragment(&candidate.name);
    let fragment_len = fragment.chars().count();
    let name_len = name.chars().count();
    let mut score = 0.0;

    if name_len > 0 && name.contains(fragment) {
        score += fragment_len as f64 / name_len as f64 * 100.0;
    }
    if name.starts_with(&char_prefix(fragment, 4)) {
        score += 30.0;
    }
    let head = fragment_len.min(3);
    if char_prefix(fragment, head) == char_prefix(&name, head) {
        score += 20.0;
    }

    let is_feeder = name.contains(FEEDER_MARKER);
    if is_feeder {
        score += 50.0;
    }
    if is_exchange_traded_code(&candidate.code) && !is_feeder {
        score -= 30.0;
    }
    score
}

/// Picks the strictly highest score, keeping the first on ties, and accepts
/// it only above `threshold`.
pub fn select_best<T>(
    scored: impl IntoIterator<Item = (T, f64)>,
    threshold: f64,
) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for (item, score) in scored {
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((item, score));
        }
    }
    best.filter(|(_, score)| *score > threshold)
}

pub struct NameResolver {
    provider: Arc<dyn FundSearchProvider>,
    gate: Arc<Semaphore>,
    cache: TimedCache<String, FundMatch>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    threshold: f64,
}

impl NameResolver {
    pub fn new(
        provider: Arc<dyn FundSearchProvider>,
        gate: Arc<Semaphore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        threshold: f64,
    ) -> Self {
        Self {
            provider,
            gate,
            cache: TimedCache::new(),
            clock,
            ttl,
            threshold,
        }
    }

    /// Resolves a name fragment to its best-scoring fund. Fragments shorter
    /// than two characters, failed searches and weak matches yield `None`.
    pub async fn resolve_by_name(&self, fragment: &str) -> Option<FundMatch> {
        let keyword = normalize_fragment(fragment);
        if keyword.chars().count() < MIN_FRAGMENT_CHARS {
            debug!(fragment, "Fragment too short to search");
            return None;
        }

        if let Some(cached) = self
            .cache
            .get_fresh(&keyword, self.clock.now(), self.ttl)
            .await
        {
            return Some(cached);
        }

        let searched = {
            // Searches count against the same in-flight limit as quote fetches
            let _permit = match self.gate.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(keyword = %keyword, error = %e, "Fetch gate closed");
                    return None;
                }
            };
            self.provider.search(&keyword).await
        };
        let candidates = match searched {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(keyword = %keyword, "Fund search failed: {e:#}");
                return None;
            }
        };
        debug!(keyword = %keyword, count = candidates.len(), "Scoring search candidates");

        let scored = candidates.into_iter().map(|candidate| {
            let score = score_candidate(&keyword, &candidate);
            (candidate, score)
        });
        let (best, score) = select_best(scored, self.threshold)?;

        let found = FundMatch {
            fund_code: best.code,
            fund_name: best.name,
            score,
        };
        debug!(keyword = %keyword, code = %found.fund_code, score, "Accepted name match");
        self.cache
            .put(keyword, found.clone(), self.clock.now())
            .await;
        Some(found)
    }
}
