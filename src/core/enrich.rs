//! Completion of holding records extracted from account screenshots.
//!
//! Extraction yields partial records: a code or a name fragment, an amount
//! and sometimes a share count. Each record is checked for plausibility and
//! completed from the quote provider or the fuzzy name search.

use crate::core::engine::FundEngine;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    #[serde(default)]
    pub fund_code: Option<String>,
    #[serde(default)]
    pub fund_name: Option<String>,
    pub amount: Decimal,
    #[serde(default)]
    pub shares: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub fund_code: String,
    pub fund_name: String,
    pub amount: Decimal,
    pub shares: Option<Decimal>,
}

fn is_fund_code(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

/// Rejects records that cannot describe a real holding: malformed codes,
/// non-positive amounts or shares, and implied NAVs outside [0.1, 100].
pub fn validate_candidate(record: &CandidateRecord) -> bool {
    if record.fund_code.as_deref().is_some_and(|code| !is_fund_code(code)) {
        return false;
    }
    let has_name = record
        .fund_name
        .as_deref()
        .is_some_and(|name| !name.trim().is_empty());
    if record.fund_code.is_none() && !has_name {
        return false;
    }
    if record.amount <= Decimal::ZERO {
        return false;
    }
    match record.shares {
        Some(shares) if shares <= Decimal::ZERO => false,
        Some(shares) => record
            .amount
            .checked_div(shares)
            .is_some_and(|nav| nav >= Decimal::new(1, 1) && nav <= Decimal::ONE_HUNDRED),
        None => true,
    }
}

/// Keeps the first record for every code.
pub fn dedupe(records: Vec<EnrichedRecord>) -> Vec<EnrichedRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.fund_code.clone()))
        .collect()
}

/// Validates, completes and dedupes candidate records. Records whose code
/// cannot be determined are dropped.
pub async fn enrich_candidates(
    engine: &FundEngine,
    candidates: Vec<CandidateRecord>,
) -> Vec<EnrichedRecord> {
    let mut enriched = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if !validate_candidate(&candidate) {
            debug!(?candidate, "Discarding implausible record");
            continue;
        }

        let (fund_code, matched_name) = match (&candidate.fund_code, &candidate.fund_name) {
            (Some(code), _) => (code.clone(), None),
            (None, Some(name)) => match engine.resolve_by_name(name).await {
                Some(found) => (found.fund_code, Some(found.fund_name)),
                None => {
                    debug!(fund_name = %name, "No fund matches name, dropping record");
                    continue;
                }
            },
            (None, None) => continue,
        };

        let quote = engine.get_or_fetch(&fund_code).await;
        let fund_name = matched_name
            .or_else(|| quote.as_ref().and_then(|q| q.fund_name.clone()))
            .or(candidate.fund_name)
            .unwrap_or_default();
        let shares = candidate.shares.or_else(|| {
            let nav = quote.as_ref()?.current_nav();
            if nav <= Decimal::ZERO {
                return None;
            }
            candidate.amount.checked_div(nav).map(|shares| shares.round_dp(2))
        });

        enriched.push(EnrichedRecord {
            fund_code,
            fund_name,
            amount: candidate.amount,
            shares,
        });
    }

    dedupe(enriched)
}
