//! Fund quote types and the quote-source abstraction

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Last known valuation of one fund. A fresh fetch replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub fund_code: String,
    pub fund_name: Option<String>,
    /// Last settled NAV
    pub last_nav: Option<Decimal>,
    pub last_nav_date: Option<NaiveDate>,
    /// Intraday estimate published before settlement
    pub estimated_nav: Option<Decimal>,
    /// Estimated growth in percent
    pub estimated_growth_rate: Option<Decimal>,
    pub estimated_at: Option<NaiveDateTime>,
    pub fetched_at: NaiveDateTime,
}

impl Quote {
    /// Estimated NAV when published and non-zero, else the settled NAV, else zero.
    pub fn current_nav(&self) -> Decimal {
        self.estimated_nav
            .filter(|nav| !nav.is_zero())
            .or(self.last_nav)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Result of a single guarded fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched(Quote),
    /// Network error, timeout, bad status or undecodable payload.
    Failed,
    /// The circuit breaker short-circuited the call; nothing was sent.
    BreakerOpen,
}

impl FetchOutcome {
    pub fn into_quote(self) -> Option<Quote> {
        match self {
            FetchOutcome::Fetched(quote) => Some(quote),
            FetchOutcome::Failed | FetchOutcome::BreakerOpen => None,
        }
    }
}

/// One unguarded quote request for one fund code.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, fund_code: &str) -> Result<Quote>;
}

/// Maps fund codes to their best available quote. Codes with no quote at all
/// are absent from the result.
#[async_trait]
pub trait QuoteResolver: Send + Sync {
    async fn resolve_quotes(&self, codes: &[String]) -> HashMap<String, Quote>;
}
