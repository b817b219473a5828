//! The fund-data resolution engine.
//!
//! One `FundEngine` owns every piece of process-wide state: the quote cache,
//! the circuit breaker (inside the fetcher), the concurrency gate and the
//! search cache (inside the name resolver). Whoever wires up the application
//! creates one and shares it by reference or `Arc`.

use crate::core::breaker::{BreakerConfig, BreakerState, CircuitBreaker};
use crate::core::cache::TimedCache;
use crate::core::clock::{Clock, SystemClock, TtlPolicy};
use crate::core::config::{AppConfig, EngineConfig};
use crate::core::fetcher::RateLimitedFetcher;
use crate::core::quote::{FetchOutcome, Quote, QuoteResolver, QuoteSource};
use crate::core::search::{FundMatch, FundSearchProvider, NameResolver};
use crate::providers::eastmoney_search::EastmoneySearchProvider;
use crate::providers::fundgz::FundgzProvider;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

pub struct FundEngine {
    fetcher: RateLimitedFetcher,
    quotes: TimedCache<String, Quote>,
    names: NameResolver,
    clock: Arc<dyn Clock>,
    ttl: TtlPolicy,
    batch_size: usize,
    batch_delay: std::time::Duration,
}

impl FundEngine {
    pub fn new(
        config: &EngineConfig,
        quote_source: Arc<dyn QuoteSource>,
        search_provider: Arc<dyn FundSearchProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(
            BreakerConfig {
                failure_threshold: config.breaker_failure_threshold,
                cooldown: config.breaker_cooldown(),
            },
            clock.clone(),
        ));
        // One gate for quote fetches and name searches alike
        let gate = Arc::new(Semaphore::new(config.max_concurrent_fetches));
        let fetcher = RateLimitedFetcher::new(
            quote_source,
            breaker,
            gate.clone(),
            config.request_pacing(),
        );
        let names = NameResolver::new(
            search_provider,
            gate,
            clock.clone(),
            config.search_ttl(),
            config.match_threshold,
        );

        Self {
            fetcher,
            quotes: TimedCache::new(),
            names,
            clock,
            ttl: TtlPolicy {
                trading: config.trading_ttl(),
                non_trading: config.non_trading_ttl(),
            },
            batch_size: config.batch_size.max(1),
            batch_delay: config.batch_delay(),
        }
    }

    /// Builds an engine talking to the configured HTTP providers.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timeout = config.engine.request_timeout();
        let quote_source =
            FundgzProvider::new(config.fundgz_base_url(), timeout, clock.clone())?;
        let search_provider = EastmoneySearchProvider::new(config.search_base_url(), timeout)?;

        Ok(Self::new(
            &config.engine,
            Arc::new(quote_source),
            Arc::new(search_provider),
            clock,
        ))
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.fetcher.breaker().state()
    }

    /// Returns the cached quote only if it is still fresh.
    pub async fn cached_quote(&self, fund_code: &str) -> Option<Quote> {
        let now = self.clock.now();
        self.quotes
            .get_fresh(&fund_code.to_string(), now, self.ttl.ttl(&now))
            .await
    }

    /// Fresh cache entry, else a new fetch, else the last known quote.
    pub async fn get_or_fetch(&self, fund_code: &str) -> Option<Quote> {
        if let Some(quote) = self.cached_quote(fund_code).await {
            return Some(quote);
        }
        self.refresh(fund_code).await
    }

    /// Fetches and stores a quote; on failure falls back to whatever is
    /// cached, however old. A failed fetch never evicts.
    async fn refresh(&self, fund_code: &str) -> Option<Quote> {
        match self.fetcher.fetch(fund_code).await {
            FetchOutcome::Fetched(quote) => {
                self.quotes
                    .put(fund_code.to_string(), quote.clone(), self.clock.now())
                    .await;
                Some(quote)
            }
            outcome => {
                let stale = self
                    .quotes
                    .get_entry(&fund_code.to_string())
                    .await
                    .map(|entry| entry.value);
                debug!(
                    fund_code,
                    ?outcome,
                    stale = stale.is_some(),
                    "No fresh quote, serving last known"
                );
                stale
            }
        }
    }

    /// Resolves a set of codes in sequential groups of `batch_size`. Cache
    /// hits are served directly, misses in a group are fetched concurrently,
    /// and groups are separated by the inter-group delay. Codes that never
    /// resolve are left out of the result.
    pub async fn resolve_many<S: AsRef<str>>(&self, codes: &[S]) -> HashMap<String, Quote> {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = codes
            .iter()
            .map(AsRef::as_ref)
            .filter(|code| seen.insert(*code))
            .collect();

        let mut results = HashMap::with_capacity(unique.len());
        let group_count = unique.len().div_ceil(self.batch_size);

        for (index, group) in unique.chunks(self.batch_size).enumerate() {
            let mut misses = Vec::new();
            for code in group {
                match self.cached_quote(code).await {
                    Some(quote) => {
                        results.insert(code.to_string(), quote);
                    }
                    None => misses.push(*code),
                }
            }

            debug!(
                group = index + 1,
                of = group_count,
                hits = group.len() - misses.len(),
                misses = misses.len(),
                "Resolving quote group"
            );

            let fetched = join_all(
                misses
                    .iter()
                    .map(|code| async move { (*code, self.refresh(code).await) }),
            )
            .await;
            for (code, quote) in fetched {
                if let Some(quote) = quote {
                    results.insert(code.to_string(), quote);
                }
            }

            if index + 1 < group_count && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        results
    }

    pub async fn resolve_by_name(&self, fragment: &str) -> Option<FundMatch> {
        self.names.resolve_by_name(fragment).await
    }

    pub async fn clear_cache(&self) {
        self.quotes.clear().await;
        info!("Quote cache cleared");
    }
}

#[async_trait]
impl QuoteResolver for FundEngine {
    async fn resolve_quotes(&self, codes: &[String]) -> HashMap<String, Quote> {
        self.resolve_many(codes).await
    }
}
