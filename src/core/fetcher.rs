use crate::core::breaker::CircuitBreaker;
use crate::core::quote::{FetchOutcome, QuoteSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Issues single-fund quote requests through the circuit breaker, a fixed
/// pacing delay and a concurrency gate shared with name searches.
pub struct RateLimitedFetcher {
    source: Arc<dyn QuoteSource>,
    breaker: Arc<CircuitBreaker>,
    gate: Arc<Semaphore>,
    pacing: Duration,
}

impl RateLimitedFetcher {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        breaker: Arc<CircuitBreaker>,
        gate: Arc<Semaphore>,
        pacing: Duration,
    ) -> Self {
        Self {
            source,
            breaker,
            gate,
            pacing,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn fetch(&self, fund_code: &str) -> FetchOutcome {
        if self.breaker.is_open() {
            debug!(fund_code, "Circuit open, skipping quote request");
            return FetchOutcome::BreakerOpen;
        }

        // The permit is dropped on every return path below.
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(fund_code, error = %e, "Fetch gate closed");
                return FetchOutcome::Failed;
            }
        };

        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }

        match self.source.fetch_quote(fund_code).await {
            Ok(quote) => {
                self.breaker.record_success();
                FetchOutcome::Fetched(quote)
            }
            Err(e) => {
                warn!(fund_code, "Quote fetch failed: {e:#}");
                self.breaker.record_failure();
                FetchOutcome::Failed
            }
        }
    }
}
