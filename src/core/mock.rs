//! In-process stand-ins for the HTTP providers, shared by unit tests.

use crate::core::quote::{Quote, QuoteSource};
use crate::core::search::{FundSearchProvider, SearchCandidate};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wednesday 2024-01-03 10:00, inside the trading session.
pub(crate) fn test_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 3)
        .unwrap()
        .and_hms_opt(10, 0, 0)
        .unwrap()
}

pub(crate) fn quote_with_nav(fund_code: &str, nav: &str) -> Quote {
    let nav = Decimal::from_str(nav).unwrap();
    Quote {
        fund_code: fund_code.to_string(),
        fund_name: Some(format!("Fund {fund_code}")),
        last_nav: Some(nav),
        last_nav_date: None,
        estimated_nav: Some(nav),
        estimated_growth_rate: None,
        estimated_at: None,
        fetched_at: test_time(),
    }
}

/// Counts requests in flight, optionally across several mocks.
#[derive(Default)]
pub(crate) struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Serves configured NAVs and fails for every other code.
#[derive(Default)]
pub(crate) struct MockQuoteSource {
    navs: Mutex<HashMap<String, String>>,
    default_nav: Option<String>,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: Arc<InFlight>,
    requested: Mutex<Vec<String>>,
}

impl MockQuoteSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_nav(self, fund_code: &str, nav: &str) -> Self {
        self.set_nav(fund_code, nav);
        self
    }

    pub(crate) fn with_default_nav(mut self, nav: &str) -> Self {
        self.default_nav = Some(nav.to_string());
        self
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn with_tracker(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub(crate) fn set_nav(&self, fund_code: &str, nav: &str) {
        self.navs
            .lock()
            .unwrap()
            .insert(fund_code.to_string(), nav.to_string());
    }

    pub(crate) fn remove_nav(&self, fund_code: &str) {
        self.navs.lock().unwrap().remove(fund_code);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.in_flight.peak()
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    async fn fetch_quote(&self, fund_code: &str) -> Result<Quote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(fund_code.to_string());
        self.in_flight.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.exit();

        let nav = self
            .navs
            .lock()
            .unwrap()
            .get(fund_code)
            .cloned()
            .or_else(|| self.default_nav.clone());
        match nav {
            Some(nav) => Ok(quote_with_nav(fund_code, &nav)),
            None => Err(anyhow!("No quote for {fund_code}")),
        }
    }
}

/// Returns a fixed candidate list for every keyword.
#[derive(Default)]
pub(crate) struct MockSearchProvider {
    candidates: Vec<SearchCandidate>,
    fail: bool,
    latency: Duration,
    calls: AtomicUsize,
    in_flight: Arc<InFlight>,
}

impl MockSearchProvider {
    pub(crate) fn new(candidates: &[(&str, &str)]) -> Self {
        Self {
            candidates: candidates
                .iter()
                .map(|(code, name)| SearchCandidate {
                    code: code.to_string(),
                    name: name.to_string(),
                    fund_type: None,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn with_tracker(mut self, in_flight: Arc<InFlight>) -> Self {
        self.in_flight = in_flight;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FundSearchProvider for MockSearchProvider {
    async fn search(&self, _keyword: &str) -> Result<Vec<SearchCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.enter();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.exit();
        if self.fail {
            return Err(anyhow!("search endpoint unavailable"));
        }
        Ok(self.candidates.clone())
    }
}
