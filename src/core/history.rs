//! Daily portfolio snapshots and the history built from them.

use crate::core::analytics::{compute_realtime_stats, profit_rate};
use crate::core::clock::Clock;
use crate::core::config::{Holding, Portfolio};
use crate::core::quote::QuoteResolver;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_HISTORY_DAYS: usize = 30;
pub const MAX_HISTORY_DAYS: usize = 365;

/// One persisted row per portfolio and day. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub portfolio_id: u32,
    pub record_date: NaiveDate,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub daily_profit: Decimal,
    pub daily_profit_rate: Decimal,
    pub cumulative_profit: Decimal,
    pub cumulative_profit_rate: Decimal,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub total_cost: Decimal,
    pub daily_profit: Decimal,
    pub daily_profit_rate: Decimal,
    pub cumulative_profit: Decimal,
    pub cumulative_profit_rate: Decimal,
}

impl From<HistorySnapshot> for HistoryPoint {
    fn from(snapshot: HistorySnapshot) -> Self {
        Self {
            date: snapshot.record_date,
            total_value: snapshot.total_value,
            total_cost: snapshot.total_cost,
            daily_profit: snapshot.daily_profit,
            daily_profit_rate: snapshot.daily_profit_rate,
            cumulative_profit: snapshot.cumulative_profit,
            cumulative_profit_rate: snapshot.cumulative_profit_rate,
        }
    }
}

/// Snapshot history of one portfolio, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub portfolio_id: u32,
    pub portfolio_name: String,
    pub history: Vec<HistoryPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded(HistorySnapshot),
    AlreadyRecorded(HistorySnapshot),
}

/// Persistence for daily snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn find(&self, portfolio_id: u32, date: NaiveDate) -> Result<Option<HistorySnapshot>>;

    /// Most recent snapshot of the portfolio, any date.
    async fn latest(&self, portfolio_id: u32) -> Result<Option<HistorySnapshot>>;

    /// Stores a new snapshot. Fails if one already exists for the same
    /// portfolio and date.
    async fn insert(&self, snapshot: &HistorySnapshot) -> Result<()>;

    /// Up to `limit` most recent snapshots, newest first.
    async fn recent(&self, portfolio_id: u32, limit: usize) -> Result<Vec<HistorySnapshot>>;
}

pub struct HistoryRecorder {
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
}

impl HistoryRecorder {
    pub fn new(store: Arc<dyn SnapshotStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Records today's snapshot for the portfolio unless one exists already.
    /// The existence check runs before any quote is requested.
    pub async fn record_daily(
        &self,
        portfolio: &Portfolio,
        holdings: &[Holding],
        resolver: &dyn QuoteResolver,
    ) -> Result<RecordOutcome> {
        let now = self.clock.now();
        let today = now.date();

        if let Some(existing) = self.store.find(portfolio.id, today).await? {
            debug!(portfolio_id = portfolio.id, %today, "Snapshot already recorded");
            return Ok(RecordOutcome::AlreadyRecorded(existing));
        }

        let stats = compute_realtime_stats(portfolio, holdings, resolver, now).await;
        let previous = self.store.latest(portfolio.id).await?;

        let (daily_profit, daily_profit_rate) = match previous {
            Some(prev) => {
                let profit = stats.total_value - prev.total_value;
                (profit, profit_rate(profit, prev.total_value))
            }
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        let snapshot = HistorySnapshot {
            portfolio_id: portfolio.id,
            record_date: today,
            total_value: stats.total_value,
            total_cost: stats.total_cost,
            daily_profit,
            daily_profit_rate,
            cumulative_profit: stats.total_profit,
            cumulative_profit_rate: stats.total_profit_rate,
            created_at: now,
        };
        if let Err(e) = self.store.insert(&snapshot).await {
            // A concurrent call may have written today's row after our check
            return match self.store.find(portfolio.id, today).await? {
                Some(existing) => {
                    debug!(portfolio_id = portfolio.id, %today, "Snapshot recorded concurrently");
                    Ok(RecordOutcome::AlreadyRecorded(existing))
                }
                None => Err(e),
            };
        }
        info!(
            portfolio_id = portfolio.id,
            %today,
            total_value = %snapshot.total_value,
            "Recorded daily snapshot"
        );
        Ok(RecordOutcome::Recorded(snapshot))
    }

    /// The last `days` snapshots, oldest first. `days` is clamped to 1..=365.
    pub async fn history_stats(&self, portfolio: &Portfolio, days: usize) -> Result<HistoryStats> {
        let limit = days.clamp(1, MAX_HISTORY_DAYS);
        let mut snapshots = self.store.recent(portfolio.id, limit).await?;
        snapshots.reverse();

        Ok(HistoryStats {
            portfolio_id: portfolio.id,
            portfolio_name: portfolio.name.clone(),
            history: snapshots.into_iter().map(HistoryPoint::from).collect(),
        })
    }
}
