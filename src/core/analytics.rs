//! Real-time valuation of a portfolio from resolved quotes.
use crate::core::config::{Holding, Portfolio};
use crate::core::quote::QuoteResolver;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Valuation of a single holding at its current NAV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingStat {
    pub fund_code: String,
    pub fund_name: String,
    pub shares: Decimal,
    pub cost_nav: Decimal,
    pub current_nav: Decimal,
    pub value: Decimal,
    pub cost: Decimal,
    pub profit: Decimal,
    /// Percent of cost
    pub profit_rate: Decimal,
}

/// Portfolio totals over every holding that could be priced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeStats {
    pub portfolio_id: u32,
    pub portfolio_name: String,
    pub total_cost: Decimal,
    pub total_value: Decimal,
    pub total_profit: Decimal,
    pub total_profit_rate: Decimal,
    pub holdings: Vec<HoldingStat>,
    pub updated_at: NaiveDateTime,
}

/// `profit / base * 100`, or zero when the base is not positive or the rate
/// overflows.
pub fn profit_rate(profit: Decimal, base: Decimal) -> Decimal {
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    profit
        .checked_div(base)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Computes per-holding and total figures. All codes are resolved in a
/// single call; holdings without any quote are left out of both the totals
/// and the list.
pub async fn compute_realtime_stats(
    portfolio: &Portfolio,
    holdings: &[Holding],
    resolver: &dyn QuoteResolver,
    now: NaiveDateTime,
) -> RealtimeStats {
    let mut stats = RealtimeStats {
        portfolio_id: portfolio.id,
        portfolio_name: portfolio.name.clone(),
        total_cost: Decimal::ZERO,
        total_value: Decimal::ZERO,
        total_profit: Decimal::ZERO,
        total_profit_rate: Decimal::ZERO,
        holdings: Vec::new(),
        updated_at: now,
    };
    if holdings.is_empty() {
        return stats;
    }

    let codes: Vec<String> = holdings.iter().map(|h| h.fund_code.clone()).collect();
    let quotes = resolver.resolve_quotes(&codes).await;

    for holding in holdings {
        let Some(quote) = quotes.get(&holding.fund_code) else {
            debug!(fund_code = %holding.fund_code, "No quote, holding excluded from totals");
            continue;
        };

        let current_nav = quote.current_nav();
        let cost_nav = holding.effective_cost_nav();
        let value = holding.shares * current_nav;
        let cost = holding.shares * cost_nav;
        let profit = value - cost;

        stats.total_value += value;
        stats.total_cost += cost;
        stats.holdings.push(HoldingStat {
            fund_code: holding.fund_code.clone(),
            fund_name: quote
                .fund_name
                .clone()
                .or_else(|| holding.fund_name.clone())
                .unwrap_or_default(),
            shares: holding.shares,
            cost_nav,
            current_nav,
            value,
            cost,
            profit,
            profit_rate: profit_rate(profit, cost),
        });
    }

    stats.total_profit = stats.total_value - stats.total_cost;
    stats.total_profit_rate = profit_rate(stats.total_profit, stats.total_cost);
    stats
}
