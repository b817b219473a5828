//! Quote resolution, valuation and snapshot logic

pub mod analytics;
pub mod breaker;
pub mod cache;
pub mod clock;
pub mod config;
pub mod engine;
pub mod enrich;
pub mod fetcher;
pub mod history;
pub mod log;
pub mod quote;
pub mod search;

#[cfg(test)]
pub(crate) mod mock;

// Re-export main types for cleaner imports
pub use engine::FundEngine;
pub use history::{HistoryRecorder, SnapshotStore};
pub use quote::{Quote, QuoteResolver, QuoteSource};
pub use search::FundSearchProvider;
