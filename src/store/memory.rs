use crate::core::history::{HistorySnapshot, SnapshotStore};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Ephemeral snapshot store, ordered by portfolio and date.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<BTreeMap<(u32, NaiveDate), HistorySnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn find(&self, portfolio_id: u32, date: NaiveDate) -> Result<Option<HistorySnapshot>> {
        Ok(self.inner.lock().await.get(&(portfolio_id, date)).cloned())
    }

    async fn latest(&self, portfolio_id: u32) -> Result<Option<HistorySnapshot>> {
        Ok(self.recent(portfolio_id, 1).await?.pop())
    }

    async fn insert(&self, snapshot: &HistorySnapshot) -> Result<()> {
        let mut snapshots = self.inner.lock().await;
        let key = (snapshot.portfolio_id, snapshot.record_date);
        if snapshots.contains_key(&key) {
            bail!(
                "Snapshot for portfolio {} on {} already exists",
                snapshot.portfolio_id,
                snapshot.record_date
            );
        }
        snapshots.insert(key, snapshot.clone());
        Ok(())
    }

    async fn recent(&self, portfolio_id: u32, limit: usize) -> Result<Vec<HistorySnapshot>> {
        let snapshots = self.inner.lock().await;
        Ok(snapshots
            .range((portfolio_id, NaiveDate::MIN)..=(portfolio_id, NaiveDate::MAX))
            .rev()
            .take(limit)
            .map(|(_, snapshot)| snapshot.clone())
            .collect())
    }
}
