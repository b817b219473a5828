use crate::core::history::{HistorySnapshot, SnapshotStore};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;

const PARTITION: &str = "history";

/// Snapshot store backed by a fjall keyspace. Keys are
/// `{portfolio_id:010}:{YYYY-MM-DD}`, so a prefix scan yields one
/// portfolio's snapshots in date order.
pub struct DiskSnapshotStore {
    keyspace: Keyspace,
    partition: PartitionHandle,
    write_lock: Mutex<()>,
}

fn portfolio_prefix(portfolio_id: u32) -> String {
    format!("{portfolio_id:010}:")
}

fn snapshot_key(portfolio_id: u32, date: NaiveDate) -> String {
    format!("{}{}", portfolio_prefix(portfolio_id), date.format("%Y-%m-%d"))
}

impl DiskSnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create data directory: {}", path.display()))?;
        let keyspace = Config::new(path)
            .open()
            .with_context(|| format!("Failed to open snapshot store at {}", path.display()))?;
        let partition = keyspace
            .open_partition(PARTITION, PartitionCreateOptions::default())
            .context("Failed to open history partition")?;

        Ok(Self {
            keyspace,
            partition,
            write_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl SnapshotStore for DiskSnapshotStore {
    async fn find(&self, portfolio_id: u32, date: NaiveDate) -> Result<Option<HistorySnapshot>> {
        let key = snapshot_key(portfolio_id, date);
        match self.partition.get(&key)? {
            Some(value) => {
                debug!("Snapshot HIT for key: {}", key);
                let snapshot = serde_json::from_slice(&value)
                    .with_context(|| format!("Corrupt snapshot at key: {key}"))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn latest(&self, portfolio_id: u32) -> Result<Option<HistorySnapshot>> {
        Ok(self.recent(portfolio_id, 1).await?.pop())
    }

    async fn insert(&self, snapshot: &HistorySnapshot) -> Result<()> {
        let key = snapshot_key(snapshot.portfolio_id, snapshot.record_date);
        let _guard = self.write_lock.lock().await;
        if self.partition.contains_key(&key)? {
            bail!("Snapshot already exists at key: {key}");
        }

        let value = serde_json::to_vec(snapshot).context("Failed to serialize snapshot")?;
        self.partition.insert(key.as_bytes(), value)?;
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist snapshot")?;
        debug!("Snapshot PUT for key: {}", key);
        Ok(())
    }

    async fn recent(&self, portfolio_id: u32, limit: usize) -> Result<Vec<HistorySnapshot>> {
        let mut snapshots = Vec::new();
        for item in self
            .partition
            .prefix(portfolio_prefix(portfolio_id))
            .rev()
            .take(limit)
        {
            let (key, value) = item?;
            let snapshot = serde_json::from_slice(&value).with_context(|| {
                format!("Corrupt snapshot at key: {}", String::from_utf8_lossy(&key))
            })?;
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }
}
