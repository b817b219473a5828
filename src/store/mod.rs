pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::history::SnapshotStore;
use anyhow::Result;
use disk::DiskSnapshotStore;
use std::sync::Arc;

/// Opens the persistent snapshot store under the configured data path.
pub fn open_snapshot_store(config: &AppConfig) -> Result<Arc<dyn SnapshotStore>> {
    let path = config.default_data_path()?.join("history");
    Ok(Arc::new(DiskSnapshotStore::open(&path)?))
}
