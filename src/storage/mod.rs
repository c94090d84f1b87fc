use std::sync::Arc;

use anyhow::{bail, Result};

use crate::config::StorageConfig;
use crate::schemas::ThreadRecord;

pub mod memory;
pub mod sqlite;

/// Persistence seam for workflow threads. Callers never touch the
/// backing store directly; swapping backends is a config change.
pub trait ThreadStore: Send + Sync {
    fn ensure_initialized(&self) -> Result<()>;
    fn create(&self, record: &ThreadRecord) -> Result<()>;
    fn get(&self, thread_id: &str) -> Result<Option<ThreadRecord>>;
    fn save(&self, record: &ThreadRecord) -> Result<()>;
}

pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn ThreadStore>> {
    let backend = config.backend.trim().to_ascii_lowercase();
    let store: Arc<dyn ThreadStore> = match backend.as_str() {
        "" | "sqlite" => Arc::new(sqlite::SqliteThreadStore::new(&config.db_path)),
        "memory" => Arc::new(memory::MemoryThreadStore::new()),
        other => bail!("unsupported storage backend: {other}"),
    };
    store.ensure_initialized()?;
    Ok(store)
}

pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
