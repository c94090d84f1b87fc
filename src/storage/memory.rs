use anyhow::{anyhow, Result};
use dashmap::DashMap;

use crate::schemas::ThreadRecord;
use crate::storage::{unix_now, ThreadStore};

/// In-process store for tests and ephemeral deployments. State is lost
/// on restart.
#[derive(Default)]
pub struct MemoryThreadStore {
    threads: DashMap<String, ThreadRecord>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ThreadStore for MemoryThreadStore {
    fn ensure_initialized(&self) -> Result<()> {
        Ok(())
    }

    fn create(&self, record: &ThreadRecord) -> Result<()> {
        if self.threads.contains_key(&record.thread_id) {
            return Err(anyhow!("thread already exists: {}", record.thread_id));
        }
        self.threads.insert(record.thread_id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, thread_id: &str) -> Result<Option<ThreadRecord>> {
        Ok(self.threads.get(thread_id).map(|entry| entry.clone()))
    }

    fn save(&self, record: &ThreadRecord) -> Result<()> {
        let mut updated = record.clone();
        updated.updated_time = unix_now();
        match self.threads.get_mut(&record.thread_id) {
            Some(mut entry) => {
                *entry = updated;
                Ok(())
            }
            None => Err(anyhow!("thread not found: {}", record.thread_id)),
        }
    }
}
