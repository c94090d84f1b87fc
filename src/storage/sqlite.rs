use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::schemas::ThreadRecord;
use crate::storage::{unix_now, ThreadStore};

/// Thread store backed by a single sqlite file. Connections are opened
/// per call; WAL keeps concurrent readers cheap.
pub struct SqliteThreadStore {
    db_path: PathBuf,
    initialized: AtomicBool,
    init_lock: Mutex<()>,
}

impl SqliteThreadStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            initialized: AtomicBool::new(false),
            init_lock: Mutex::new(()),
        }
    }

    fn open(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create storage dir {}", parent.display()))?;
            }
        }
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("open sqlite db {}", self.db_path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "busy_timeout", 5000).ok();
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.init_lock.lock();
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        let conn = self.open()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS threads (
                thread_id    TEXT PRIMARY KEY,
                status       TEXT NOT NULL,
                payload      TEXT NOT NULL,
                created_time REAL NOT NULL,
                updated_time REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_threads_status ON threads(status);",
        )?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }
}

impl ThreadStore for SqliteThreadStore {
    fn ensure_initialized(&self) -> Result<()> {
        self.init_schema()
    }

    fn create(&self, record: &ThreadRecord) -> Result<()> {
        self.init_schema()?;
        let conn = self.open()?;
        let payload = serde_json::to_string(record)?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO threads (thread_id, status, payload, created_time, updated_time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.thread_id,
                record.status.as_str(),
                payload,
                record.created_time,
                record.updated_time
            ],
        )?;
        if inserted == 0 {
            return Err(anyhow!("thread already exists: {}", record.thread_id));
        }
        Ok(())
    }

    fn get(&self, thread_id: &str) -> Result<Option<ThreadRecord>> {
        self.init_schema()?;
        let conn = self.open()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM threads WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(raw) => {
                let record: ThreadRecord = serde_json::from_str(&raw)
                    .with_context(|| format!("corrupt thread payload for {thread_id}"))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn save(&self, record: &ThreadRecord) -> Result<()> {
        self.init_schema()?;
        let conn = self.open()?;
        let mut updated = record.clone();
        updated.updated_time = unix_now();
        let payload = serde_json::to_string(&updated)?;
        let changed = conn.execute(
            "UPDATE threads SET status = ?2, payload = ?3, updated_time = ?4
             WHERE thread_id = ?1",
            params![
                updated.thread_id,
                updated.status.as_str(),
                payload,
                updated.updated_time
            ],
        )?;
        if changed == 0 {
            return Err(anyhow!("thread not found: {}", updated.thread_id));
        }
        Ok(())
    }
}
