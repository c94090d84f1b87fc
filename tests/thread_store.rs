use guardian_server::config::StorageConfig;
use guardian_server::execution::DatabaseResource;
use guardian_server::schemas::{HistoryEntry, PendingMutation, ThreadRecord, ThreadStatus};
use guardian_server::storage::sqlite::SqliteThreadStore;
use guardian_server::storage::{build_store, unix_now, ThreadStore};

fn sample_record(thread_id: &str) -> ThreadRecord {
    let mut record = ThreadRecord::new(thread_id.to_string(), "list employees".to_string(), unix_now());
    record.history.push(HistoryEntry::new("user", "list employees"));
    record
}

#[test]
fn sqlite_round_trips_a_full_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteThreadStore::new(dir.path().join("threads.db"));
    store.ensure_initialized().unwrap();

    let mut record = sample_record("t-1");
    record.status = ThreadStatus::ApprovalRequired;
    record.rounds_used = 2;
    record.pending = Some(PendingMutation {
        operation_type: "DELETE".to_string(),
        resource: DatabaseResource::Hr,
        tool_name: "query_hr_database".to_string(),
        sql_query: "DELETE FROM employees WHERE id = 7".to_string(),
        warning: "careful".to_string(),
        options: vec!["approve".to_string(), "reject".to_string(), "edit".to_string()],
        instructions: "pick one".to_string(),
    });
    store.create(&record).unwrap();

    let fetched = store.get("t-1").unwrap().unwrap();
    assert_eq!(fetched.status, ThreadStatus::ApprovalRequired);
    assert_eq!(fetched.query, "list employees");
    assert_eq!(fetched.rounds_used, 2);
    let pending = fetched.pending.unwrap();
    assert_eq!(pending.operation_type, "DELETE");
    assert_eq!(pending.resource, DatabaseResource::Hr);
    assert_eq!(pending.sql_query, "DELETE FROM employees WHERE id = 7");
}

#[test]
fn sqlite_save_updates_status_and_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteThreadStore::new(dir.path().join("threads.db"));

    let mut record = sample_record("t-2");
    store.create(&record).unwrap();
    let created = store.get("t-2").unwrap().unwrap();

    record.status = ThreadStatus::Completed;
    record.summary = Some("done".to_string());
    store.save(&record).unwrap();

    let fetched = store.get("t-2").unwrap().unwrap();
    assert_eq!(fetched.status, ThreadStatus::Completed);
    assert_eq!(fetched.summary.as_deref(), Some("done"));
    assert!(fetched.updated_time >= created.updated_time);
}

#[test]
fn sqlite_missing_thread_is_none() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteThreadStore::new(dir.path().join("threads.db"));
    store.ensure_initialized().unwrap();
    assert!(store.get("missing").unwrap().is_none());
}

#[test]
fn sqlite_rejects_duplicate_create_and_orphan_save() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteThreadStore::new(dir.path().join("threads.db"));

    let record = sample_record("t-3");
    store.create(&record).unwrap();
    assert!(store.create(&record).is_err());

    let orphan = sample_record("t-never-created");
    assert!(store.save(&orphan).is_err());
}

#[test]
fn store_survives_reopen_from_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threads.db");

    {
        let store = SqliteThreadStore::new(&path);
        store.create(&sample_record("t-4")).unwrap();
    }
    let reopened = SqliteThreadStore::new(&path);
    let fetched = reopened.get("t-4").unwrap().unwrap();
    assert_eq!(fetched.thread_id, "t-4");
}

#[test]
fn build_store_selects_backends_by_name() {
    let dir = tempfile::tempdir().unwrap();

    let sqlite = build_store(&StorageConfig {
        backend: "sqlite".to_string(),
        db_path: dir.path().join("threads.db").display().to_string(),
    })
    .unwrap();
    sqlite.create(&sample_record("t-5")).unwrap();
    assert!(sqlite.get("t-5").unwrap().is_some());

    let memory = build_store(&StorageConfig {
        backend: "memory".to_string(),
        db_path: String::new(),
    })
    .unwrap();
    memory.create(&sample_record("t-6")).unwrap();
    assert!(memory.get("t-6").unwrap().is_some());

    assert!(build_store(&StorageConfig {
        backend: "postgres".to_string(),
        db_path: String::new(),
    })
    .is_err());
}
