//! Pause/drain intent must survive a process restart -- an in-memory
//! database can't exercise that, so these tests reconnect to the same
//! on-disk SQLite file a fresh `SqliteActivityStore` would open on boot.

use fulcrum::domain::ports::ActivityStore;
use fulcrum::domain::{ActivityRecord, Domain, Key};
use fulcrum::infrastructure::persistence::SqliteActivityStore;

#[tokio::test]
async fn paused_state_survives_a_reconnect_to_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("activity.db");
    let url = format!("sqlite:{}", db_path.display());
    let key = Key::new(Domain::Adapter, "cache");

    {
        let store = SqliteActivityStore::connect(&url).await.unwrap();
        let mut record = ActivityRecord::clean(key.clone());
        record.paused = true;
        record.note = Some("paused for maintenance".into());
        store.save(&record).await.unwrap();
    }

    let restarted = SqliteActivityStore::connect(&url).await.unwrap();
    let loaded = restarted.load(&key).await.unwrap().expect("record persisted across reconnect");
    assert!(loaded.paused);
    assert!(!loaded.draining);
    assert_eq!(loaded.note.as_deref(), Some("paused for maintenance"));
}

#[tokio::test]
async fn draining_and_resume_round_trip_across_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("activity.db");
    let url = format!("sqlite:{}", db_path.display());
    let key = Key::new(Domain::Service, "billing");

    {
        let store = SqliteActivityStore::connect(&url).await.unwrap();
        let mut draining = ActivityRecord::clean(key.clone());
        draining.draining = true;
        store.save(&draining).await.unwrap();
    }
    {
        let store = SqliteActivityStore::connect(&url).await.unwrap();
        let mut resumed = store.load(&key).await.unwrap().unwrap();
        assert!(resumed.draining);
        resumed.draining = false;
        store.save(&resumed).await.unwrap();
    }

    let restarted = SqliteActivityStore::connect(&url).await.unwrap();
    let loaded = restarted.load(&key).await.unwrap().unwrap();
    assert!(!loaded.draining);
}

#[tokio::test]
async fn deleting_a_record_is_also_durable_across_a_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("activity.db");
    let url = format!("sqlite:{}", db_path.display());
    let key = Key::new(Domain::Task, "reindex");

    {
        let store = SqliteActivityStore::connect(&url).await.unwrap();
        store.save(&ActivityRecord::clean(key.clone())).await.unwrap();
        store.delete(&key).await.unwrap();
    }

    let restarted = SqliteActivityStore::connect(&url).await.unwrap();
    assert!(restarted.load(&key).await.unwrap().is_none());
}
