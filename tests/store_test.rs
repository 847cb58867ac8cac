//! Store Integration Tests
//!
//! Persistence of users and history in an on-disk database.

use serde_json::json;
use studybot_api::store::{HistoryKind, NewHistoryEntry, Store, StoreError};
use tempfile::TempDir;

fn create_test_store(name: &str) -> (Store, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join(format!("{}.db", name));
    let store = Store::open(&db_path).expect("Failed to create store");
    (store, temp_dir)
}

fn entry(user_id: i64, kind: HistoryKind, topic: &'static str) -> NewHistoryEntry<'static> {
    NewHistoryEntry {
        user_id,
        kind,
        topic,
        response: "response",
        metadata: None,
    }
}

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("reopen.db");

    let user_id = {
        let store = Store::open(&db_path).unwrap();
        let user = store.create_user("maya", "$argon2id$fake", 11).unwrap();
        store.add_history(entry(user.id, HistoryKind::Explain, "Rainbows")).unwrap();
        user.id
    };

    let store = Store::open(&db_path).unwrap();
    let user = store.find_user_by_username("maya").unwrap().unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.age, 11);

    let history = store.list_history(user_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].topic, "Rainbows");
}

#[test]
fn test_open_creates_parent_dirs() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("nested").join("data").join("app.db");

    Store::open(&db_path).unwrap();
    assert!(db_path.exists());
}

#[test]
fn test_username_conflict_on_disk() {
    let (store, _temp) = create_test_store("conflict");

    store.create_user("nora", "hash", 30).unwrap();
    let err = store.create_user("nora", "hash2", 31).unwrap_err();
    assert!(matches!(err, StoreError::UsernameTaken));
}

#[test]
fn test_history_order_and_metadata() {
    let (store, _temp) = create_test_store("order");
    let user = store.create_user("omar", "hash", 22).unwrap();

    store.add_history(entry(user.id, HistoryKind::Explain, "Atoms")).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    store
        .add_history(NewHistoryEntry {
            user_id: user.id,
            kind: HistoryKind::McqScore,
            topic: "Atoms",
            response: "Scored 4/5",
            metadata: Some(json!({ "score": 4, "total": 5 })),
        })
        .unwrap();

    let history = store.list_history(user.id).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].kind, HistoryKind::McqScore);
    assert_eq!(history[0].metadata, Some(json!({ "score": 4, "total": 5 })));
    assert_eq!(history[1].kind, HistoryKind::Explain);
    assert!(history[1].metadata.is_none());
}

#[test]
fn test_delete_only_by_owner() {
    let (store, _temp) = create_test_store("delete");
    let owner = store.create_user("pia", "hash", 40).unwrap();
    let other = store.create_user("quinn", "hash", 41).unwrap();

    let saved = store.add_history(entry(owner.id, HistoryKind::Mcq, "Fractions")).unwrap();

    assert!(!store.delete_history(saved.id, other.id).unwrap());
    assert_eq!(store.list_history(owner.id).unwrap().len(), 1);

    assert!(store.delete_history(saved.id, owner.id).unwrap());
    assert!(store.list_history(owner.id).unwrap().is_empty());
}
