//! File-backed session persistence

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use serde_json::json;
use soundwave::session::{SESSION_KEY, SESSION_VERSION};
use soundwave::{FileStorage, Session, SessionStorage, SessionStore};
use std::sync::Arc;

fn store_at(path: &std::path::Path) -> SessionStore {
    SessionStore::new(Arc::new(FileStorage::open(path).unwrap()))
}

#[test]
fn test_session_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("session.json");

    store_at(&path).write(&Session::authenticated("tok-1")).unwrap();

    let reopened = store_at(&path);
    assert_eq!(reopened.read(), Some(Session::authenticated("tok-1")));

    let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        raw[SESSION_KEY],
        json!({ "state": { "token": "tok-1", "isAuthenticated": true }, "version": SESSION_VERSION })
    );
}

#[test]
fn test_clear_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let store = store_at(&path);
    store.write(&Session::authenticated("tok-1")).unwrap();
    store.clear().unwrap();

    assert!(store_at(&path).read().is_none());
}

#[test]
fn test_missing_file_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    assert!(store_at(&dir.path().join("never-written.json")).read().is_none());
}

#[test]
fn test_corrupt_file_reads_as_absent_and_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").unwrap();

    let store = store_at(&path);
    assert!(store.read().is_none());

    store.write(&Session::authenticated("tok-2")).unwrap();
    assert_eq!(store_at(&path).read(), Some(Session::authenticated("tok-2")));
}

#[test]
fn test_malformed_envelope_reads_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let storage = FileStorage::open(&path).unwrap();
    storage.set_item(SESSION_KEY, json!({ "state": "garbage" })).unwrap();
    assert_eq!(storage.path(), path.as_path());

    assert!(store_at(&path).read().is_none());
}

#[test]
fn test_other_keys_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let storage = FileStorage::open(&path).unwrap();
    storage.set_item("theme", json!("dark")).unwrap();

    let store = SessionStore::new(Arc::new(storage));
    store.write(&Session::authenticated("tok-3")).unwrap();
    store.clear().unwrap();

    let reopened = FileStorage::open(&path).unwrap();
    assert_eq!(reopened.get_item("theme").unwrap(), Some(json!("dark")));
    assert_eq!(reopened.get_item(SESSION_KEY).unwrap(), None);
}
