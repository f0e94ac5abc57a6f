//! Store Tests
//!
//! SQLite prediction store behavior against real database files.

use abalone_backend::{FeatureRecord, PredictionRepository, SqlitePredictionStore, StoreError};
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SqlitePredictionStore {
    SqlitePredictionStore::new(dir.path().join("predictions.db"))
}

fn adult() -> FeatureRecord {
    FeatureRecord::new(1, 0.5, 0.4, 0.1, 0.8, 0.3, 0.2, 0.2)
}

fn infant() -> FeatureRecord {
    FeatureRecord::new(0, 0.3, 0.2, 0.07, 0.15, 0.07, 0.03, 0.05)
}

#[tokio::test]
async fn test_empty_store_lists_nothing() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.ensure_schema().await.unwrap();

    assert!(store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_append_then_list_in_insertion_order() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.ensure_schema().await.unwrap();

    let first = store.append(&adult(), 11.0).await.unwrap();
    let second = store.append(&infant(), 8.85).await.unwrap();
    assert!(second.id > first.id);

    let rows = store.list_all().await.unwrap();
    assert_eq!(rows, vec![first, second]);
    assert_eq!(rows[0].record().unwrap(), adult());
    assert_eq!(rows[1].record().unwrap(), infant());
    assert_eq!(rows[1].prediction, 8.85);
}

#[tokio::test]
async fn test_input_data_is_column_keyed_json() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.ensure_schema().await.unwrap();

    let stored = store.append(&adult(), 11.0).await.unwrap();
    let payload: serde_json::Value = serde_json::from_str(&stored.input_data).unwrap();
    let object = payload.as_object().unwrap();

    assert_eq!(object.len(), 8);
    assert_eq!(payload["sex"], 1);
    assert_eq!(payload["shell_weight"], 0.2);
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.ensure_schema().await.unwrap();
    store.append(&adult(), 11.0).await.unwrap();

    store.ensure_schema().await.unwrap();
    store.ensure_schema().await.unwrap();

    assert_eq!(store.list_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rows_survive_a_new_store_handle() {
    let dir = TempDir::new().unwrap();
    store_in(&dir).ensure_schema().await.unwrap();
    store_in(&dir).append(&adult(), 11.0).await.unwrap();

    let rows = store_in(&dir).list_all().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].prediction, 11.0);
}

#[tokio::test]
async fn test_concurrent_appends_get_distinct_ids() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.ensure_schema().await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.append(&adult(), i as f64).await.unwrap().id
        }));
    }

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(store.list_all().await.unwrap().len(), 8);
}

#[tokio::test]
async fn test_append_without_schema_fails() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let result = store.append(&adult(), 11.0).await;
    assert!(matches!(result, Err(StoreError::Query(_))));
}

#[tokio::test]
async fn test_unopenable_database_is_connection_error() {
    let dir = TempDir::new().unwrap();
    let store = SqlitePredictionStore::new(dir.path().join("missing").join("predictions.db"));

    let result = store.ensure_schema().await;
    assert!(matches!(result, Err(StoreError::Connection { .. })));
}
