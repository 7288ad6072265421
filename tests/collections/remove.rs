//! Removal

use crate::common::*;
use serde_json::json;

#[tokio::test]
async fn removed_item_is_gone() {
    let store = quiet_store();
    put(&store, "simpleItems", "g1", json!({"name": "Gigi", "age": 23})).await;

    let out = store.remove_item_in_collection("simpleItems", "g1").await.unwrap();
    assert_eq!(out.length, 0);
    assert_eq!(out.index, 1);

    let err = store
        .get_item_in_collection("simpleItems", "g1")
        .await
        .unwrap_err();
    assert_eq!(err, Error::field_inexistent("simpleItems", "g1"));
}

#[tokio::test]
async fn remove_missing_item() {
    let err = quiet_store()
        .remove_item_in_collection("simpleItems", "nope")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CollectionFieldInexistent");
}

#[tokio::test]
async fn remove_by_index() {
    let store = quiet_store();
    store
        .add_item_to_collection(
            "users",
            json!({"email": "a@b"}),
            AddOptions::new().id("u1").index_by("email"),
        )
        .await
        .unwrap();

    store
        .remove_item_in_collection_by("users", "email", "a@b")
        .await
        .unwrap();
    assert!(!store.is_item_in_collection("users", "u1").await);

    let err = store
        .remove_item_in_collection_by("users", "email", "a@b")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CollectionFieldInexistent");
}

#[tokio::test]
async fn remove_by_index_collapses_store_failures() {
    let store = quiet_store();
    store
        .add_item_to_collection(
            "users",
            json!({"email": "a@b"}),
            AddOptions::new().id("u1").index_by("email"),
        )
        .await
        .unwrap();
    store.storage().fail_next_round_trips(1);

    let err = store
        .remove_item_in_collection_by("users", "email", "a@b")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CollectionFieldInexistent");
}

#[tokio::test]
async fn remove_collection_wipes_records_and_indexes() {
    let store = quiet_store();
    for id in ["a", "b"] {
        store
            .add_item_to_collection(
                "tags",
                json!({"label": id}),
                AddOptions::new().id(id).index_by("label"),
            )
            .await
            .unwrap();
    }
    put(&store, "other", "x", json!({})).await;

    store.remove_collection("tags").await.unwrap();

    assert!(store.get_all_items_in_collection("tags").await.unwrap().is_empty());
    assert!(!store.is_item_in_collection_by("tags", "label", "a").await);
    assert!(store.storage().entry("tags:by:label").is_none());
    assert!(store.is_item_in_collection("other", "x").await);
}

#[tokio::test]
async fn remove_collection_failure() {
    let store = quiet_store();
    put(&store, "tags", "a", json!({})).await;
    store.storage().fail_next_round_trips(1);

    let err = store.remove_collection("tags").await.unwrap_err();
    assert_eq!(err.code(), "CollectionDeletionFailure");
    assert!(store.is_item_in_collection("tags", "a").await);
}

#[tokio::test]
async fn flush_wipes_everything() {
    let store = quiet_store();
    put(&store, "tags", "a", json!({})).await;
    store.enqueue("jobs", &json!(1)).await.unwrap();

    store.flush().await.unwrap();
    assert_eq!(store.storage().key_count(), 0);
}

#[tokio::test]
async fn failed_delete_batch_keeps_item() {
    let store = quiet_store();
    put(&store, "simpleItems", "g1", json!({"name": "Gigi"})).await;

    // metadata read succeeds, the delete batch fails
    store.storage().fail_round_trips_after(1, 1);
    let err = store
        .remove_item_in_collection("simpleItems", "g1")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CollectionDeletionFailure");

    let item = store.get_item_in_collection("simpleItems", "g1").await.unwrap();
    assert_eq!(item["name"], json!("Gigi"));
    assert_eq!(store.get_collection_length("simpleItems").await.unwrap(), 1);
}

#[tokio::test]
async fn failed_index_cleanup_is_reported_and_logged() {
    let (store, logs) = captured_store();
    store
        .add_item_to_collection(
            "users",
            json!({"email": "a@b"}),
            AddOptions::new().id("u1").index_by("email"),
        )
        .await
        .unwrap();

    // a list squatting on the index key breaks pointer cleanup
    store.storage().del("users:by:email").await.unwrap();
    store.storage().rpush("users:by:email", "x".into()).await.unwrap();

    let err = store.remove_item_in_collection("users", "u1").await.unwrap_err();
    assert_eq!(err.code(), "CollectionDeletionFailure");
    assert!(!store.is_item_in_collection("users", "u1").await);
    assert_eq!(store.get_collection_length("users").await.unwrap(), 0);

    let warnings = logs.lines_with("index cleanup failed after removal");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("WARN"));
    assert!(logs.lines_with("removed item").is_empty());
}
