//! Missing references fail whole operations

use crate::common::*;
use serde_json::json;

#[tokio::test]
async fn get_many_with_one_missing_id_fails() {
    let store = quiet_store();
    put(&store, "items", "1", json!({"n": 1})).await;

    let err = store
        .get_items_in_collection("items", ["1", "2"])
        .await
        .unwrap_err();
    assert_eq!(err, Error::field_inexistent("items", "2"));
}

#[tokio::test]
async fn missing_foreign_record_fails_read() {
    let store = quiet_store();
    put(&store, "guests", "g1", json!({})).await;
    put_related(
        &store,
        "peers",
        "p1",
        json!({"user": {"g1": null}}),
        fks([("user", ForeignKey::one_to_many("guests"))]),
    )
    .await;
    store.remove_item_in_collection("guests", "g1").await.unwrap();

    let err = store.get_item_in_collection("peers", "p1").await.unwrap_err();
    assert_eq!(err, Error::field_inexistent("guests", "g1"));
    assert!(!store.is_item_in_collection("peers", "p1").await);
}

#[tokio::test]
async fn missing_second_level_record_fails_read() {
    let store = quiet_store();
    seed_social_graph(&store, 2, 2).await;
    store.remove_item_in_collection("avatars", "a1").await.unwrap();

    let err = store
        .get_items_in_collection("peers", ["p0", "p1"])
        .await
        .unwrap_err();
    assert_eq!(err, Error::field_inexistent("avatars", "a1"));

    let err = store.get_all_items_in_collection("peers").await.unwrap_err();
    assert_eq!(err.code(), "CollectionFieldInexistent");
}

#[tokio::test]
async fn add_with_dangling_reference_reports_missing_target() {
    let store = quiet_store();
    let err = store
        .add_item_to_collection(
            "boxes",
            json!({"owner": "ghost"}),
            AddOptions::new()
                .id("b1")
                .foreign_key("owner", ForeignKey::one_to_one("users")),
        )
        .await
        .unwrap_err();
    assert_eq!(err, Error::field_inexistent("users", "ghost"));
}

#[tokio::test]
async fn store_failure_during_resolution_is_generic() {
    let store = quiet_store();
    seed_social_graph(&store, 1, 1).await;
    store.storage().fail_next_round_trips(1);

    let err = store.get_item_in_collection("peers", "p0").await.unwrap_err();
    assert_eq!(err.code(), "GenericRedisFailure");
}
