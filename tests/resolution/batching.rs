//! Round trip bound: a graph D levels deep costs D + 1 round trips

use crate::common::*;
use serde_json::json;

async fn round_trips_for_get_many(store: &RelationalStore, ids: Vec<String>) -> u64 {
    store.storage().reset_stats();
    let items = store.get_items_in_collection("peers", ids.clone()).await.unwrap();
    assert_eq!(items.len(), ids.len());
    store.storage().stats().round_trips
}

#[tokio::test]
async fn depth_two_costs_three_regardless_of_fan_out() {
    for (peers, guests) in [(1, 1), (5, 3), (20, 10)] {
        let store = quiet_store();
        seed_social_graph(&store, peers, guests).await;
        let ids = (0..peers).map(|p| format!("p{}", p)).collect();
        assert_eq!(
            round_trips_for_get_many(&store, ids).await,
            3,
            "peers={} guests={}",
            peers,
            guests
        );
    }
}

#[tokio::test]
async fn each_level_is_one_batch_with_one_read_per_collection() {
    let store = quiet_store();
    seed_social_graph(&store, 4, 6).await;
    store.storage().reset_stats();

    store.get_all_items_in_collection("peers").await.unwrap();
    let stats = store.storage().stats();
    // HGETALL, then one HMGET for guests, then one HMGET for avatars
    assert_eq!(stats.round_trips, 3);
    assert_eq!(stats.commands, 3);
}

#[tokio::test]
async fn several_target_collections_share_a_level() {
    let store = quiet_store();
    put(&store, "users", "u1", json!({})).await;
    put(&store, "tags", "t1", json!({})).await;
    put(&store, "places", "l1", json!({})).await;
    put_related(
        &store,
        "posts",
        "x",
        json!({"author": "u1", "tag": "t1", "place": "l1"}),
        fks([
            ("author", ForeignKey::one_to_one("users")),
            ("tag", ForeignKey::one_to_one("tags")),
            ("place", ForeignKey::one_to_one("places")),
        ]),
    )
    .await;
    store.storage().reset_stats();

    store.get_item_in_collection("posts", "x").await.unwrap();
    let stats = store.storage().stats();
    assert_eq!(stats.round_trips, 2);
    assert_eq!(stats.commands, 4);
}

#[tokio::test]
async fn deeper_chain_adds_one_per_level() {
    let store = quiet_store();
    put(&store, "l3", "x", json!({})).await;
    for (collection, target) in [("l2", "l3"), ("l1", "l2"), ("l0", "l1")] {
        put_related(
            &store,
            collection,
            "x",
            json!({"next": "x"}),
            fks([("next", ForeignKey::one_to_one(target))]),
        )
        .await;
    }
    store.storage().reset_stats();

    let item = store.get_item_in_collection("l0", "x").await.unwrap();
    assert_eq!(store.storage().stats().round_trips, 4);
    assert_eq!(
        value(item),
        json!({"id": "x", "next": {"id": "x", "next": {"id": "x", "next": {"id": "x"}}}})
    );
}

#[tokio::test]
async fn flat_records_cost_one_round_trip() {
    let store = quiet_store();
    for id in ["a", "b", "c"] {
        put(&store, "items", id, json!({})).await;
    }
    store.storage().reset_stats();
    store
        .get_items_in_collection("items", ["a", "b", "c"])
        .await
        .unwrap();
    assert_eq!(store.storage().stats().round_trips, 1);
}
