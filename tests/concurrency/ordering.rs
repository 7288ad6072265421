//! Serialized writes follow lock acquisition order

use crate::common::*;
use relkv::LockManager;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::time::Duration;

async fn wait_until_held(store: &RelationalStore, resource: &str) {
    while !store.locks().is_held(resource) {
        tokio::task::yield_now().await;
    }
}

fn append(prev: &Item, entry: &str) -> Value {
    let mut log = prev
        .get("log")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    log.push(json!(entry));
    json!({ "log": log })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_update_first_still_applies_first() {
    let store = quiet_store();
    put(&store, "docs", "d1", json!({"log": []})).await;

    let slow = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .update_item_in_collection_with("docs", "d1", &ForeignKeys::new(), |prev| async move {
                    tokio::time::sleep(Duration::from_millis(80)).await;
                    Ok::<_, String>(append(&prev, "slow"))
                })
                .await
        })
    };
    wait_until_held(&store, "docs:d1").await;

    let fast = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .update_item_in_collection_with("docs", "d1", &ForeignKeys::new(), |prev| async move {
                    Ok::<_, String>(append(&prev, "fast"))
                })
                .await
        })
    };

    slow.await.unwrap().unwrap();
    let last = fast.await.unwrap().unwrap();
    assert_eq!(last["log"], json!(["slow", "fast"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_concurrent_updates_apply_sequentially() {
    let store = quiet_store();
    put(&store, "counters", "c", json!({"n": 0})).await;

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_item_in_collection_with("counters", "c", &ForeignKeys::new(), |prev| async move {
                        let n = prev["n"].as_i64().unwrap_or(0);
                        tokio::task::yield_now().await;
                        Ok::<_, String>(json!({"n": n + 1}))
                    })
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let item = store.get_item_in_collection("counters", "c").await.unwrap();
    assert_eq!(item["n"], json!(20));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_get_distinct_sequential_ids() {
    let store = slow_store(2);

    let tasks: Vec<_> = (0..10)
        .map(|n| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .add_item_to_collection("items", json!({"n": n}), AddOptions::new())
                    .await
            })
        })
        .collect();

    let mut ids = BTreeSet::new();
    let mut indexes = BTreeSet::new();
    for task in tasks {
        let out = task.await.unwrap().unwrap();
        ids.insert(out.item["id"].as_str().unwrap().parse::<u64>().unwrap());
        indexes.insert(out.index);
    }
    let expected: BTreeSet<u64> = (1..=10).collect();
    assert_eq!(ids, expected);
    assert_eq!(indexes, expected);
    assert_eq!(store.get_collection_length("items").await.unwrap(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn adds_complete_in_acquisition_order() {
    let store = slow_store(5);
    put(&store, "items", "seed", json!({})).await;

    // hold the collection lock so both adds queue behind it
    let gate = store
        .locks()
        .acquire(&store.keyspace().collection_lock("items"))
        .await
        .unwrap();
    let first = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .add_item_to_collection("items", json!({"who": "first"}), AddOptions::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .add_item_to_collection("items", json!({"who": "second"}), AddOptions::new())
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    gate.release();

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert_eq!(first.index, 2);
    assert_eq!(second.index, 3);
    assert_eq!(second.length, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reads_are_not_blocked_by_writers() {
    let store = quiet_store();
    put(&store, "docs", "d1", json!({"v": 1})).await;

    let _held = store.locks().acquire("docs:d1").await.unwrap();
    let read = tokio::time::timeout(
        Duration::from_secs(1),
        store.get_item_in_collection("docs", "d1"),
    )
    .await;
    assert!(read.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readd_waits_for_in_flight_update() {
    let store = quiet_store();
    let opts = || AddOptions::new().id("c1").index_by("createdBy");
    store
        .add_item_to_collection("challenges", json!({"createdBy": "u1", "title": "t"}), opts())
        .await
        .unwrap();

    let update = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .update_item_in_collection_with(
                    "challenges",
                    "c1",
                    &ForeignKeys::new(),
                    |prev| async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, String>(json!({"title": format!("{}!", prev["title"].as_str().unwrap_or(""))}))
                    },
                )
                .await
        })
    };
    wait_until_held(&store, "challenges:c1").await;

    let readd = store
        .add_item_to_collection("challenges", json!({"createdBy": "u2", "title": "new"}), opts())
        .await
        .unwrap();
    update.await.unwrap().unwrap();

    assert_eq!(readd.item["createdBy"], json!("u2"));
    let by_u2 = store
        .get_item_in_collection_by("challenges", "createdBy", "u2")
        .await
        .unwrap();
    assert_eq!(by_u2["createdBy"], json!("u2"));
    assert_eq!(by_u2["title"], json!("new"));
    assert!(!store.is_item_in_collection_by("challenges", "createdBy", "u1").await);
}
