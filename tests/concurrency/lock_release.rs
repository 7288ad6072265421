//! Locks are released on every exit path

use crate::common::*;
use async_trait::async_trait;
use relkv::{LockGuard, LockManager, StoreError, StoreResult};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lock adapter that counts acquisitions and releases
#[derive(Default)]
struct CountingLocks {
    inner: NamedLocks,
    acquired: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl CountingLocks {
    fn balanced(&self) -> bool {
        self.acquired.load(Ordering::SeqCst) == self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockManager for CountingLocks {
    async fn acquire(&self, resource: &str) -> StoreResult<LockGuard> {
        let guard = self.inner.acquire(resource).await?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let released = Arc::clone(&self.released);
        Ok(LockGuard::new(resource, move || {
            guard.release();
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// Lock adapter whose lock service is unreachable
struct UnreachableLocks;

#[async_trait]
impl LockManager for UnreachableLocks {
    async fn acquire(&self, resource: &str) -> StoreResult<LockGuard> {
        Err(StoreError::Lock {
            resource: resource.to_string(),
            reason: "lock service unreachable".into(),
        })
    }
}

fn counting_store() -> (RelationalStore<MemoryStore, CountingLocks>, Arc<CountingLocks>) {
    let locks = Arc::new(CountingLocks::default());
    let store = RelationalStore::builder()
        .locks(Arc::clone(&locks))
        .quiet()
        .build()
        .unwrap();
    (store, locks)
}

#[tokio::test]
async fn every_failure_path_releases() {
    let (store, locks) = counting_store();
    store
        .add_item_to_collection("items", json!({"n": 1}), AddOptions::new().id("a"))
        .await
        .unwrap();
    let mismatched = fks([("n", ForeignKey::one_to_one("x"))]);

    let outcomes = vec![
        store
            .update_item_in_collection("items", "a", json!({}), &mismatched)
            .await
            .err(),
        store
            .update_item_in_collection_with("items", "a", &ForeignKeys::new(), |_| async {
                Err::<Value, _>("nope")
            })
            .await
            .err(),
        store
            .update_item_in_collection("items", "ghost", json!({}), &ForeignKeys::new())
            .await
            .err(),
        store.remove_item_in_collection("items", "ghost").await.err(),
        store
            .add_item_to_collection("items", json!("not an object"), AddOptions::new())
            .await
            .err(),
    ];
    assert!(outcomes.iter().all(Option::is_some));

    store.storage().fail_next_round_trips(1);
    assert!(store
        .add_item_to_collection("items", json!({}), AddOptions::new().id("b"))
        .await
        .is_err());

    assert!(locks.balanced());
    assert_eq!(locks.inner.active(), 0);
}

#[tokio::test]
async fn success_paths_release() {
    let (store, locks) = counting_store();
    store
        .add_item_to_collection("items", json!({"n": 1}), AddOptions::new().id("a"))
        .await
        .unwrap();
    store
        .update_item_in_collection("items", "a", json!({"n": 2}), &ForeignKeys::new())
        .await
        .unwrap();
    store.remove_item_in_collection("items", "a").await.unwrap();
    store.remove_collection("items").await.unwrap();

    // add takes the collection lock and the item lock
    assert_eq!(locks.acquired.load(Ordering::SeqCst), 5);
    assert!(locks.balanced());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_update_does_not_block_other_items() {
    let store = quiet_store();
    put(&store, "items", "a", json!({})).await;
    put(&store, "items", "b", json!({})).await;

    let err = store
        .update_item_in_collection_with("items", "a", &ForeignKeys::new(), |_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<Value, _>("merge failed")
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CollectionUpdateFailure");

    let next = tokio::time::timeout(
        Duration::from_secs(1),
        store.update_item_in_collection("items", "b", json!({"ok": true}), &ForeignKeys::new()),
    )
    .await
    .expect("update of another item must not wait");
    assert_eq!(next.unwrap()["ok"], json!(true));

    let again = tokio::time::timeout(
        Duration::from_secs(1),
        store.update_item_in_collection("items", "a", json!({"ok": true}), &ForeignKeys::new()),
    )
    .await
    .expect("the failed item must be free again");
    assert!(again.is_ok());
}

#[tokio::test]
async fn panicking_transform_releases_item_lock() {
    let store = quiet_store();
    put(&store, "items", "a", json!({})).await;

    let task = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .update_item_in_collection_with("items", "a", &ForeignKeys::new(), |_| async {
                    if true {
                        panic!("transform blew up");
                    }
                    Ok::<Value, String>(json!({}))
                })
                .await
        })
    };
    assert!(task.await.is_err());
    assert!(!store.locks().is_held("items:a"));
}

#[tokio::test]
async fn lock_adapter_failure_is_generic() {
    let store = RelationalStore::builder()
        .locks(Arc::new(UnreachableLocks))
        .quiet()
        .build()
        .unwrap();
    let err = store
        .add_item_to_collection("items", json!({}), AddOptions::new())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "GenericRedisFailure");
    assert!(err.to_string().contains("unreachable"));
}
