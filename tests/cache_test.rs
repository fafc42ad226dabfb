use std::{sync::Arc, time::Duration};

use chrono::Utc;
use spotistats::management::{CacheManager, FsStorage, MemoryStorage, Storage};
use spotistats::types::{Page, SavedTrackItem, Track};

fn create_test_item(id: &str, added_at: &str) -> SavedTrackItem {
    SavedTrackItem {
        added_at: added_at.to_string(),
        track: Track {
            id: id.to_string(),
            name: format!("{}_name", id),
            duration_ms: 200_000,
            artists: Vec::new(),
            album: None,
        },
    }
}

fn identity(item: &SavedTrackItem) -> String {
    item.track.id.clone()
}

// Raw cache entry with a chosen timestamp, in the envelope format the
// cache manager persists
fn raw_entry(payload: serde_json::Value, age: Duration) -> String {
    let timestamp = Utc::now().timestamp_millis() - age.as_millis() as i64;
    serde_json::json!({ "timestamp": timestamp, "payload": payload }).to_string()
}

#[tokio::test]
async fn test_cache_round_trip() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store);

    let page = Page {
        items: vec![create_test_item("a", "2024-01-01T00:00:00Z")],
        total: 1,
    };
    cache.set("saved_tracks", &page).await;

    let restored: Option<Page<SavedTrackItem>> =
        cache.get("saved_tracks", Duration::from_secs(1)).await;
    let restored = restored.expect("fresh entry must be present");
    assert_eq!(restored.total, 1);
    assert_eq!(restored.items.len(), 1);
    assert_eq!(restored.items[0].track.id, "a");
}

#[tokio::test]
async fn test_cache_ttl_eviction() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store.clone());

    let payload = serde_json::json!({ "items": [], "total": 0 });
    store
        .write(
            "cache_old_entry",
            &raw_entry(payload, Duration::from_secs(60 * 60)),
        )
        .await
        .unwrap();

    // An hour-old entry is absent for a one-minute max age...
    let hit: Option<Page<SavedTrackItem>> =
        cache.get("old_entry", Duration::from_secs(60)).await;
    assert!(hit.is_none());

    // ...and the expired entry was evicted, not merely skipped
    assert!(cache.timestamp("old_entry").await.is_none());
}

#[tokio::test]
async fn test_cache_fresh_within_max_age() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store.clone());

    let payload = serde_json::json!({ "items": [], "total": 3 });
    store
        .write(
            "cache_entry",
            &raw_entry(payload, Duration::from_secs(30)),
        )
        .await
        .unwrap();

    let hit: Option<Page<SavedTrackItem>> = cache.get("entry", Duration::from_secs(60)).await;
    assert_eq!(hit.expect("entry is younger than max age").total, 3);
}

#[tokio::test]
async fn test_cache_corrupt_entry_is_evicted() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store.clone());

    store.write("cache_bad", "not json at all").await.unwrap();

    let hit: Option<Page<SavedTrackItem>> = cache.get("bad", Duration::from_secs(60)).await;
    assert!(hit.is_none());
    assert!(store.read("cache_bad").await.is_err());
}

#[tokio::test]
async fn test_merge_items_prepends_unseen_newest_first() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store);

    let cached = Page {
        items: vec![
            create_test_item("b", "2024-01-02T00:00:00Z"),
            create_test_item("a", "2024-01-01T00:00:00Z"),
        ],
        total: 2,
    };
    cache.set("saved_tracks", &cached).await;

    let new_items = vec![
        create_test_item("c", "2024-01-03T00:00:00Z"),
        create_test_item("b", "2024-01-02T00:00:00Z"), // already cached
    ];
    let merged = cache.merge_items("saved_tracks", new_items, identity).await;

    let ids: Vec<&str> = merged.items.iter().map(|i| i.track.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
    assert_eq!(merged.total, 3);
}

#[tokio::test]
async fn test_merge_items_idempotent() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store);

    let cached = Page {
        items: vec![create_test_item("a", "2024-01-01T00:00:00Z")],
        total: 1,
    };
    cache.set("saved_tracks", &cached).await;

    let new_items = vec![create_test_item("b", "2024-01-02T00:00:00Z")];
    let merged = cache
        .merge_items("saved_tracks", new_items.clone(), identity)
        .await;
    assert_eq!(merged.items.len(), 2);
    cache.set("saved_tracks", &merged).await;

    // merging the same new items again must not grow the set
    let merged_again = cache.merge_items("saved_tracks", new_items, identity).await;
    assert_eq!(merged_again.items.len(), 2);
}

#[tokio::test]
async fn test_merge_items_keeps_duplicates_within_new_items() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store);

    let cached = Page {
        items: vec![create_test_item("a", "2024-01-01T00:00:00Z")],
        total: 1,
    };
    cache.set("saved_tracks", &cached).await;

    // de-duplication happens against the cache only, not within the batch
    let new_items = vec![
        create_test_item("c", "2024-01-03T00:00:00Z"),
        create_test_item("c", "2024-01-03T00:00:00Z"),
    ];
    let merged = cache.merge_items("saved_tracks", new_items, identity).await;
    assert_eq!(merged.items.len(), 3);
}

#[tokio::test]
async fn test_merge_items_without_cache_returns_new_items() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store);

    let new_items = vec![create_test_item("a", "2024-01-01T00:00:00Z")];
    let merged = cache.merge_items("saved_tracks", new_items, identity).await;
    assert_eq!(merged.items.len(), 1);
    assert_eq!(merged.total, 1);
}

#[tokio::test]
async fn test_quota_recovery_evicts_old_and_retries() {
    // capacity for two records: one stale entry plus one fresh
    let store = Arc::new(MemoryStorage::with_capacity(2));
    let cache = CacheManager::new(store.clone());

    let stale_payload = serde_json::json!({ "items": [], "total": 0 });
    store
        .write(
            "cache_stale",
            &raw_entry(stale_payload, Duration::from_secs(25 * 60 * 60)),
        )
        .await
        .unwrap();
    cache.set("fresh", &Page::<SavedTrackItem>::default()).await;

    // the store is full; this write must evict the stale entry and succeed
    cache.set("incoming", &Page::<SavedTrackItem>::default()).await;

    assert!(cache.timestamp("incoming").await.is_some());
    assert!(cache.timestamp("fresh").await.is_some());
    assert!(cache.timestamp("stale").await.is_none());
}

#[tokio::test]
async fn test_quota_second_failure_is_swallowed() {
    // a single slot held by a fresh entry: eviction frees nothing
    let store = Arc::new(MemoryStorage::with_capacity(1));
    let cache = CacheManager::new(store);

    cache.set("fresh", &Page::<SavedTrackItem>::default()).await;
    cache.set("incoming", &Page::<SavedTrackItem>::default()).await;

    // cache stays best-effort: the write is dropped, the old entry survives
    assert!(cache.timestamp("incoming").await.is_none());
    assert!(cache.timestamp("fresh").await.is_some());
}

#[tokio::test]
async fn test_clear_all_leaves_foreign_records_alone() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store.clone());

    store.write("token", "{\"keep\": true}").await.unwrap();
    cache.set("one", &Page::<SavedTrackItem>::default()).await;
    cache.set("two", &Page::<SavedTrackItem>::default()).await;

    cache.clear_all().await;

    assert!(cache.timestamp("one").await.is_none());
    assert!(cache.timestamp("two").await.is_none());
    assert!(store.read("token").await.is_ok());
}

#[tokio::test]
async fn test_latest_item_returns_newest() {
    let store = Arc::new(MemoryStorage::new());
    let cache = CacheManager::new(store);

    let page = Page {
        items: vec![
            create_test_item("newest", "2024-01-03T00:00:00Z"),
            create_test_item("older", "2024-01-01T00:00:00Z"),
        ],
        total: 2,
    };
    cache.set("saved_tracks", &page).await;

    let latest: Option<SavedTrackItem> = cache.latest_item("saved_tracks").await;
    assert_eq!(latest.expect("cached page has items").track.id, "newest");
}

#[tokio::test]
async fn test_fs_storage_round_trip() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(FsStorage::with_root(dir.path()));

    store.write("cache_entry", "{\"timestamp\":1,\"payload\":null}").await.unwrap();
    let raw = store.read("cache_entry").await.unwrap();
    assert!(raw.contains("timestamp"));

    let keys = store.keys().await.unwrap();
    assert_eq!(keys, vec!["cache_entry".to_string()]);

    store.remove("cache_entry").await.unwrap();
    assert!(store.read("cache_entry").await.is_err());

    // removing a missing record is not an error
    assert!(store.remove("cache_entry").await.is_ok());
}

#[tokio::test]
async fn test_fs_storage_backed_cache() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(FsStorage::with_root(dir.path()));
    let cache = CacheManager::new(store);

    let page = Page {
        items: vec![create_test_item("a", "2024-01-01T00:00:00Z")],
        total: 1,
    };
    cache.set("saved_tracks", &page).await;

    let restored: Option<Page<SavedTrackItem>> =
        cache.get("saved_tracks", Duration::from_secs(60)).await;
    assert_eq!(restored.expect("entry persisted to disk").items.len(), 1);
}
