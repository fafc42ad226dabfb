use std::{collections::HashSet, sync::Arc, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    config,
    management::storage::{Storage, StorageError},
    types::Page,
    warning,
};

const CACHE_PREFIX: &str = "cache_";

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    timestamp: i64,
    payload: serde_json::Value,
}

/// Best-effort persistent cache with TTL eviction and incremental merge
/// helpers.
///
/// The cache only accelerates reads; its presence or absence never changes
/// the correctness of a result, and any failure degrades to no-cache
/// operation.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn Storage>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        CacheManager { store }
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    fn expired(timestamp: i64, max_age: Duration) -> bool {
        let age = Utc::now().timestamp_millis() - timestamp;
        age > 0 && age as u128 > max_age.as_millis()
    }

    /// Returns the cached payload when it is younger than `max_age`;
    /// an older or unreadable entry is evicted and reported absent.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, max_age: Duration) -> Option<T> {
        let storage_key = Self::storage_key(key);
        let raw = self.store.read(&storage_key).await.ok()?;

        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(_) => {
                let _ = self.store.remove(&storage_key).await;
                return None;
            }
        };

        if Self::expired(entry.timestamp, max_age) {
            let _ = self.store.remove(&storage_key).await;
            return None;
        }

        serde_json::from_value(entry.payload).ok()
    }

    /// Stores a payload stamped with the current instant.
    ///
    /// A quota failure evicts everything older than the cache horizon and
    /// retries exactly once; a second failure is swallowed.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(err) => {
                warning!("Cache payload not serializable: {}", err);
                return;
            }
        };
        let entry = CacheEntry {
            timestamp: Utc::now().timestamp_millis(),
            payload,
        };
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(err) => {
                warning!("Cache entry not serializable: {}", err);
                return;
            }
        };

        let storage_key = Self::storage_key(key);
        match self.store.write(&storage_key, &json).await {
            Ok(()) => {}
            Err(StorageError::QuotaExceeded) => {
                self.clear_old().await;
                if let Err(err) = self.store.write(&storage_key, &json).await {
                    warning!("Cache write failed after eviction: {}", err);
                }
            }
            Err(err) => warning!("Cache write failed: {}", err),
        }
    }

    /// Returns the write instant of an entry without deserializing it.
    pub async fn timestamp(&self, key: &str) -> Option<i64> {
        let raw = self.store.read(&Self::storage_key(key)).await.ok()?;
        serde_json::from_str::<CacheEntry>(&raw)
            .ok()
            .map(|entry| entry.timestamp)
    }

    pub async fn clear(&self, key: &str) {
        let _ = self.store.remove(&Self::storage_key(key)).await;
    }

    pub async fn clear_all(&self) {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(_) => return,
        };
        for key in keys {
            if key.starts_with(CACHE_PREFIX) {
                let _ = self.store.remove(&key).await;
            }
        }
    }

    /// Evicts every entry older than the cache horizon. Unreadable entries
    /// are evicted as well.
    pub async fn clear_old(&self) {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(_) => return,
        };
        for key in keys {
            if !key.starts_with(CACHE_PREFIX) {
                continue;
            }
            let stale = match self.store.read(&key).await {
                Ok(raw) => match serde_json::from_str::<CacheEntry>(&raw) {
                    Ok(entry) => Self::expired(entry.timestamp, config::CACHE_MAX_AGE),
                    Err(_) => true,
                },
                Err(_) => true,
            };
            if stale {
                let _ = self.store.remove(&key).await;
            }
        }
    }

    /// Returns the newest cached item of a reverse-chronological collection,
    /// regardless of entry age.
    pub async fn latest_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let page: Page<T> = self.get(key, Duration::MAX).await?;
        page.items.into_iter().next()
    }

    /// Prepends the unseen subset of `new_items` to the cached collection.
    ///
    /// Identity is derived through the explicit `identity` function so the
    /// merge behavior is fixed per resource kind. Within `new_items` only
    /// identity collisions against the cache are dropped; order is preserved
    /// with the newest items first. The merge base is whatever is cached
    /// regardless of its age, and the result is returned, not written back.
    pub async fn merge_items<T>(
        &self,
        key: &str,
        new_items: Vec<T>,
        identity: impl Fn(&T) -> String,
    ) -> Page<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let cached: Option<Page<T>> = self.get(key, Duration::MAX).await;
        let cached = match cached {
            Some(page) => page,
            None => {
                let total = new_items.len() as u32;
                return Page {
                    items: new_items,
                    total,
                };
            }
        };

        let existing: HashSet<String> = cached.items.iter().map(|i| identity(i)).collect();
        let mut items: Vec<T> = new_items
            .into_iter()
            .filter(|item| !existing.contains(&identity(item)))
            .collect();
        items.extend(cached.items);

        Page {
            total: items.len() as u32,
            items,
        }
    }
}
