//! Incremental synchronization of monotonically-appended library collections.
//!
//! Saved tracks and albums only ever grow at the front (newest first), so a
//! stale cache can be brought current by fetching the newest page and merging
//! the strictly-newer items instead of re-downloading the whole collection.

use std::{future::Future, time::Duration};

use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::sleep;

use crate::{config, management::cache::CacheManager, spotify::ApiError, types::Page, warning};

/// Drains an offset-paginated collection completely.
///
/// The first page establishes the authoritative total; subsequent pages are
/// spaced by the configured batch delay and the loop ends at the total or on
/// a short page. Errors propagate: the cold path has nothing to fall back on.
pub async fn drain_all<T, F, Fut>(fetch_page: F) -> Result<Page<T>, ApiError>
where
    F: Fn(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let limit = config::PAGE_SIZE;
    let first = fetch_page(limit, 0).await?;
    let total = first.total;
    let mut items = first.items;
    let mut offset = limit;

    while offset < total {
        sleep(config::BATCH_DELAY).await;
        let batch = fetch_page(limit, offset).await?;
        let got = batch.items.len() as u32;
        items.extend(batch.items);
        offset += limit;
        if got < limit {
            break;
        }
    }

    Ok(Page {
        total: total.max(items.len() as u32),
        items,
    })
}

/// Serves a library collection through the cache.
///
/// - A fresh entry is returned verbatim.
/// - A stale entry is updated incrementally: only the newest page is fetched
///   and items strictly newer than the newest cached item are merged in.
/// - With no entry the collection is drained from scratch.
///
/// `added_at` extracts the RFC 3339 save instant (such timestamps compare
/// lexicographically) and `identity` the stable id used for de-duplication.
/// A failed incremental pass falls back to the full drain; a failed drain
/// serves the stale copy when one exists.
pub async fn fetch_library_with_cache<T, F, Fut>(
    cache: &CacheManager,
    key: &str,
    fetch_page: F,
    added_at: impl Fn(&T) -> &str,
    identity: impl Fn(&T) -> String,
    force_refresh: bool,
) -> Result<Page<T>, ApiError>
where
    T: Serialize + DeserializeOwned,
    F: Fn(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    if !force_refresh {
        // one non-evicting read serves both the freshness check and the
        // diff base; TTL eviction stays with the plain cache reads
        let cached: Option<Page<T>> = cache.get(key, Duration::MAX).await;
        if let Some(cached_page) = cached {
            let age = cache
                .timestamp(key)
                .await
                .map(|ts| Utc::now().timestamp_millis() - ts);
            let fresh =
                matches!(age, Some(age) if age <= config::CACHE_MAX_AGE.as_millis() as i64);
            if fresh {
                return Ok(cached_page);
            }

            // stale but present: diff against the newest known item
            if !cached_page.items.is_empty() {
                let latest = added_at(&cached_page.items[0]).to_string();
                match fetch_page(config::PAGE_SIZE, 0).await {
                    Ok(recent) => {
                        let fresh_total = recent.total;
                        let newer: Vec<T> = recent
                            .items
                            .into_iter()
                            .filter(|item| added_at(item) > latest.as_str())
                            .collect();

                        if newer.is_empty() {
                            // nothing new, re-stamp the entry
                            cache.set(key, &cached_page).await;
                            return Ok(cached_page);
                        }

                        let merged = cache.merge_items(key, newer, identity).await;
                        let page = Page {
                            total: fresh_total.max(merged.items.len() as u32),
                            items: merged.items,
                        };
                        cache.set(key, &page).await;
                        return Ok(page);
                    }
                    Err(err) => {
                        warning!("Incremental refresh of {} failed: {}", key, err);
                        // fall through to the full drain
                    }
                }
            }
        }
    }

    match drain_all(&fetch_page).await {
        Ok(page) => {
            cache.set(key, &page).await;
            Ok(page)
        }
        Err(err) => {
            if let Some(page) = cache.get::<Page<T>>(key, Duration::MAX).await {
                warning!("Full refresh of {} failed, serving stale copy: {}", key, err);
                return Ok(page);
            }
            Err(err)
        }
    }
}
