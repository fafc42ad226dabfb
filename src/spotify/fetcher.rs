//! Rate-limited assembly of bounded result sets from paginated endpoints.

use std::future::Future;

use tokio::time::sleep;

use crate::{config, spotify::ApiError, types::Page, warning};

/// Drains an offset-paginated resource up to a hard cap.
///
/// Pages are requested sequentially at `page_size` strides with the
/// configured delay inserted between calls after the first, to stay under
/// the remote rate limit. The drain stops when a page comes back short
/// (remote exhausted) or when the accumulated offset reaches `hard_cap`,
/// and the result is truncated to the cap.
///
/// A failing batch is logged and skipped: the loop moves on to the next
/// offset and the caller gets an undercount instead of a total failure.
/// Callers needing a strict count must compare `items.len()` against
/// `total`. Only a terminal credential failure aborts the drain.
///
/// The loop runs at most `hard_cap / page_size` (rounded up) iterations for
/// any page sequence.
pub async fn fetch_all<T, F, Fut>(
    fetch_page: F,
    page_size: u32,
    hard_cap: u32,
) -> Result<Page<T>, ApiError>
where
    F: Fn(u32, u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items: Vec<T> = Vec::new();
    let mut total = 0u32;
    let mut offset = 0u32;
    let mut first = true;

    while offset < hard_cap {
        if !first {
            sleep(config::BATCH_DELAY).await;
        }
        first = false;

        match fetch_page(page_size, offset).await {
            Ok(page) => {
                total = page.total;
                let short = (page.items.len() as u32) < page_size;
                items.extend(page.items);
                if short {
                    break; // remote exhausted
                }
            }
            Err(err @ ApiError::Auth(_)) => return Err(err),
            Err(err) => {
                warning!("Batch at offset {} failed: {}", offset, err);
                // treated as an empty page, keep draining
            }
        }

        offset += page_size;
    }

    items.truncate(hard_cap as usize);
    Ok(Page {
        total: total.max(items.len() as u32),
        items,
    })
}

/// Fetches entities by id in chunks of at most `max_per_batch`.
///
/// One call per chunk, spaced by the configured delay after the first. A
/// failing chunk contributes nothing; the remaining chunks still run. Only a
/// terminal credential failure aborts the whole lookup.
pub async fn fetch_by_ids<T, F, Fut>(
    ids: &[String],
    fetch_batch: F,
    max_per_batch: usize,
) -> Result<Vec<T>, ApiError>
where
    F: Fn(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ApiError>>,
{
    let mut out = Vec::new();

    for (index, chunk) in ids.chunks(max_per_batch.max(1)).enumerate() {
        if index > 0 {
            sleep(config::BATCH_DELAY).await;
        }
        match fetch_batch(chunk.to_vec()).await {
            Ok(batch) => out.extend(batch),
            Err(err @ ApiError::Auth(_)) => return Err(err),
            Err(err) => warning!("Id batch {} failed: {}", index, err),
        }
    }

    Ok(out)
}
