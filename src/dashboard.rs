//! High-level data views consumed by UI collaborators.
//!
//! The dashboard wires the credential manager, the persistent cache and the
//! batch fetcher together: every view request checks the cache first, goes
//! through the credential manager's retry contract on a miss, and lands back
//! in the cache. Top-list views support progressive loading with per-resource
//! pagination progress that is discarded whenever the range selection
//! changes.

use std::sync::{Mutex, MutexGuard};

use crate::{
    config, info,
    management::{CacheManager, TokenManager, sync},
    spotify::{ApiError, SpotifyApi, fetcher},
    stats::{self, RecentSummary},
    types::{
        Artist, FetchProgress, GenreRecord, Page, PlayHistoryItem, Playlist, SavedAlbumItem,
        SavedTrackItem, TimeRange, Track, UserProfile, UserStats,
    },
};

struct ResourceSlot<T> {
    items: Vec<T>,
    progress: FetchProgress,
}

impl<T> Default for ResourceSlot<T> {
    fn default() -> Self {
        ResourceSlot {
            items: Vec::new(),
            progress: FetchProgress::default(),
        }
    }
}

struct ViewState {
    range: TimeRange,
    /// Bumped on every range change; in-flight page loads compare their
    /// starting epoch on completion and discard stale results.
    epoch: u64,
    tracks: ResourceSlot<Track>,
    artists: ResourceSlot<Artist>,
}

/// Programmatic surface of the synchronization core.
///
/// Constructed from the two injected services (credential manager, cache)
/// plus the catalog client. The cache can be disabled entirely; results are
/// then identical, only slower.
pub struct Dashboard {
    api: SpotifyApi,
    tokens: TokenManager,
    cache: CacheManager,
    cache_enabled: bool,
    state: Mutex<ViewState>,
}

impl Dashboard {
    pub fn new(tokens: TokenManager, cache: CacheManager) -> Self {
        Dashboard {
            api: SpotifyApi::new(),
            tokens,
            cache,
            cache_enabled: true,
            state: Mutex::new(ViewState {
                range: TimeRange::default(),
                epoch: 0,
                tracks: ResourceSlot::default(),
                artists: ResourceSlot::default(),
            }),
        }
    }

    pub fn with_api(mut self, api: SpotifyApi) -> Self {
        self.api = api;
        self
    }

    /// Disables or enables the cache layer. Presence of the cache never
    /// changes what a view ends up with, only how fast it gets there.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    fn lock_state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn range(&self) -> TimeRange {
        self.lock_state().range
    }

    /// Switches the ranking window. Accumulated top lists and their
    /// pagination progress belong to the old range and are dropped; page
    /// loads still in flight are discarded when they complete.
    pub fn set_range(&self, range: TimeRange) {
        let mut state = self.lock_state();
        if state.range == range {
            return;
        }
        state.range = range;
        state.epoch += 1;
        state.tracks = ResourceSlot::default();
        state.artists = ResourceSlot::default();
    }

    pub fn top_tracks_progress(&self) -> FetchProgress {
        self.lock_state().tracks.progress
    }

    pub fn top_artists_progress(&self) -> FetchProgress {
        self.lock_state().artists.progress
    }

    /// One page of top tracks, served from the cache when younger than the
    /// top-list TTL.
    pub async fn top_tracks(
        &self,
        range: TimeRange,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Track>, ApiError> {
        let key = format!("top_tracks_{}_{}_{}", range, limit, offset);
        if self.cache_enabled {
            if let Some(page) = self
                .cache
                .get::<Page<Track>>(&key, config::TOP_LIST_CACHE_TTL)
                .await
            {
                return Ok(page);
            }
        }
        let api = &self.api;
        let page = self
            .tokens
            .wrap_call(|token| async move { api.top_tracks(&token, range, limit, offset).await })
            .await?;
        if self.cache_enabled {
            self.cache.set(&key, &page).await;
        }
        Ok(page)
    }

    /// One page of top artists, served from the cache when younger than the
    /// top-list TTL.
    pub async fn top_artists(
        &self,
        range: TimeRange,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Artist>, ApiError> {
        let key = format!("top_artists_{}_{}_{}", range, limit, offset);
        if self.cache_enabled {
            if let Some(page) = self
                .cache
                .get::<Page<Artist>>(&key, config::TOP_LIST_CACHE_TTL)
                .await
            {
                return Ok(page);
            }
        }
        let api = &self.api;
        let page = self
            .tokens
            .wrap_call(|token| async move { api.top_artists(&token, range, limit, offset).await })
            .await?;
        if self.cache_enabled {
            self.cache.set(&key, &page).await;
        }
        Ok(page)
    }

    /// Appends the next page to the accumulated top tracks of the current
    /// range and returns the accumulated list.
    ///
    /// Completion sticks once a page comes back short or the hard cap is
    /// reached. A result arriving after a range change is discarded.
    pub async fn load_more_top_tracks(&self) -> Result<Vec<Track>, ApiError> {
        let (range, epoch, offset) = {
            let state = self.lock_state();
            if state.tracks.progress.complete {
                return Ok(state.tracks.items.clone());
            }
            (state.range, state.epoch, state.tracks.progress.offset)
        };

        let page = self.top_tracks(range, config::PAGE_SIZE, offset).await?;

        let mut state = self.lock_state();
        if state.epoch != epoch {
            // the range moved on while this page was in flight
            return Ok(state.tracks.items.clone());
        }
        let got = page.items.len() as u32;
        state.tracks.items.extend(page.items);
        state.tracks.items.truncate(config::TRACKS_HARD_CAP as usize);
        state.tracks.progress.offset = offset + got;
        if got < config::PAGE_SIZE || state.tracks.progress.offset >= config::TRACKS_HARD_CAP {
            state.tracks.progress.complete = true;
        }
        Ok(state.tracks.items.clone())
    }

    /// Appends the next page to the accumulated top artists of the current
    /// range and returns the accumulated list.
    pub async fn load_more_top_artists(&self) -> Result<Vec<Artist>, ApiError> {
        let (range, epoch, offset) = {
            let state = self.lock_state();
            if state.artists.progress.complete {
                return Ok(state.artists.items.clone());
            }
            (state.range, state.epoch, state.artists.progress.offset)
        };

        let page = self.top_artists(range, config::PAGE_SIZE, offset).await?;

        let mut state = self.lock_state();
        if state.epoch != epoch {
            return Ok(state.artists.items.clone());
        }
        let got = page.items.len() as u32;
        state.artists.items.extend(page.items);
        state
            .artists
            .items
            .truncate(config::ARTISTS_HARD_CAP as usize);
        state.artists.progress.offset = offset + got;
        if got < config::PAGE_SIZE || state.artists.progress.offset >= config::ARTISTS_HARD_CAP {
            state.artists.progress.complete = true;
        }
        Ok(state.artists.items.clone())
    }

    /// Ranked genres for the current range.
    ///
    /// Drains top tracks and top artists up to their caps (the two drains run
    /// concurrently; batches within each are sequential), resolves artists
    /// referenced only by tracks through the bulk lookup, and scores the
    /// union.
    pub async fn top_genres(&self) -> Result<Vec<GenreRecord>, ApiError> {
        let range = self.range();
        let (tracks, artists) = tokio::join!(
            fetcher::fetch_all(
                |limit, offset| self.top_tracks(range, limit, offset),
                config::PAGE_SIZE,
                config::TRACKS_HARD_CAP,
            ),
            fetcher::fetch_all(
                |limit, offset| self.top_artists(range, limit, offset),
                config::PAGE_SIZE,
                config::ARTISTS_HARD_CAP,
            ),
        );
        let tracks = tracks?;
        let artists = artists?;

        let missing = stats::missing_artist_ids(&tracks.items, &artists.items);
        if !missing.is_empty() {
            info!("Resolving {} artists referenced only by tracks", missing.len());
        }
        let additional = fetcher::fetch_by_ids(
            &missing,
            |chunk| self.artists_chunk(chunk),
            config::ID_BATCH_SIZE,
        )
        .await?;

        let mut genres = stats::calculate_top_genres(&tracks.items, &artists.items, &additional);
        genres.truncate(config::GENRES_HARD_CAP);
        Ok(genres)
    }

    /// Recently played tracks, cached briefly.
    pub async fn recently_played(&self, limit: u32) -> Result<Page<PlayHistoryItem>, ApiError> {
        let key = format!("recently_played_{}", limit);
        if self.cache_enabled {
            if let Some(page) = self
                .cache
                .get::<Page<PlayHistoryItem>>(&key, config::RECENT_CACHE_TTL)
                .await
            {
                return Ok(page);
            }
        }
        let api = &self.api;
        let page = self
            .tokens
            .wrap_call(|token| async move { api.recently_played(&token, limit).await })
            .await?;
        if self.cache_enabled {
            self.cache.set(&key, &page).await;
        }
        Ok(page)
    }

    /// Per-artist and per-album play counts of the recent listening window.
    pub async fn recently_played_summary(&self, limit: u32) -> Result<RecentSummary, ApiError> {
        let page = self.recently_played(limit).await?;
        Ok(stats::summarize_recently_played(&page.items))
    }

    /// The saved-track library, kept current through incremental sync.
    pub async fn saved_tracks(
        &self,
        force_refresh: bool,
    ) -> Result<Page<SavedTrackItem>, ApiError> {
        let fetch = |limit, offset| self.saved_tracks_page(limit, offset);
        if !self.cache_enabled {
            return sync::drain_all(fetch).await;
        }
        sync::fetch_library_with_cache(
            &self.cache,
            "saved_tracks",
            fetch,
            saved_track_added_at,
            saved_track_identity,
            force_refresh,
        )
        .await
    }

    /// The saved-album library, kept current through incremental sync.
    pub async fn saved_albums(
        &self,
        force_refresh: bool,
    ) -> Result<Page<SavedAlbumItem>, ApiError> {
        let fetch = |limit, offset| self.saved_albums_page(limit, offset);
        if !self.cache_enabled {
            return sync::drain_all(fetch).await;
        }
        sync::fetch_library_with_cache(
            &self.cache,
            "saved_albums",
            fetch,
            saved_album_added_at,
            saved_album_identity,
            force_refresh,
        )
        .await
    }

    /// Library-wide counters: playlist totals and visibility split, saved
    /// items and followed artists. One-page probes, issued concurrently.
    pub async fn user_stats(&self) -> Result<UserStats, ApiError> {
        let (playlists, saved_tracks, saved_albums, followed) = tokio::join!(
            self.playlists_page(config::PAGE_SIZE, 0),
            self.saved_tracks_page(1, 0),
            self.saved_albums_page(1, 0),
            self.followed_artists_page(1),
        );
        let playlists = playlists?;

        Ok(UserStats {
            playlists: playlists.total,
            public_playlists: playlists.items.iter().filter(|p| p.public).count() as u32,
            collaborative_playlists: playlists
                .items
                .iter()
                .filter(|p| p.collaborative)
                .count() as u32,
            saved_tracks: saved_tracks?.total,
            saved_albums: saved_albums?.total,
            followed_artists: followed?.total,
        })
    }

    /// The current user's profile record.
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let api = &self.api;
        self.tokens
            .wrap_call(|token| async move { api.profile(&token).await })
            .await
    }

    /// Evicts cache entries past the cache horizon, typically once at
    /// startup.
    pub async fn evict_stale_cache(&self) {
        self.cache.clear_old().await;
    }

    async fn saved_tracks_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Page<SavedTrackItem>, ApiError> {
        let api = &self.api;
        self.tokens
            .wrap_call(|token| async move { api.saved_tracks(&token, limit, offset).await })
            .await
    }

    async fn saved_albums_page(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Page<SavedAlbumItem>, ApiError> {
        let api = &self.api;
        self.tokens
            .wrap_call(|token| async move { api.saved_albums(&token, limit, offset).await })
            .await
    }

    async fn playlists_page(&self, limit: u32, offset: u32) -> Result<Page<Playlist>, ApiError> {
        let api = &self.api;
        self.tokens
            .wrap_call(|token| async move { api.playlists(&token, limit, offset).await })
            .await
    }

    async fn followed_artists_page(&self, limit: u32) -> Result<Page<Artist>, ApiError> {
        let api = &self.api;
        self.tokens
            .wrap_call(|token| async move { api.followed_artists(&token, limit).await })
            .await
    }

    async fn artists_chunk(&self, ids: Vec<String>) -> Result<Vec<Artist>, ApiError> {
        let api = &self.api;
        self.tokens
            .wrap_call(|token| {
                let ids = ids.clone();
                async move { api.artists_by_ids(&token, &ids).await }
            })
            .await
    }
}

fn saved_track_added_at(item: &SavedTrackItem) -> &str {
    &item.added_at
}

fn saved_track_identity(item: &SavedTrackItem) -> String {
    item.track.id.clone()
}

fn saved_album_added_at(item: &SavedAlbumItem) -> &str {
    &item.added_at
}

fn saved_album_identity(item: &SavedAlbumItem) -> String {
    item.album.id.clone()
}
