use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::time::sleep;

use crate::{
    config,
    spotify::ApiError,
    types::{
        Artist, ArtistsResponse, FollowedArtistsResponse, Page, PlayHistoryItem, Playlist,
        RecentlyPlayedResponse, SavedAlbumItem, SavedTrackItem, TimeRange, Track, UserProfile,
    },
    warning,
};

/// Read-only client for the paginated catalog endpoints of the Spotify
/// Web API.
///
/// Every call takes the bearer token as an argument; credential freshness and
/// the retry-on-401 contract live in the credential manager, not here. The
/// client maps a 401 to [`ApiError::Unauthorized`] and absorbs a single 429
/// by honoring the `Retry-After` header up to a bound.
#[derive(Clone)]
pub struct SpotifyApi {
    client: Client,
    base_url: String,
}

impl SpotifyApi {
    pub fn new() -> Self {
        Self::with_base_url(config::spotify_api_url())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        SpotifyApi {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        path_and_query: &str,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let mut retried = false;

        loop {
            let response = self
                .client
                .get(&url)
                .bearer_auth(token)
                .send()
                .await
                .map_err(ApiError::Network)?;

            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(ApiError::Unauthorized);
            }

            // check for retry-after header
            if response.status() == StatusCode::TOO_MANY_REQUESTS && !retried {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                if retry_after <= 120 {
                    sleep(Duration::from_secs(retry_after)).await;
                    retried = true;
                    continue; // retry
                }
                warning!(
                    "Rate limited for {} seconds, giving up on this request.",
                    retry_after
                );
            }

            let response = response.error_for_status().map_err(ApiError::Network)?;
            return response.json::<T>().await.map_err(ApiError::Network);
        }
    }

    /// Retrieves one page of the user's top tracks for a time range.
    ///
    /// # Arguments
    ///
    /// * `token` - Valid access token for API authentication
    /// * `range` - Ranking window (short, medium or long term)
    /// * `limit` - Maximum number of tracks in this page (1-50)
    /// * `offset` - Index of the first track to return
    pub async fn top_tracks(
        &self,
        token: &str,
        range: TimeRange,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Track>, ApiError> {
        self.get_json(
            token,
            &format!(
                "/me/top/tracks?time_range={range}&limit={limit}&offset={offset}",
                range = range,
                limit = limit,
                offset = offset
            ),
        )
        .await
    }

    /// Retrieves one page of the user's top artists for a time range.
    pub async fn top_artists(
        &self,
        token: &str,
        range: TimeRange,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Artist>, ApiError> {
        self.get_json(
            token,
            &format!(
                "/me/top/artists?time_range={range}&limit={limit}&offset={offset}",
                range = range,
                limit = limit,
                offset = offset
            ),
        )
        .await
    }

    /// Retrieves full artist records for up to 50 ids in one call.
    ///
    /// Used to resolve artists referenced by tracks that are absent from the
    /// top-artist list, so the genre scorer can see their genre tags.
    pub async fn artists_by_ids(
        &self,
        token: &str,
        ids: &[String],
    ) -> Result<Vec<Artist>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.join(",");
        let response: ArtistsResponse = self
            .get_json(token, &format!("/artists?ids={}", joined))
            .await?;
        Ok(response.artists)
    }

    /// Retrieves the most recently played tracks.
    ///
    /// The endpoint is cursor-based and reports no total; the page total is
    /// normalized to the number of returned items.
    pub async fn recently_played(
        &self,
        token: &str,
        limit: u32,
    ) -> Result<Page<PlayHistoryItem>, ApiError> {
        let response: RecentlyPlayedResponse = self
            .get_json(token, &format!("/me/player/recently-played?limit={}", limit))
            .await?;
        Ok(Page {
            total: response.items.len() as u32,
            items: response.items,
        })
    }

    /// Retrieves one page of the user's saved tracks, newest first.
    pub async fn saved_tracks(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<SavedTrackItem>, ApiError> {
        self.get_json(token, &format!("/me/tracks?limit={}&offset={}", limit, offset))
            .await
    }

    /// Retrieves one page of the user's saved albums, newest first.
    pub async fn saved_albums(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<SavedAlbumItem>, ApiError> {
        self.get_json(token, &format!("/me/albums?limit={}&offset={}", limit, offset))
            .await
    }

    /// Retrieves one page of the user's playlists.
    pub async fn playlists(
        &self,
        token: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Page<Playlist>, ApiError> {
        self.get_json(
            token,
            &format!("/me/playlists?limit={}&offset={}", limit, offset),
        )
        .await
    }

    /// Retrieves one page of followed artists together with the total count.
    pub async fn followed_artists(
        &self,
        token: &str,
        limit: u32,
    ) -> Result<Page<Artist>, ApiError> {
        let response: FollowedArtistsResponse = self
            .get_json(
                token,
                &format!("/me/following?type=artist&limit={}", limit),
            )
            .await?;
        let items = response.artists.items;
        Ok(Page {
            total: response.artists.total.unwrap_or(items.len() as u32),
            items,
        })
    }

    /// Retrieves the current user's profile.
    pub async fn profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.get_json(token, "/me").await
    }
}

impl Default for SpotifyApi {
    fn default() -> Self {
        Self::new()
    }
}
