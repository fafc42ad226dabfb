//! Configuration management for the stats synchronization core.
//!
//! This module handles loading configuration from environment variables and a
//! `.env` file in the local data directory, and defines the tuning constants
//! the synchronization core runs on: the credential refresh margin, cache
//! lifetimes, pagination sizes, inter-batch delays and per-resource hard caps.
//!
//! The configuration system follows a hierarchical approach:
//! 1. Environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. Application defaults

use std::{env, path::PathBuf, time::Duration};

/// Safety margin before credential expiry, in milliseconds.
///
/// A credential whose `expires_at` lies within this margin is due for a
/// proactive refresh and no longer counts as valid. The margin creates a
/// refresh zone distinct from the hard-invalid zone so that background
/// refresh runs before requests start failing.
pub const TOKEN_REFRESH_MARGIN_MS: i64 = 5 * 60 * 1000;

/// Interval of the background credential refresh check.
pub const REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default lifetime of a cache entry and the eviction horizon used when
/// recovering from a storage-quota failure.
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Lifetime of cached top-track and top-artist pages.
pub const TOP_LIST_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Lifetime of the cached recently-played page.
pub const RECENT_CACHE_TTL: Duration = Duration::from_secs(2 * 60);

/// Page size for offset-paginated catalog endpoints (remote maximum).
pub const PAGE_SIZE: u32 = 50;

/// Maximum number of ids per bulk-lookup call (remote maximum).
pub const ID_BATCH_SIZE: usize = 50;

/// Fixed delay between successive batch requests within one drain.
pub const BATCH_DELAY: Duration = Duration::from_millis(100);

/// Hard cap on accumulated top tracks per range selection.
pub const TRACKS_HARD_CAP: u32 = 500;

/// Hard cap on accumulated top artists per range selection.
pub const ARTISTS_HARD_CAP: u32 = 500;

/// Hard cap on ranked genres returned by the scorer pipeline.
pub const GENRES_HARD_CAP: usize = 100;

/// Loads environment variables from a `.env` file in the local data directory.
///
/// Looks for the file under the platform-specific local data directory at
/// `spotistats/.env` and loads it when present. A missing file is not an
/// error; configuration then comes from the process environment and the
/// built-in defaults.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/spotistats/.env`
/// - macOS: `~/Library/Application Support/spotistats/.env`
/// - Windows: `%LOCALAPPDATA%/spotistats/.env`
///
/// # Returns
///
/// Returns `Ok(())` if the environment file is loaded or absent, or an error
/// string if the file exists but cannot be parsed.
pub async fn load_env() -> Result<(), String> {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spotistats/.env");
    if !path.exists() {
        return Ok(());
    }

    dotenv::from_path(path).map_err(|e| e.to_string())
}

/// Returns the Spotify Web API base URL.
///
/// Retrieves the `SPOTIFY_API_URL` environment variable, falling back to the
/// public Spotify Web API endpoint. All catalog operations are issued against
/// this base.
///
/// # Example
///
/// ```
/// let api_url = spotify_api_url(); // e.g., "https://api.spotify.com/v1"
/// ```
pub fn spotify_api_url() -> String {
    env::var("SPOTIFY_API_URL").unwrap_or_else(|_| "https://api.spotify.com/v1".to_string())
}

/// Returns the base URL of the token-issuing auth server.
///
/// Retrieves the `STATS_AUTH_SERVER_URL` environment variable which points at
/// the companion server holding the OAuth session. The server exposes
/// `POST /refresh`, `GET /tokens` and `POST /logout` relative to this base.
///
/// # Example
///
/// ```
/// let auth_url = auth_server_url(); // e.g., "https://auth.example.com/api"
/// ```
pub fn auth_server_url() -> String {
    env::var("STATS_AUTH_SERVER_URL").unwrap_or_else(|_| "http://127.0.0.1:8888/api".to_string())
}
