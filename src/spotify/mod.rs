//! # Spotify Integration Module
//!
//! This module provides the HTTP client layer of the synchronization core:
//! the token-issuing auth server client, the read-only Spotify Web API
//! catalog client, and the rate-limited batch fetcher that assembles bounded
//! result sets from paginated endpoints.
//!
//! ## Architecture
//!
//! ```text
//! Dashboard / Management Layer
//!          ↓
//! Spotify Integration Layer
//!     ├── Auth Server Client (refresh exchange, bootstrap, logout)
//!     ├── Catalog Client (tops, library, playlists, history, lookup)
//!     └── Batch Fetcher (offset drains, id chunking, rate spacing)
//!          ↓
//! HTTP Layer (reqwest, JSON)
//! ```
//!
//! ## Error Handling Philosophy
//!
//! - **401 Unauthorized** is surfaced as [`ApiError::Unauthorized`] so the
//!   credential manager's `wrap_call` can refresh and retry exactly once.
//! - **429 Too Many Requests** is absorbed inside the catalog client with a
//!   single bounded `Retry-After` wait.
//! - Any other transport or service error becomes [`ApiError::Network`] and
//!   is treated by the fetch loops as a per-batch failure: logged, skipped,
//!   surfaced only as an undercount.
//! - A failed refresh exchange is terminal for the session and carried as
//!   [`ApiError::Auth`].

use std::fmt;

use crate::management::AuthError;

pub mod auth;
pub mod catalog;
pub mod fetcher;

pub use auth::AuthClient;
pub use catalog::SpotifyApi;

#[derive(Debug)]
pub enum ApiError {
    /// The remote rejected the access credential for a single request.
    Unauthorized,
    /// The credential lifecycle gave up; the session must be re-established.
    Auth(AuthError),
    /// Transport failure or non-auth service error.
    Network(reqwest::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "request rejected: credential not accepted"),
            ApiError::Auth(err) => write!(f, "{}", err),
            ApiError::Network(err) => write!(f, "network error: {}", err),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Network(err) => Some(err),
            ApiError::Auth(err) => Some(err),
            ApiError::Unauthorized => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Network(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}
