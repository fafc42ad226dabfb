//! Spotify Listening-Stats Synchronization Core
//!
//! This library keeps a personal listening-stats dashboard supplied with data
//! from the Spotify Web API. It manages the access-credential lifecycle,
//! maintains a persistent cache with incremental merge semantics, drains
//! paginated endpoints under a rate limit, and computes ranked genre
//! aggregations from the combined track and artist streams.
//!
//! # Modules
//!
//! - `config` - Configuration management and tuning constants
//! - `dashboard` - High-level data views consumed by UI collaborators
//! - `management` - Credential, cache, sync and session management
//! - `spotify` - Spotify Web API and auth-server client implementation
//! - `stats` - Pure aggregation and scoring functions
//! - `types` - Data structures and type definitions
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use spotistats::{dashboard::Dashboard, management::{CacheManager, FsStorage, TokenManager}};
//!
//! #[tokio::main]
//! async fn main() -> spotistats::Res<()> {
//!     let store = Arc::new(FsStorage::new());
//!     let tokens = TokenManager::new(store.clone());
//!     tokens.load().await;
//!     let dash = Dashboard::new(tokens, CacheManager::new(store));
//!     let genres = dash.top_genres().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod management;
pub mod spotify;
pub mod stats;
pub mod types;

/// A convenient Result type alias for operations that may fail.
///
/// Provides a standard error handling pattern throughout the application
/// using a boxed dynamic error trait object. This allows for flexible
/// error handling while maintaining Send + Sync bounds for async contexts.
///
/// # Type Parameters
///
/// - `T` - The success type returned on successful operations
pub type Res<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Prints an informational message with a blue bullet point.
///
/// Creates a formatted output line with a distinctive blue "o" indicator
/// followed by the provided message. Used for general information and
/// status updates throughout the application.
///
/// # Example
///
/// ```
/// info!("Refreshing access credential...");
/// info!("Merged {} new items", count);
/// ```
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a success message with a green checkmark.
///
/// Creates a formatted output line with a green "✓" indicator to signify
/// successful completion of operations.
///
/// # Example
///
/// ```
/// success!("Credential refreshed");
/// ```
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints an error message with a red exclamation mark.
///
/// Creates a formatted error output with a red "!" indicator. Reporting only;
/// callers decide how to recover, and every public entry point of this crate
/// returns a result or a partial value rather than aborting.
///
/// # Example
///
/// ```
/// error!("Session expired, re-authentication required");
/// ```
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a warning message with a yellow exclamation mark.
///
/// Creates a formatted output line with a yellow "!" indicator to highlight
/// potential issues or important notices that don't require termination.
/// Used for recoverable issues such as skipped batches or degraded caching.
///
/// # Example
///
/// ```
/// warning!("Cache write failed, continuing without cache");
/// warning!("Batch at offset {} failed: {}", offset, err);
/// ```
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
