//! # YouTube Provider
//!
//! Resolves free-text searches and video ids against the YouTube Data API v3
//! into playable [`Song`]s, shielding the API behind two single-flight caches.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use youtube_provider::{
//!     ProviderConfig, WatchUrlPlaybackFactory, YouTubeAPIv3Client, YouTubeProvider,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let catalog = Arc::new(YouTubeAPIv3Client::new("api-key".into())?);
//! let provider = YouTubeProvider::new(
//!     catalog,
//!     Arc::new(WatchUrlPlaybackFactory),
//!     ProviderConfig::default(),
//! );
//!
//! for song in provider.search("daft punk", 0).await {
//!     println!("{} ({}s)", song.title(), song.duration());
//! }
//! provider.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod provider;
pub mod sources;

pub use audio::{PlaybackError, PlaybackFactory, WatchUrlPlaybackFactory};
pub use cache::{CachePolicy, LoadingCache};
pub use config::Config;
pub use error::{CatalogError, ProviderError};
pub use provider::{ProviderConfig, Song, YouTubeProvider};
pub use sources::{CatalogClient, PartialSearchResult, VideoDetails, YouTubeAPIv3Client};
