//! # Provider Module
//!
//! The public resolution protocol: [`YouTubeProvider::search`],
//! [`YouTubeProvider::lookup`] and [`YouTubeProvider::shutdown`].
//!
//! Two [`LoadingCache`]s sit in front of the catalog:
//!
//! - **songs**: video id → [`Song`]
//! - **searches**: trimmed query → first page of songs
//!
//! Every song that ends up in a search result is also written to the song
//! cache, so a later `lookup` of the same id costs no RPC.

pub mod resolver;
pub mod song;

use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{PlaybackError, PlaybackFactory},
    cache::{CacheError, CachePolicy, CacheStats, LoadingCache},
    error::ProviderError,
    sources::{CatalogClient, MAX_RESULTS_PER_CALL},
};

pub use resolver::BatchResolver;
pub use song::Song;

pub const PROVIDER_ID: &str = "youtube";
pub const PROVIDER_NAME: &str = "YouTube";
pub const PROVIDER_DESCRIPTION: &str = "Provides YouTube videos/songs";

/// Only the first hit matters when looking up an id.
const LOOKUP_MAX_RESULTS: u32 = 1;

pub type SongCache = LoadingCache<String, Song, ProviderError>;
pub type SearchCache = LoadingCache<String, Vec<Song>, Infallible>;

/// Cache sizing for a provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderConfig {
    pub songs: CachePolicy,
    pub searches: CachePolicy,
    /// Expired-entry sweep period; `None` leaves expiry to reads alone
    pub cleanup_interval: Option<Duration>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            songs: CachePolicy::SONGS,
            searches: CachePolicy::SEARCHES,
            cleanup_interval: Some(Duration::from_secs(300)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderCacheStats {
    pub songs: CacheStats,
    pub searches: CacheStats,
}

/// Song provider backed by the YouTube catalog.
///
/// `C` is the catalog RPC client, `P` the playback delegate. Both are supplied
/// by the host; the provider never reads global configuration.
pub struct YouTubeProvider<C: ?Sized, P> {
    resolver: BatchResolver<C>,
    playback: Arc<P>,
    songs: SongCache,
    searches: SearchCache,
    cleanup_tasks: Vec<JoinHandle<()>>,
}

impl<C, P> YouTubeProvider<C, P>
where
    C: CatalogClient + ?Sized + 'static,
    P: PlaybackFactory,
{
    /// Creates both caches. Must run inside a tokio runtime when a cleanup
    /// interval is configured.
    pub fn new(catalog: Arc<C>, playback: Arc<P>, config: ProviderConfig) -> Self {
        let songs = SongCache::new("songs", config.songs);
        let searches = SearchCache::new("searches", config.searches);

        let cleanup_tasks = match config.cleanup_interval {
            Some(every) => vec![songs.spawn_cleanup(every), searches.spawn_cleanup(every)],
            None => Vec::new(),
        };

        info!(
            "🎵 {} provider ready (songs: {} entries, searches: {} entries)",
            PROVIDER_NAME, config.songs.max_size, config.searches.max_size
        );

        Self {
            resolver: BatchResolver::new(catalog, songs.clone()),
            playback,
            songs,
            searches,
            cleanup_tasks,
        }
    }

    pub fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    pub fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn subject(&self) -> &'static str {
        self.name()
    }

    pub fn description(&self) -> &'static str {
        PROVIDER_DESCRIPTION
    }

    /// Searches the catalog.
    ///
    /// Never fails: network problems are logged and yield an empty list. Only
    /// the first page (`offset == 0`) is served from cache. Any other offset
    /// always hits the network and then replaces the cached entry for the
    /// query with its own, shifted, result.
    pub async fn search(&self, query: &str, offset: usize) -> Vec<Song> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        if offset == 0 {
            let resolver = self.resolver.clone();
            let owned_query = query.to_string();
            let load = async move { Ok(actual_search(&resolver, &owned_query, 0).await) };

            match self.searches.get(query.to_string(), load).await {
                Ok(songs) => songs,
                Err(e) => {
                    warn!("Error during search for {}: {}", query, e);
                    Vec::new()
                }
            }
        } else {
            // FIXME: this replaces the first page with an offset-shifted list, so a
            // later offset-0 search may be served shifted results until expiry
            let songs = actual_search(&self.resolver, query, offset).await;
            self.searches.put(query.to_string(), songs.clone());
            songs
        }
    }

    /// Resolves a single video id.
    ///
    /// Fails with [`ProviderError::NoSuchSong`] when the catalog has no video
    /// with exactly this id, or when it could not be asked.
    pub async fn lookup(&self, id: &str) -> Result<Song, ProviderError> {
        let load = lookup_song(self.resolver.clone(), id.to_string());

        self.songs
            .get(id.to_string(), load)
            .await
            .map_err(|e| match e {
                CacheError::Load(err) => err.as_ref().clone(),
                other => ProviderError::no_such_song_caused_by(id, other),
            })
    }

    /// Hands the resolved song's id to the playback delegate.
    pub async fn load_song(&self, song: &Song) -> Result<P::Resource, PlaybackError> {
        self.playback.load(song.id()).await
    }

    pub async fn supply_playback(
        &self,
        song: &Song,
        resource: P::Resource,
    ) -> Result<P::Playback, PlaybackError> {
        self.playback.create_playback(song.id(), resource).await
    }

    pub fn cache_stats(&self) -> ProviderCacheStats {
        ProviderCacheStats {
            songs: self.songs.stats(),
            searches: self.searches.stats(),
        }
    }

    /// Cancels outstanding loads and the cleanup tasks. Does not wait for them.
    pub fn shutdown(&self) {
        info!("⚠️ Shutting down {} provider", PROVIDER_NAME);
        self.songs.shutdown();
        self.searches.shutdown();
        for task in &self.cleanup_tasks {
            task.abort();
        }
    }
}

/// One uncached search RPC, sliced to the requested window and resolved.
async fn actual_search<C>(resolver: &BatchResolver<C>, query: &str, offset: usize) -> Vec<Song>
where
    C: CatalogClient + ?Sized + 'static,
{
    if query.trim().is_empty() {
        return Vec::new();
    }

    debug!("Actually searching with offset {}: {}", offset, query);

    let results = match resolver
        .catalog()
        .search(query, MAX_RESULTS_PER_CALL as u32)
        .await
    {
        Ok(results) => results,
        Err(e) => {
            error!("Search for '{}' failed: {}", query, e);
            return Vec::new();
        }
    };

    let window = page_window(results.len(), offset);
    let fixed_results: Vec<_> = results[window]
        .iter()
        .filter(|result| result.video_id.is_some())
        .cloned()
        .collect();

    resolver.resolve(&fixed_results).await
}

/// `[min(offset, count - 1), min(count, 50))`, clamped to a valid range.
///
/// Offsets past the page clamp to its last item; no further page is fetched.
fn page_window(count: usize, offset: usize) -> std::ops::Range<usize> {
    let end = count.min(MAX_RESULTS_PER_CALL);
    let start = offset.min(count.saturating_sub(1)).min(end);
    start..end
}

/// Song cache loader: searches for the id itself and accepts only an exact match.
async fn lookup_song<C>(resolver: BatchResolver<C>, id: String) -> Result<Song, ProviderError>
where
    C: CatalogClient + ?Sized + 'static,
{
    debug!("Looking up ID {}", id);

    let results = resolver
        .catalog()
        .search(&id, LOOKUP_MAX_RESULTS)
        .await
        .map_err(|e| {
            error!("Error looking up song {}: {}", id, e);
            ProviderError::no_such_song_caused_by(&id, e)
        })?;

    let Some(first) = results.into_iter().next() else {
        return Err(ProviderError::no_such_song(id));
    };

    if first.video_id.as_deref() != Some(id.as_str()) {
        debug!(
            "First hit for {} is {:?}, not an exact match",
            id, first.video_id
        );
        return Err(ProviderError::no_such_song(id));
    }

    resolver
        .try_resolve(std::slice::from_ref(&first))
        .await
        .map_err(|e| {
            error!("Error resolving song {}: {}", id, e);
            ProviderError::no_such_song_caused_by(&id, e)
        })?
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::no_such_song(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::WatchUrlPlaybackFactory,
        error::CatalogError,
        sources::{MockCatalogClient, PartialSearchResult, VideoDetails},
    };
    use pretty_assertions::assert_eq;

    fn hits(ids: &[&str]) -> Vec<PartialSearchResult> {
        ids.iter()
            .enumerate()
            .map(|(position, id)| PartialSearchResult::new(*id, format!("title {}", id), position))
            .collect()
    }

    fn details_for(ids: &str) -> Vec<VideoDetails> {
        ids.split(',').map(|id| VideoDetails::new(id, "PT3M")).collect()
    }

    fn provider(mock: MockCatalogClient) -> YouTubeProvider<MockCatalogClient, WatchUrlPlaybackFactory> {
        let config = ProviderConfig {
            cleanup_interval: None,
            ..ProviderConfig::default()
        };
        YouTubeProvider::new(Arc::new(mock), Arc::new(WatchUrlPlaybackFactory), config)
    }

    fn ids(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(Song::id).collect()
    }

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(0, 0), 0..0);
        assert_eq!(page_window(0, 7), 0..0);
        assert_eq!(page_window(10, 0), 0..10);
        assert_eq!(page_window(10, 3), 3..10);
        // Offsets past the page clamp to the last item
        assert_eq!(page_window(10, 25), 9..10);
        assert_eq!(page_window(80, 0), 0..50);
        assert_eq!(page_window(80, 60), 50..50);
    }

    #[tokio::test]
    async fn test_blank_query_skips_network() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search().never();
        mock.expect_video_details().never();
        let provider = provider(mock);

        assert!(provider.search("", 0).await.is_empty());
        assert!(provider.search("   ", 0).await.is_empty());
        assert!(provider.search(" \t", 3).await.is_empty());
        assert_eq!(provider.cache_stats().searches.entries, 0);
    }

    #[tokio::test]
    async fn test_first_page_is_cached_under_trimmed_query() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search()
            .withf(|query: &str, max: &u32| query == "daft punk" && *max == 50)
            .times(1)
            .returning(|_, _| Ok(hits(&["a", "b"])));
        mock.expect_video_details()
            .times(1)
            .returning(|ids| Ok(details_for(ids)));
        let provider = provider(mock);

        let first = provider.search("  daft punk ", 0).await;
        let second = provider.search("daft punk", 0).await;

        assert_eq!(ids(&first), vec!["a", "b"]);
        assert_eq!(first, second);
        assert_eq!(first[0].duration(), 180);
    }

    #[tokio::test]
    async fn test_search_failure_yields_empty_list() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search().times(2).returning(|_, _| {
            Err(CatalogError::Api {
                code: 503,
                message: "unavailable".into(),
            })
        });
        mock.expect_video_details().never();
        let provider = provider(mock);

        assert!(provider.search("query", 0).await.is_empty());
        // The degraded first page is cached like any other result
        assert!(provider.search("query", 0).await.is_empty());
        assert!(provider.search("query", 2).await.is_empty());
    }

    #[tokio::test]
    async fn test_offset_search_bypasses_and_overwrites_cache() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search()
            .times(2)
            .returning(|_, _| Ok(hits(&["a", "b", "c", "d"])));
        mock.expect_video_details()
            .returning(|ids| Ok(details_for(ids)));
        let provider = provider(mock);

        assert_eq!(ids(&provider.search("q", 0).await), vec!["a", "b", "c", "d"]);
        assert_eq!(ids(&provider.search("q", 2).await), vec!["c", "d"]);

        // The shifted page now answers first-page requests
        assert_eq!(ids(&provider.search("q", 0).await), vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_search_filters_results_without_id() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search().returning(|_, _| {
            let mut results = hits(&["a", "b", "c"]);
            results[1].video_id = None;
            Ok(results)
        });
        mock.expect_video_details()
            .withf(|ids: &str| ids == "a,c")
            .returning(|ids| Ok(details_for(ids)));
        let provider = provider(mock);

        assert_eq!(ids(&provider.search("q", 0).await), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_search_writes_through_to_song_cache() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search()
            .times(1)
            .returning(|_, _| Ok(hits(&["a", "b"])));
        mock.expect_video_details()
            .times(1)
            .returning(|ids| Ok(details_for(ids)));
        let provider = provider(mock);

        let found = provider.search("q", 0).await;
        let looked_up = provider.lookup("b").await.unwrap();

        assert_eq!(looked_up, found[1]);
    }

    #[tokio::test]
    async fn test_lookup_exact_match() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search()
            .withf(|query: &str, _: &u32| query == "dQw4w9WgXcQ")
            .times(1)
            .returning(|_, _| {
                Ok(vec![PartialSearchResult::new("dQw4w9WgXcQ", "Never Gonna Give You Up", 0)
                    .with_thumbnail("https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg")])
            });
        mock.expect_video_details()
            .withf(|ids: &str| ids == "dQw4w9WgXcQ")
            .times(1)
            .returning(|_| Ok(vec![VideoDetails::new("dQw4w9WgXcQ", "PT3M33S")]));
        let provider = provider(mock);

        let song = provider.lookup("dQw4w9WgXcQ").await.unwrap();
        assert_eq!(song.title(), "Never Gonna Give You Up");
        assert_eq!(song.duration(), 213);
        assert_eq!(song.provider(), PROVIDER_ID);
        assert_eq!(
            song.album_art_url(),
            Some("https://i.ytimg.com/vi/dQw4w9WgXcQ/mqdefault.jpg")
        );

        // Second lookup is served from the song cache
        assert_eq!(provider.lookup("dQw4w9WgXcQ").await.unwrap(), song);
    }

    #[tokio::test]
    async fn test_lookup_rejects_near_match() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search()
            .returning(|_, _| Ok(hits(&["dQw4w9WgXcq"])));
        mock.expect_video_details().never();
        let provider = provider(mock);

        let err = provider.lookup("dQw4w9WgXcQ").await.unwrap_err();
        assert_eq!(err.id(), "dQw4w9WgXcQ");
        assert!(err.cause().is_none());
    }

    #[tokio::test]
    async fn test_lookup_without_results() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search().returning(|_, _| Ok(Vec::new()));
        let provider = provider(mock);

        assert!(matches!(
            provider.lookup("missing").await,
            Err(ProviderError::NoSuchSong { .. })
        ));
    }

    #[tokio::test]
    async fn test_lookup_network_failure_wraps_cause() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search()
            .times(2)
            .returning(|_, _| Err(CatalogError::QuotaExceeded("daily limit".into())));
        let provider = provider(mock);

        let err = provider.lookup("abc").await.unwrap_err();
        let cause = err.cause().and_then(|c| c.downcast_ref::<CatalogError>());
        assert!(matches!(cause, Some(CatalogError::QuotaExceeded(_))));

        // The failure was not cached
        assert!(provider.lookup("abc").await.is_err());
        assert_eq!(provider.cache_stats().songs.load_failures, 2);
    }

    #[tokio::test]
    async fn test_lookup_detail_failure_wraps_cause() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search().returning(|_, _| Ok(hits(&["abc"])));
        mock.expect_video_details()
            .times(1)
            .returning(|_| Err(CatalogError::QuotaExceeded("daily limit".into())));
        let provider = provider(mock);

        let err = provider.lookup("abc").await.unwrap_err();
        assert_eq!(err.id(), "abc");
        let cause = err.cause().and_then(|c| c.downcast_ref::<CatalogError>());
        assert!(matches!(cause, Some(CatalogError::QuotaExceeded(_))));
        assert_eq!(provider.cache_stats().songs.entries, 0);
    }

    #[tokio::test]
    async fn test_lookup_after_shutdown_is_not_found() {
        let mut mock = MockCatalogClient::new();
        mock.expect_search().returning(|_, _| Ok(hits(&["abc"])));
        mock.expect_video_details()
            .returning(|ids| Ok(details_for(ids)));
        let provider = provider(mock);

        let cached = provider.lookup("abc").await.unwrap();
        provider.shutdown();

        // Cached entries survive shutdown, new loads are cancelled
        assert_eq!(provider.lookup("abc").await.unwrap(), cached);
        let err = provider.lookup("other").await.unwrap_err();
        assert_eq!(err.id(), "other");
        assert!(err.cause().is_some());
    }

    #[tokio::test]
    async fn test_playback_delegation() {
        let mock = MockCatalogClient::new();
        let provider = provider(mock);
        let song = Song::new("abc", "t", "d", 1, None, PROVIDER_ID);

        let resource = provider.load_song(&song).await.unwrap();
        let playback = provider.supply_playback(&song, resource).await.unwrap();
        assert_eq!(playback.video_id(), "abc");
        assert_eq!(playback.url(), "https://www.youtube.com/watch?v=abc");
        assert_eq!(provider.description(), "Provides YouTube videos/songs");
        assert_eq!(provider.subject(), provider.name());
    }
}
