use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{Song, SongCache, PROVIDER_ID};
use crate::error::CatalogError;
use crate::sources::{parse_duration, CatalogClient, PartialSearchResult, VideoDetails, MAX_RESULTS_PER_CALL};

/// Turns partial search hits into songs.
///
/// Cached songs are reused as-is; the rest are looked up in chunks of at most
/// [`MAX_RESULTS_PER_CALL`] ids per detail RPC and written through to the song
/// cache. The output order always equals the input order.
pub struct BatchResolver<C: ?Sized> {
    catalog: Arc<C>,
    songs: SongCache,
}

impl<C: ?Sized> Clone for BatchResolver<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            songs: self.songs.clone(),
        }
    }
}

impl<C> BatchResolver<C>
where
    C: CatalogClient + ?Sized + 'static,
{
    pub fn new(catalog: Arc<C>, songs: SongCache) -> Self {
        Self { catalog, songs }
    }

    pub fn catalog(&self) -> &Arc<C> {
        &self.catalog
    }

    /// Resolves `results` in order.
    ///
    /// Fail-whole: if any detail RPC fails, or returns fewer records than ids
    /// requested, the whole batch resolves to an empty list. An empty output
    /// for a non-empty input therefore means "could not resolve", not "no songs".
    /// Items without an id are skipped.
    pub async fn resolve(&self, results: &[PartialSearchResult]) -> Vec<Song> {
        match self.try_resolve(results).await {
            Ok(songs) => songs,
            Err(e) => {
                error!("Video lookup failed, dropping the whole batch: {}", e);
                Vec::new()
            }
        }
    }

    /// Same as [`resolve`](Self::resolve), but hands the failing RPC's error back.
    pub async fn try_resolve(
        &self,
        results: &[PartialSearchResult],
    ) -> Result<Vec<Song>, CatalogError> {
        let mut resolved: Vec<Option<Song>> = vec![None; results.len()];
        let mut to_be_looked_up: Vec<(usize, &PartialSearchResult, &str)> = Vec::new();

        for (index, result) in results.iter().enumerate() {
            let Some(id) = result.video_id.as_deref() else {
                debug!("Skipping search result without id at position {}", result.position);
                continue;
            };
            match self.songs.get_if_present(&id.to_string()) {
                Some(song) => resolved[index] = Some(song),
                None => to_be_looked_up.push((index, result, id)),
            }
        }

        if !to_be_looked_up.is_empty() {
            debug!("Looking up search result IDs, size: {}", to_be_looked_up.len());
        }

        for chunk in to_be_looked_up.chunks(MAX_RESULTS_PER_CALL) {
            let ids = chunk
                .iter()
                .map(|(_, _, id)| *id)
                .collect::<Vec<_>>()
                .join(",");

            let videos = self.catalog.video_details(&ids).await?;

            if videos.len() < chunk.len() {
                return Err(CatalogError::IncompleteResponse {
                    requested: chunk.len(),
                    received: videos.len(),
                });
            }

            for ((index, result, id), video) in chunk.iter().zip(videos.iter()) {
                let song = create_song(result, id, video);
                self.songs.put(song.id().to_string(), song.clone());
                resolved[*index] = Some(song);
            }
        }

        Ok(resolved.into_iter().flatten().collect())
    }
}

fn create_song(result: &PartialSearchResult, id: &str, video: &VideoDetails) -> Song {
    let duration = parse_duration(&video.duration).unwrap_or_else(|| {
        warn!("Unparseable duration '{}' for video {}, using 0", video.duration, id);
        0
    });

    Song::new(
        id,
        result.title.clone(),
        result.description.clone(),
        duration,
        result.thumbnail_url.clone(),
        PROVIDER_ID,
    )
}
