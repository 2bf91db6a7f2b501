//! # Audio Module
//!
//! Seam towards the playback subsystem. The provider only resolves songs;
//! turning a resolved video id into something audible is delegated to a
//! [`PlaybackFactory`] supplied by the host.
//!
//! [`WatchUrlPlaybackFactory`] is the minimal built-in delegate: its resource
//! is the video's watch URL and its playback handle simply carries that URL
//! to whichever player the host uses.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

const WATCH_URL_PREFIX: &str = "https://www.youtube.com/watch?v=";

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("could not load video {video_id}: {reason}")]
    Load { video_id: String, reason: String },

    #[error("could not create playback for video {video_id}: {reason}")]
    Playback { video_id: String, reason: String },
}

/// Produces loadable resources and playback handles for resolved video ids.
#[async_trait]
pub trait PlaybackFactory: Send + Sync + 'static {
    type Resource: Send;
    type Playback: Send;

    /// Prepares whatever the player needs before playback can start.
    async fn load(&self, video_id: &str) -> Result<Self::Resource, PlaybackError>;

    async fn create_playback(
        &self,
        video_id: &str,
        resource: Self::Resource,
    ) -> Result<Self::Playback, PlaybackError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchUrl(pub String);

/// Playback handle carrying the watch URL of one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchUrlPlayback {
    video_id: String,
    url: String,
}

impl WatchUrlPlayback {
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WatchUrlPlaybackFactory;

#[async_trait]
impl PlaybackFactory for WatchUrlPlaybackFactory {
    type Resource = WatchUrl;
    type Playback = WatchUrlPlayback;

    async fn load(&self, video_id: &str) -> Result<WatchUrl, PlaybackError> {
        if video_id.is_empty() {
            return Err(PlaybackError::Load {
                video_id: String::new(),
                reason: "empty video id".into(),
            });
        }
        Ok(WatchUrl(format!("{}{}", WATCH_URL_PREFIX, video_id)))
    }

    async fn create_playback(
        &self,
        video_id: &str,
        resource: WatchUrl,
    ) -> Result<WatchUrlPlayback, PlaybackError> {
        debug!("🎯 Playback for {}: {}", video_id, resource.0);
        Ok(WatchUrlPlayback {
            video_id: video_id.to_string(),
            url: resource.0,
        })
    }
}
