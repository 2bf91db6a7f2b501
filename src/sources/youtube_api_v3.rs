use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use tracing::{debug, error, info};

use super::{CatalogClient, PartialSearchResult, VideoDetails};
use crate::error::CatalogError;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const SEARCH_RESULT_PARTS: &str = "id,snippet";
const VIDEO_RESULT_PARTS: &str = "contentDetails";
const SEARCH_TYPE: &str = "video";

#[derive(Debug, Deserialize)]
struct SearchListResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    id: Option<ResourceId>,
    #[serde(default)]
    snippet: Option<Snippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

/// reqwest-backed client for the YouTube Data API v3.
pub struct YouTubeAPIv3Client {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl YouTubeAPIv3Client {
    pub fn new(api_key: String) -> Result<Self, CatalogError> {
        Self::with_options(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        api_key: String,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = Self::api_error(status.as_u16(), &body);
            error!("❌ YouTube API error on {}: {}", endpoint, err);
            return Err(err);
        }

        Ok(serde_json::from_str(&body)?)
    }

    fn api_error(code: u16, body: &str) -> CatalogError {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let reason = envelope
                    .error
                    .errors
                    .iter()
                    .find_map(|detail| detail.reason.as_deref());
                CatalogError::from_status(code, reason, envelope.error.message)
            }
            Err(_) => CatalogError::from_status(code, None, body.to_string()),
        }
    }

    fn to_partial_results(response: SearchListResponse) -> Vec<PartialSearchResult> {
        response
            .items
            .into_iter()
            .enumerate()
            .map(|(position, item)| {
                let snippet = item.snippet.unwrap_or_default();
                PartialSearchResult {
                    video_id: item.id.and_then(|id| id.video_id),
                    title: snippet.title,
                    description: snippet.description,
                    thumbnail_url: snippet.thumbnails.medium.map(|t| t.url),
                    position,
                }
            })
            .collect()
    }

    fn to_video_details(response: VideoListResponse) -> Vec<VideoDetails> {
        response
            .items
            .into_iter()
            .map(|item| VideoDetails {
                id: item.id,
                duration: item
                    .content_details
                    .map(|details| details.duration)
                    .unwrap_or_default(),
            })
            .collect()
    }
}

#[async_trait]
impl CatalogClient for YouTubeAPIv3Client {
    async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<PartialSearchResult>, CatalogError> {
        debug!("🔍 YouTube API v3 search: {}", query);

        let max_results = max_results.to_string();
        let response: SearchListResponse = self
            .get_json(
                "search",
                &[
                    ("part", SEARCH_RESULT_PARTS),
                    ("q", query),
                    ("type", SEARCH_TYPE),
                    ("maxResults", max_results.as_str()),
                ],
            )
            .await?;

        let results = Self::to_partial_results(response);
        info!("✅ YouTube API v3: {} results for '{}'", results.len(), query);
        Ok(results)
    }

    async fn video_details(&self, ids: &str) -> Result<Vec<VideoDetails>, CatalogError> {
        debug!("YouTube API v3 video details: {}", ids);

        let response: VideoListResponse = self
            .get_json("videos", &[("part", VIDEO_RESULT_PARTS), ("id", ids)])
            .await?;

        Ok(Self::to_video_details(response))
    }

    fn source_name(&self) -> &'static str {
        "YouTube API v3"
    }
}
