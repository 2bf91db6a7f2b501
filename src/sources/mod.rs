pub mod youtube_api_v3;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::error::CatalogError;

pub use youtube_api_v3::YouTubeAPIv3Client;

/// Largest page the search endpoint returns, and the most ids one detail call accepts.
pub const MAX_RESULTS_PER_CALL: usize = 50;

/// Trait común para el catálogo de videos
///
/// Two RPCs, both failable, neither retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Ranked `video` results for `query`, at most `max_results` of them.
    async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<PartialSearchResult>, CatalogError>;

    /// Content details for a comma-joined list of at most 50 ids, in request order.
    async fn video_details(&self, ids: &str) -> Result<Vec<VideoDetails>, CatalogError>;

    /// Nombre del catálogo
    fn source_name(&self) -> &'static str {
        "YouTube"
    }
}

/// A search hit before its duration is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialSearchResult {
    /// Missing when the catalog returns a malformed item
    pub video_id: Option<String>,
    pub title: String,
    pub description: String,
    /// Medium-size thumbnail, if the catalog sent one
    pub thumbnail_url: Option<String>,
    /// Rank within the search response
    pub position: usize,
}

impl PartialSearchResult {
    pub fn new(video_id: impl Into<String>, title: impl Into<String>, position: usize) -> Self {
        Self {
            video_id: Some(video_id.into()),
            title: title.into(),
            description: String::new(),
            thumbnail_url: None,
            position,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }
}

/// One record of a detail lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub id: Option<String>,
    /// ISO-8601 duration as sent by the API, e.g. `PT4M13S`
    pub duration: String,
}

impl VideoDetails {
    pub fn new(id: impl Into<String>, duration: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            duration: duration.into(),
        }
    }
}

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:[.,]\d+)?S)?)?$",
    )
    .expect("static duration pattern")
});

/// Parses an ISO-8601 duration (`PT1H2M3S`, `P1DT2H`, `P0D`) into whole seconds.
///
/// Fractional seconds are truncated. Returns `None` for anything that is not
/// a duration with at least one component.
pub fn parse_duration(encoded: &str) -> Option<u64> {
    let encoded = encoded.trim();
    // "P" and "PT" match the pattern but carry no component
    if encoded.len() < 3 || encoded.ends_with('T') {
        return None;
    }
    let caps = ISO_DURATION.captures(encoded)?;

    let part = |index: usize, unit: u64| -> Option<u64> {
        match caps.get(index) {
            Some(m) => m.as_str().parse::<u64>().ok()?.checked_mul(unit),
            None => Some(0),
        }
    };

    [
        part(1, 7 * 24 * 3600)?,
        part(2, 24 * 3600)?,
        part(3, 3600)?,
        part(4, 60)?,
        part(5, 1)?,
    ]
    .into_iter()
    .try_fold(0u64, |total, seconds| total.checked_add(seconds))
}
