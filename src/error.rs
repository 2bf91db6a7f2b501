//! Error types for the catalog client and the resolution protocol.

use std::{error::Error as StdError, sync::Arc};
use thiserror::Error;

/// Shared, type-erased cause attached to a [`ProviderError`].
pub type Cause = Arc<dyn StdError + Send + Sync + 'static>;

/// Failures of a single catalog RPC. Never crosses the provider's public contract.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Transport-level failure (connection, timeout, body decoding)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not the JSON we expected
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Missing or rejected API key
    #[error("YouTube API rejected the credentials: {0}")]
    Unauthorized(String),

    /// Daily quota or per-second rate limit exceeded
    #[error("YouTube API quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other non-success status
    #[error("YouTube API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Detail lookup answered with fewer records than ids requested
    #[error("YouTube API returned {received} records for {requested} ids")]
    IncompleteResponse { requested: usize, received: usize },
}

impl CatalogError {
    /// Maps an HTTP status and the API's `error.errors[].reason` onto a variant.
    pub fn from_status(code: u16, reason: Option<&str>, message: impl Into<String>) -> Self {
        let message = message.into();
        match (code, reason) {
            (403, Some("quotaExceeded" | "rateLimitExceeded" | "dailyLimitExceeded")) | (429, _) => {
                Self::QuotaExceeded(message)
            }
            (400, Some("keyInvalid" | "badRequest")) | (401, _) | (403, _) => {
                Self::Unauthorized(message)
            }
            _ => Self::Api { code, message },
        }
    }

    pub fn is_quota_error(&self) -> bool {
        matches!(self, CatalogError::QuotaExceeded(_))
    }
}

/// The only failure surfaced by the resolution protocol.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The catalog has no video with exactly this id, or it could not be reached.
    #[error("no song found for id {id}")]
    NoSuchSong {
        id: String,
        #[source]
        source: Option<Cause>,
    },
}

impl ProviderError {
    pub fn no_such_song(id: impl Into<String>) -> Self {
        Self::NoSuchSong {
            id: id.into(),
            source: None,
        }
    }

    pub fn no_such_song_caused_by<E>(id: impl Into<String>, cause: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::NoSuchSong {
            id: id.into(),
            source: Some(Arc::new(cause)),
        }
    }

    /// The requested id.
    pub fn id(&self) -> &str {
        match self {
            Self::NoSuchSong { id, .. } => id,
        }
    }

    /// Underlying failure, if any. Unlike [`StdError::source`] this can be downcast.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::NoSuchSong { source, .. } => source.as_deref(),
        }
    }
}
