use serde::Serialize;

/// A fully resolved, playable catalog entry.
///
/// The id is the catalog id that produced the song and doubles as its cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Song {
    id: String,
    title: String,
    description: String,
    /// Whole seconds
    duration: u64,
    album_art_url: Option<String>,
    provider: String,
}

impl Song {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        duration: u64,
        album_art_url: Option<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            duration,
            album_art_url,
            provider: provider.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn description(&self) -> &str {
        &self.description
    }
    pub fn duration(&self) -> u64 {
        self.duration
    }
    pub fn album_art_url(&self) -> Option<&str> {
        self.album_art_url.as_deref()
    }
    /// Id of the provider that resolved this song.
    pub fn provider(&self) -> &str {
        &self.provider
    }
}
