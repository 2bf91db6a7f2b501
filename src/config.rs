use anyhow::{Context, Result};
use std::{fmt, str::FromStr, time::Duration};

use crate::{
    cache::CachePolicy,
    provider::ProviderConfig,
    sources::youtube_api_v3::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT},
};

#[derive(Clone)]
pub struct Config {
    // YouTube
    pub youtube_api_key: String,
    pub api_base_url: String,
    pub http_timeout: Duration,

    // Caché
    pub song_cache_size: usize,
    pub song_cache_tti: Duration,
    pub search_cache_size: usize,
    pub search_cache_tti: Duration,
    pub cleanup_interval: Duration,

    // Rendimiento
    pub worker_threads: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // YouTube
            youtube_api_key: std::env::var("YOUTUBE_API_KEY")
                .context("YOUTUBE_API_KEY must be set")?,
            api_base_url: std::env::var("YOUTUBE_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            http_timeout: env_duration("HTTP_TIMEOUT", DEFAULT_TIMEOUT)?,

            // Caché
            song_cache_size: env_or("SONG_CACHE_SIZE", CachePolicy::SONGS.max_size)?,
            song_cache_tti: env_duration(
                "SONG_CACHE_TTI",
                CachePolicy::SONGS.expire_after_access,
            )?,
            search_cache_size: env_or("SEARCH_CACHE_SIZE", CachePolicy::SEARCHES.max_size)?,
            search_cache_tti: env_duration(
                "SEARCH_CACHE_TTI",
                CachePolicy::SEARCHES.expire_after_access,
            )?,
            cleanup_interval: env_duration("CACHE_CLEANUP_INTERVAL", Duration::from_secs(300))?,

            // Rendimiento
            worker_threads: match std::env::var("WORKER_THREADS") {
                Ok(val) if !val.trim().is_empty() => val
                    .trim()
                    .parse()
                    .context("WORKER_THREADS must be a number")?,
                _ => num_cpus::get(),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The API key must not be blank
    /// - Cache sizes and expiry times must be greater than zero
    /// - At least one worker thread
    pub fn validate(&self) -> Result<()> {
        if self.youtube_api_key.trim().is_empty() {
            anyhow::bail!("YOUTUBE_API_KEY must not be empty");
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("HTTP timeout must be greater than 0");
        }

        if self.song_cache_size == 0 || self.search_cache_size == 0 {
            anyhow::bail!("Cache sizes must be greater than 0");
        }

        if self.song_cache_tti.is_zero() || self.search_cache_tti.is_zero() {
            anyhow::bail!("Cache expiry times must be greater than 0");
        }

        if self.cleanup_interval.is_zero() {
            anyhow::bail!("Cache cleanup interval must be greater than 0");
        }

        if self.worker_threads == 0 {
            anyhow::bail!("Worker threads must be greater than 0");
        }

        Ok(())
    }

    /// Cache policies derived from this configuration.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            songs: CachePolicy::SONGS
                .with_max_size(self.song_cache_size)
                .with_expire_after_access(self.song_cache_tti),
            searches: CachePolicy::SEARCHES
                .with_max_size(self.search_cache_size)
                .with_expire_after_access(self.search_cache_tti),
            cleanup_interval: Some(self.cleanup_interval),
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The API key is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            YouTube: {} (timeout {})\n  \
            Cache: {} songs / {} idle, {} searches / {} idle, sweep every {}\n  \
            Runtime: {} worker threads",
            self.api_base_url,
            humantime::format_duration(self.http_timeout),
            self.song_cache_size,
            humantime::format_duration(self.song_cache_tti),
            self.search_cache_size,
            humantime::format_duration(self.search_cache_tti),
            humantime::format_duration(self.cleanup_interval),
            self.worker_threads,
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("youtube_api_key", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .field("http_timeout", &self.http_timeout)
            .field("song_cache_size", &self.song_cache_size)
            .field("song_cache_tti", &self.song_cache_tti)
            .field("search_cache_size", &self.search_cache_size)
            .field("search_cache_tti", &self.search_cache_tti)
            .field("cleanup_interval", &self.cleanup_interval)
            .field("worker_threads", &self.worker_threads)
            .finish()
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // YouTube (no default key - must be provided)
            youtube_api_key: String::new(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            http_timeout: DEFAULT_TIMEOUT,

            // Cache defaults
            song_cache_size: CachePolicy::SONGS.max_size,
            song_cache_tti: CachePolicy::SONGS.expire_after_access,
            search_cache_size: CachePolicy::SEARCHES.max_size,
            search_cache_tti: CachePolicy::SEARCHES.expire_after_access,
            cleanup_interval: Duration::from_secs(300),

            // Runtime defaults
            worker_threads: num_cpus::get(),
        }
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {}", name, val)),
        _ => Ok(default),
    }
}

/// Reads a humantime duration such as `30m` or `1h 30m`.
fn env_duration(name: &str, default: Duration) -> Result<Duration> {
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => humantime::parse_duration(val.trim())
            .with_context(|| format!("invalid duration for {}: {}", name, val)),
        _ => Ok(default),
    }
}
