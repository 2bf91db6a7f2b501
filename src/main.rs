use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use youtube_provider::{
    CatalogClient, Config, Song, WatchUrlPlaybackFactory, YouTubeAPIv3Client, YouTubeProvider,
};

type Provider = YouTubeProvider<YouTubeAPIv3Client, WatchUrlPlaybackFactory>;

#[derive(Parser)]
#[command(name = "youtube-provider")]
#[command(author, version, about = "Search YouTube or resolve a video id into a song", long_about = None)]
struct Cli {
    /// Skip this many results of the first page
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Resolve a single video id instead of searching
    #[arg(long, value_name = "VIDEO_ID", conflicts_with = "query")]
    lookup: Option<String>,

    /// Free-text search query
    #[arg(required_unless_present = "lookup")]
    query: Vec<String>,
}

enum Command {
    Search { query: String, offset: usize },
    Lookup { id: String },
}

impl From<Cli> for Command {
    fn from(cli: Cli) -> Self {
        match cli.lookup {
            Some(id) => Command::Lookup { id },
            None => Command::Search {
                query: cli.query.join(" "),
                offset: cli.offset,
            },
        }
    }
}

#[derive(Serialize)]
struct LookupOutput {
    song: Song,
    playback_url: String,
}

fn main() -> Result<()> {
    let command = Command::from(Cli::parse());

    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("youtube_provider=debug".parse()?)
                .add_directive("reqwest=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("🎵 Iniciando youtube-provider v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(run(config, command))
}

async fn run(config: Config, command: Command) -> Result<()> {
    let catalog = Arc::new(YouTubeAPIv3Client::with_options(
        config.youtube_api_key.clone(),
        &config.api_base_url,
        config.http_timeout,
    )?);
    info!("🔍 Catálogo: {}", catalog.source_name());

    let provider = YouTubeProvider::new(
        catalog,
        Arc::new(WatchUrlPlaybackFactory),
        config.provider_config(),
    );

    let outcome = tokio::select! {
        result = execute(&provider, command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("⚠️ Señal de interrupción recibida");
            Ok(())
        }
    };

    let stats = provider.cache_stats();
    for cache in [stats.songs, stats.searches] {
        info!(
            "📊 {} cache: {}/{} entries, {} loads ({} failed), {:.0}% hits",
            cache.name,
            cache.entries,
            cache.max_size,
            cache.loads,
            cache.load_failures,
            cache.metrics.hit_rate() * 100.0
        );
    }

    provider.shutdown();

    if let Err(e) = &outcome {
        error!("❌ {:#}", e);
    }
    outcome
}

async fn execute(provider: &Provider, command: Command) -> Result<()> {
    match command {
        Command::Search { query, offset } => {
            let songs = provider.search(&query, offset).await;
            info!("✅ {} songs for '{}'", songs.len(), query);
            println!("{}", serde_json::to_string_pretty(&songs)?);
        }
        Command::Lookup { id } => {
            let song = provider.lookup(&id).await?;
            let resource = provider.load_song(&song).await?;
            let playback = provider.supply_playback(&song, resource).await?;
            let output = LookupOutput {
                playback_url: playback.url().to_string(),
                song,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}
