use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use clap::Parser;
use reqwest::Client;
use spotify_stats::auth::TokenManager;
use spotify_stats::config::{Config, PublisherConfig};
use spotify_stats::history::EventLog;
use spotify_stats::publisher::{LogPublisher, PocketBasePublisher, StatsPublisher};
use spotify_stats::spotify::{SpotifyClient, TimeRange, DEFAULT_TOP_LIMIT};
use spotify_stats::{publish_report, ListeningReport};

#[derive(Parser)]
#[command(name = "update_stats")]
#[command(about = "Compute listening stats and push them to PocketBase", long_about = None)]
struct Cli {
    /// Year for the yearly breakdowns (defaults to last year)
    #[arg(short, long)]
    year: Option<i32>,

    /// Time range for top tracks and artists
    #[arg(long, default_value = "short_term")]
    time_range: TimeRange,

    /// Number of top tracks and artists to publish
    #[arg(long, default_value_t = DEFAULT_TOP_LIMIT)]
    limit: u32,

    /// Log values instead of publishing them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("update_stats=info,spotify_stats=info")
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to read configuration")?;
    let client = Client::new();

    let year = cli
        .year
        .unwrap_or_else(|| Utc::now().with_timezone(&config.history.timezone).year() - 1);

    let log = EventLog::load_dir(&config.history.streaming_history_path, config.history.timezone)
        .context("Failed to load streaming history")?;

    let mut tokens = TokenManager::from_config(&config, client.clone());
    let token = tokens
        .get_access_token()
        .await
        .context("Failed to obtain a Spotify access token")?;

    tracing::info!("computing listening stats for {}", year);
    let mut report = ListeningReport::build(&log, year).context("Invalid --year")?;

    let spotify = SpotifyClient::new(client.clone());
    match spotify.top_tracks(&token, cli.time_range, cli.limit).await {
        Ok(tracks) => report = report.with_top_tracks(tracks),
        Err(e) => tracing::warn!("skipping top tracks: {}", e),
    }
    match spotify.top_artists(&token, cli.time_range, cli.limit).await {
        Ok(artists) => report = report.with_top_artists(artists),
        Err(e) => tracing::warn!("skipping top artists: {}", e),
    }

    let (sink, record_id): (Box<dyn StatsPublisher>, String) = if cli.dry_run {
        (Box::new(LogPublisher), "dry-run".to_string())
    } else {
        let publisher_config =
            PublisherConfig::from_env().context("Failed to read PocketBase configuration")?;
        let pocketbase = PocketBasePublisher::connect(client, &publisher_config)
            .await
            .context("Failed to connect to PocketBase")?;
        let record_id = pocketbase.record_id().to_string();
        (Box::new(pocketbase), record_id)
    };

    publish_report(sink.as_ref(), &record_id, &report)
        .await
        .context("Failed to publish listening stats")?;

    tracing::info!(
        "stats update complete: {} events, {} ms all time, {} ms in {}",
        log.len(),
        report.total_ms,
        report.year_total_ms,
        year
    );

    Ok(())
}
