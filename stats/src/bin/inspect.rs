use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use reqwest::Client;
use spotify_stats::auth::TokenManager;
use spotify_stats::config::{Config, HistoryConfig};
use spotify_stats::history::EventLog;
use spotify_stats::listening;
use spotify_stats::models::DateRange;
use spotify_stats::spotify::SpotifyClient;

#[derive(Parser)]
#[command(name = "inspect")]
#[command(about = "streaming history inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RangeArgs {
    /// First local date to include (YYYY-MM-DD); needs --to as well
    #[arg(long)]
    from: Option<String>,

    /// Last local date to include (YYYY-MM-DD); needs --from as well
    #[arg(long)]
    to: Option<String>,
}

impl RangeArgs {
    fn range(&self) -> Result<DateRange> {
        let range = DateRange::parse(self.from.as_deref(), self.to.as_deref())?;
        if range.bounds().is_none() && (range.start.is_some() || range.end.is_some()) {
            eprintln!("note: both --from and --to are needed to filter, showing all time");
        }
        Ok(range)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Total listening time
    Total(RangeArgs),

    /// Average listening time per day
    Average(RangeArgs),

    /// Listening time per month
    Months {
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Listening time per hour of day
    Hours {
        #[command(flatten)]
        range: RangeArgs,

        /// Print all 24 hours, including those without plays
        #[arg(long)]
        dense: bool,
    },

    /// Listening time for artists whose name starts with NAME
    Artist {
        name: String,

        #[command(flatten)]
        range: RangeArgs,

        /// Also look the artist up on Spotify
        #[arg(long)]
        lookup: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter("inspect=info,spotify_stats=info")
        .init();

    let cli = Cli::parse();
    let history = HistoryConfig::from_env().context("Failed to read configuration")?;
    let log = EventLog::load_dir(&history.streaming_history_path, history.timezone)
        .context("Failed to load streaming history")?;

    match cli.command {
        Commands::Total(args) => {
            let ms = listening::total_listening(&log, args.range()?);
            println!("total: {} ms ({:.1} hours)", ms, ms as f64 / 3_600_000.0);
        }
        Commands::Average(args) => {
            let ms = listening::average_listening(&log, args.range()?);
            println!("average: {:.0} ms/day ({:.1} minutes)", ms, ms / 60_000.0);
        }
        Commands::Months { year } => {
            let months = listening::listening_by_month(&log, year);
            if months.is_empty() {
                println!("no plays found");
            }
            for (month_end, ms) in months {
                println!("  {}  {:>12} ms", month_end, ms);
            }
        }
        Commands::Hours { range, dense } => {
            let range = range.range()?;
            if dense {
                for (hour, ms) in listening::listening_clock(&log, range).iter().enumerate() {
                    println!("  {:02}:00  {:>12} ms", hour, ms);
                }
            } else {
                for (hour, ms) in listening::listening_by_hour(&log, range) {
                    println!("  {:02}:00  {:>12} ms", hour, ms);
                }
            }
        }
        Commands::Artist {
            name,
            range,
            lookup,
        } => {
            let ms = listening::artist_listening_time(&log, &name, range.range()?);
            println!("{}: {} ms ({:.1} hours)", name, ms, ms as f64 / 3_600_000.0);

            if lookup {
                let config =
                    Config::from_env().context("Spotify credentials are needed for --lookup")?;
                show_artist(&config, &name).await?;
            }
        }
    }

    Ok(())
}

async fn show_artist(config: &Config, name: &str) -> Result<()> {
    let client = Client::new();
    let mut tokens = TokenManager::from_config(config, client.clone());
    let token = tokens
        .get_access_token()
        .await
        .context("Failed to obtain a Spotify access token")?;

    match SpotifyClient::new(client).search_artist(&token, name).await? {
        Some(artist) => println!("{}", serde_json::to_string_pretty(&artist)?),
        None => println!("no spotify artist found for {}", name),
    }

    Ok(())
}
