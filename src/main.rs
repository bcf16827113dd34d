use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use likedrive::commands;
use likedrive::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "likedrive",
    version,
    about = "Archive liked-tweet photos to Google Drive",
    long_about = "A CLI tool that fetches your liked tweets, downloads the attached photos and uploads them to a Google Drive folder"
)]
struct Cli {
    /// Directory where photos are staged before upload
    #[arg(short, long = "data-dir", env = "LIKEDRIVE_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch liked tweets, download their photos and upload them to Drive
    Sync {
        /// Maximum number of liked-tweets pages to fetch
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Fetch liked tweets and print a summary without uploading anything
    Likes {
        /// Maximum number of liked-tweets pages to fetch
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Run the Twitter OAuth flow and print the access token
    Auth,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let args = Cli::parse();

    if args.verbose {
        debug!("Verbose mode enabled");
    }

    match args.command {
        Commands::Sync { max_pages } => {
            let mut config = Config::from_env()?;
            if let Some(pages) = max_pages {
                config.max_pages = pages;
            }

            let data_dir = args.data_dir.context(
                "Data directory not specified. Please set --data-dir or LIKEDRIVE_DATA_DIR environment variable",
            )?;
            if !data_dir.exists() {
                std::fs::create_dir_all(&data_dir).context("Failed to create data directory")?;
                info!("Created data directory: {path}", path = data_dir.display());
            }

            commands::sync::execute(&config, &data_dir).await?
        }
        Commands::Likes { max_pages } => {
            let mut config = Config::twitter_only_from_env()?;
            if let Some(pages) = max_pages {
                config.max_pages = pages;
            }
            commands::likes::execute(&config).await?
        }
        Commands::Auth => {
            let config = Config::twitter_only_from_env()?;
            commands::auth::execute(&config).await?
        }
    }

    Ok(())
}
