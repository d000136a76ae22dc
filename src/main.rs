mod config;
mod export;
mod filter;
mod images;
mod model;
mod platform;
mod reddit;
mod render;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;

use config::{Config, ConfigArgs, DEFAULT_LIMIT, DEFAULT_SUBREDDIT};
use export::{ExportOutcome, ExportTarget};
use images::ImageFetcher;
use reddit::RedditClient;

#[derive(Parser)]
#[command(name = "rd2md", about = "Scrape reddit posts into a single markdown file")]
struct Cli {
    /// Reddit API client ID (falls back to REDDIT_CLIENT_ID)
    #[arg(long = "client_id")]
    client_id: Option<String>,
    /// Reddit API client secret (falls back to REDDIT_CLIENT_SECRET)
    #[arg(long = "client_secret")]
    client_secret: Option<String>,
    /// User agent for Reddit API (falls back to REDDIT_USER_AGENT, then "praw_bot")
    #[arg(long = "user_agent")]
    user_agent: Option<String>,
    /// Subreddit to scrape
    #[arg(long, default_value = DEFAULT_SUBREDDIT)]
    subreddit: String,
    /// Number of posts to scrape
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,
    /// Directory the dated export folder is created in
    #[arg(long = "out_dir", default_value = ".")]
    out_dir: PathBuf,
}

impl From<Cli> for ConfigArgs {
    fn from(cli: Cli) -> Self {
        ConfigArgs {
            client_id: cli.client_id,
            client_secret: cli.client_secret,
            user_agent: cli.user_agent,
            subreddit: cli.subreddit,
            limit: cli.limit,
            out_dir: cli.out_dir,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = Config::from_process_env(cli.into())?;

    let reddit = RedditClient::connect(&config.credentials)
        .await
        .context("Failed to authenticate with Reddit")?;
    let images = ImageFetcher::new(reqwest::Client::new());
    let target = ExportTarget {
        out_dir: &config.out_dir,
        date: chrono::Local::now().date_naive(),
    };

    let outcome =
        export::save_to_markdown(&reddit, &images, &config.subreddit, config.limit, &target).await?;
    match outcome {
        ExportOutcome::Written(path) => println!("Saved interesting posts to {}", path.display()),
        ExportOutcome::NoneFound => println!("No interesting posts found."),
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
