use anyhow::Result;
use clap::Parser;
use hitbloq_api::endpoints::{Difficulty, LevelKey};
use hitbloq_config::Settings;
use std::time::Duration;

use hitbloq_sync::state::LeaderboardSource;
use hitbloq_sync::{App, RunOptions};

/// Show the Hitbloq pools, rank and leaderboard of one level
#[derive(Parser, Debug)]
#[command(name = "hitbloq-sync", version, about)]
struct Cli {
    /// Song hash of the level
    hash: String,

    #[arg(short, long, default_value = "ExpertPlus")]
    difficulty: Difficulty,

    #[arg(short, long, default_value = "Standard")]
    characteristic: String,

    /// Pool to show the rank for (defaults to the first pool of the level)
    #[arg(short, long)]
    pool: Option<String>,

    /// Leaderboard to show: global, around-me or friends
    #[arg(short, long, default_value = "global")]
    source: LeaderboardSource,

    /// Leaderboard page, starting at 0
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Keep running and refresh periodically
    #[arg(short, long)]
    watch: bool,

    /// Seconds between refreshes in watch mode
    #[arg(long, default_value_t = 60)]
    interval: u64,

    /// Config file (defaults to $HITBLOQ_CONFIG or config.toml)
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::new()?,
    };
    settings.validate()?;

    let options = RunOptions {
        level: LevelKey::new(cli.hash, cli.difficulty, cli.characteristic),
        pool: cli.pool,
        source: cli.source,
        page: cli.page,
        watch: cli.watch,
        interval: Duration::from_secs(cli.interval.max(1)),
    };

    // Logging is initialized in App::run()
    App::new(settings).run(options).await?;

    Ok(())
}
