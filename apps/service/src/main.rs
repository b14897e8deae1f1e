use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use logger::LogFormat;
use sentinel_service::{Config, Orchestrator, pool::open_pool};
use tracing::{info, level_filters::LevelFilter, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP(S) uptime monitor with webhook alerts", long_about = None)]
struct Args {
    /// Config file, created with defaults when missing
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overrides the config value
    #[arg(short, long, env = "SENTINEL_DB_PATH")]
    database: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut config = Config::from_config(args.config.as_ref()).context("failed to load configuration")?;
    if let Some(path) = args.database {
        config.database.path = path;
    }

    if args.print_config {
        print!("{config}");
        return Ok(());
    }

    let level = config.logging.level.parse::<LevelFilter>().map_err(|e| e.to_string());
    let format = config.logging.format.parse::<LogFormat>();
    logger::init_with(
        level.as_ref().copied().unwrap_or(LevelFilter::INFO),
        format.as_ref().copied().unwrap_or_default(),
    );

    if let Err(e) = &level {
        warn!("Invalid log level '{}', using info: {}", config.logging.level, e);
    }
    if let Err(e) = &format {
        warn!("{}, using compact", e);
    }

    info!("Starting sentinel v{}", env!("CARGO_PKG_VERSION"));
    info!("{}", config);

    let pool = open_pool(&config.database.path, config.database.pool_size)
        .await
        .with_context(|| format!("failed to open database at {}", config.database.path))?;

    Orchestrator::start(config, pool).await
}
