//! EmaPuppy driver - preload, press and inspect the media cache

mod app;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use emacache::{CacheConfig, Catalog, RemoteCounter};
use tracing::info;

use crate::app::{open_store, App};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./data")]
    data: PathBuf,

    /// Directory bundled assets are resolved against
    #[arg(short, long, default_value = "./public")]
    assets: PathBuf,

    /// Storage quota in characters
    #[arg(short, long, default_value_t = emastore::DEFAULT_QUOTA)]
    quota: usize,

    /// Catalog JSON file (built-in catalog when omitted)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Cache settings JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and cache every image and clip in the catalog
    Preload,

    /// Press the puppy once
    Click {
        /// Also bump the shared remote counter
        #[arg(long)]
        remote: bool,
    },

    /// Show the click count
    Count {
        /// Show the shared remote count instead
        #[arg(long)]
        remote: bool,
    },

    /// Choose which clips can play
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Inspect or clean the media cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// List clips and whether each is enabled
    List,
    /// Enable a clip
    Enable { name: String },
    /// Disable a clip (the last enabled clip stays enabled)
    Disable { name: String },
    /// Enable every clip
    Reset,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Entry counts and settings
    Stats,
    /// Drop the oldest entries, or only expired ones
    Clean {
        /// Share of entries to drop
        #[arg(long, default_value_t = 0.5)]
        fraction: f64,
        /// Drop expired entries only
        #[arg(long)]
        expired: bool,
    },
    /// Drop every cached entry
    Clear,
    /// Show the cached record for a source URL
    Show { url: String },
}

fn load_config(path: Option<&PathBuf>) -> Result<CacheConfig> {
    let Some(path) = path else {
        return Ok(CacheConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading cache config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing cache config {}", path.display()))
}

fn load_catalog(path: Option<&PathBuf>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_json_file(path)
            .with_context(|| format!("loading catalog {}", path.display())),
        None => Ok(Catalog::builtin()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("EmaPuppy driver v{}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", args.data.display());

    let config = load_config(args.config.as_ref())?;
    let catalog = load_catalog(args.catalog.as_ref())?;
    let store = open_store(&args.data, args.quota);
    let app = App::new(store, catalog, &args.assets, config, RemoteCounter::default());

    let output = match args.command {
        Command::Preload => app.preload(&mut rand::thread_rng()).await,
        Command::Click { remote } => app.click(remote, &mut rand::thread_rng()).await,
        Command::Count { remote } => app.count(remote).await,
        Command::Settings { action } => match action {
            SettingsAction::List => app.settings_list(),
            SettingsAction::Enable { name } => app.settings_set(&name, true)?,
            SettingsAction::Disable { name } => app.settings_set(&name, false)?,
            SettingsAction::Reset => app.settings_reset(),
        },
        Command::Cache { action } => match action {
            CacheAction::Stats => app.cache_stats()?,
            CacheAction::Clean { fraction, expired } => app.cache_clean(fraction, expired)?,
            CacheAction::Clear => app.cache_clear(),
            CacheAction::Show { url } => app.cache_show(&url),
        },
    };

    println!("{}", output);
    Ok(())
}
