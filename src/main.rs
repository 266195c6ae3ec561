//! Social Sentiment Pipeline
//!
//! Collects Reddit posts and YouTube comments, scores their sentiment and
//! stores every run in its own SQLite run-store.
//!
//! Usage:
//!   sentiment-pipeline run                               # r/datascience + "machine learning"
//!   sentiment-pipeline run --reddit rust --limit 100
//!   sentiment-pipeline run --youtube "rust async" --every 6
//!   sentiment-pipeline import posts.json                 # Process a JSON array of records
//!   sentiment-pipeline report                            # Report on the latest run-store
//!   sentiment-pipeline export --out dashboard.json
//!   sentiment-pipeline stores                            # List run-stores

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use social_sentiment::collect::{collect_or_empty, Collector, RedditCollector, YoutubeCollector};
use social_sentiment::pipeline::decode_inputs;
use social_sentiment::report::{StoreExport, StoreReport};
use social_sentiment::store::{latest_store, list_stores};
use social_sentiment::{Config, Pipeline, Platform, RawInput, RunStore, SentimentScorer};

const DEFAULT_SUBREDDIT: &str = "datascience";
const DEFAULT_YOUTUBE_QUERY: &str = "machine learning";

#[derive(Parser)]
#[command(name = "sentiment-pipeline", version, about = "Social media sentiment pipeline")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "config/settings.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Collect, score and store one batch (both platforms unless one is named)
    Run {
        /// Subreddit to collect hot posts from
        #[arg(long)]
        reddit: Option<String>,
        /// YouTube search term; comments come from the top matching video
        #[arg(long)]
        youtube: Option<String>,
        /// Items per platform (defaults to collector.default_limit)
        #[arg(long)]
        limit: Option<usize>,
        /// Write into this store instead of a fresh one
        #[arg(long)]
        store: Option<PathBuf>,
        /// Repeat every N hours (1 to 8760) until interrupted
        #[arg(long, value_name = "HOURS", value_parser = clap::value_parser!(u64).range(1..=8760))]
        every: Option<u64>,
    },
    /// Process a JSON array of raw records
    Import {
        file: PathBuf,
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Print the report of a run-store (latest by default)
    Report {
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Write a run-store as JSON for the dashboard
    Export {
        #[arg(long)]
        store: Option<PathBuf>,
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List run-stores, most recent first
    Stores,
}

/// One collector and the query it runs with.
struct Source {
    platform: Platform,
    query: String,
    collector: Option<Box<dyn Collector>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    info!("Loaded configuration");

    match cli.command {
        Command::Run {
            reddit,
            youtube,
            limit,
            store,
            every,
        } => {
            let limit = limit.unwrap_or(config.collector.default_limit);
            let sources = build_sources(&config, reddit, youtube)?;
            match every {
                Some(hours) => run_forever(&config, &sources, limit, store.as_deref(), hours).await,
                None => run_once(&config, &sources, limit, store.as_deref()).await,
            }
        }
        Command::Import { file, store } => run_import(&config, &file, store.as_deref()),
        Command::Report { store } => {
            let store = open_existing(&config, store)?;
            StoreReport::gather(&store).print();
            Ok(())
        }
        Command::Export { store, out } => run_export(&config, store, out.as_deref()),
        Command::Stores => {
            let stores = list_stores(&config.storage.store_dir)?;
            if stores.is_empty() {
                println!("No run-stores in {}", config.storage.store_dir.display());
            }
            for path in stores {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

fn build_sources(
    config: &Config,
    reddit: Option<String>,
    youtube: Option<String>,
) -> Result<Vec<Source>> {
    let (reddit, youtube) = match (reddit, youtube) {
        (None, None) => (
            Some(DEFAULT_SUBREDDIT.to_string()),
            Some(DEFAULT_YOUTUBE_QUERY.to_string()),
        ),
        named => named,
    };

    let mut sources = Vec::new();
    if let Some(query) = reddit {
        sources.push(Source {
            platform: Platform::Reddit,
            query,
            collector: Some(Box::new(RedditCollector::new(&config.collector)?)),
        });
    }
    if let Some(query) = youtube {
        let collector = match YoutubeCollector::new(&config.collector, &config.youtube) {
            Ok(c) => Some(Box::new(c) as Box<dyn Collector>),
            Err(e) => {
                warn!("YouTube collection disabled: {}", e);
                None
            }
        };
        sources.push(Source {
            platform: Platform::Youtube,
            query,
            collector,
        });
    }
    Ok(sources)
}

/// Collect from every source, run the batch through the pipeline and log
/// each collection action.
async fn run_once(
    config: &Config,
    sources: &[Source],
    limit: usize,
    store_path: Option<&Path>,
) -> Result<()> {
    let mut batch: Vec<RawInput> = Vec::new();
    let mut collected = Vec::with_capacity(sources.len());
    for source in sources {
        let items = match &source.collector {
            Some(collector) => collect_or_empty(collector.as_ref(), &source.query, limit).await,
            None => Vec::new(),
        };
        collected.push((source.platform, source.query.as_str(), items.len()));
        batch.extend(items);
    }

    let mut store = match store_path {
        Some(path) => RunStore::open(path)?,
        None => RunStore::create_in(&config.storage.store_dir)?,
    };

    let pipeline = Pipeline::new(SentimentScorer::vader(), config.pipeline.min_text_len);
    let report = pipeline.run(&mut store, batch)?;
    info!(
        "Batch done: {} received, {} stored, {} rejected, {} duplicates, {} too short, {} unscored",
        report.received,
        report.stored,
        report.rejected_input,
        report.duplicates,
        report.too_short,
        report.scoring_failures
    );

    for (platform, query, count) in collected {
        store.log_session(platform, query, count)?;
    }

    StoreReport::gather(&store).print();
    Ok(())
}

async fn run_forever(
    config: &Config,
    sources: &[Source],
    limit: usize,
    store_path: Option<&Path>,
    hours: u64,
) -> Result<()> {
    let period = Duration::from_secs(hours * 60 * 60);
    let mut interval = tokio::time::interval(period);

    info!("Running every {} hour(s)", hours);
    loop {
        interval.tick().await;
        if let Err(e) = run_once(config, sources, limit, store_path).await {
            warn!("Run failed: {:#}", e);
        }
    }
}

fn run_import(config: &Config, file: &Path, store_path: Option<&Path>) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let decoded = decode_inputs(&content)
        .with_context(|| format!("{} is not a JSON array", file.display()))?;
    info!(
        "Importing {} records from {} ({} undecodable)",
        decoded.inputs.len(),
        file.display(),
        decoded.undecodable
    );

    let mut store = match store_path {
        Some(path) => RunStore::open(path)?,
        None => RunStore::create_in(&config.storage.store_dir)?,
    };

    let pipeline = Pipeline::new(SentimentScorer::vader(), config.pipeline.min_text_len);
    let report = pipeline.run_decoded(&mut store, decoded)?;
    info!(
        "Imported {} new of {} records into {}",
        report.stored,
        report.received,
        store.path().display()
    );

    StoreReport::gather(&store).print();
    Ok(())
}

fn run_export(config: &Config, store: Option<PathBuf>, out: Option<&Path>) -> Result<()> {
    let store = open_existing(config, store)?;
    let json = serde_json::to_string_pretty(&StoreExport::gather(&store))?;

    match out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("Exported {} to {}", store.path().display(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// The named store, or the latest one in the configured directory.
fn open_existing(config: &Config, store: Option<PathBuf>) -> Result<RunStore> {
    let path = match store {
        Some(path) => path,
        None => latest_store(&config.storage.store_dir)?.with_context(|| {
            format!("no run-stores in {}", config.storage.store_dir.display())
        })?,
    };
    if !path.exists() {
        bail!("run-store {} does not exist", path.display());
    }
    Ok(RunStore::open(&path)?)
}
