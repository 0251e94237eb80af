//! Lumens Ingestion CLI
//! Harvests curated video channels and playlists into the content catalog
//!
//! Features:
//! - Channel resolution with a persisted reference cache
//! - Quota-aware paging (uploads collection first, search fallback)
//! - Cross-source deduplication
//! - Incremental runs via per-channel watermarks
//! - Duration, stats, language and audience-flag enrichment
//! - NDJSON/text artifacts plus filesystem or Postgres document sinks
//! - Prometheus textfile metrics

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn, Instrument};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use lumens_ingest::checkpoint::CheckpointManager;
use lumens_ingest::harvester::SourceOutcome;
use lumens_ingest::ingest::{run_ingest, run_resolve, IngestSummary};
use lumens_ingest::{Config, IngestionError};

/// Lumens Ingestion - curated video catalog harvesting
#[derive(Parser, Debug)]
#[command(name = "lumens-ingest")]
#[command(author = "Lumens Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Ingest the latest videos for curated channels and playlists")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,

    /// Upstream API key (overrides LUMENS_YT_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Path to the curated sources CSV
    #[arg(long, global = true)]
    channels: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Harvest, enrich and store the latest videos
    Ingest {
        /// Output prefix (writes .ndjson and .txt)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Maximum videos per source
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Skip the details lookup to save quota
        #[arg(long)]
        no_enrich: bool,

        /// Ignore watermarks and fetch up to the limit
        #[arg(long)]
        full: bool,

        /// Storage sink (none, filesystem, postgres)
        #[arg(long)]
        sink: Option<String>,

        /// Collection the sink writes to
        #[arg(long)]
        collection: Option<String>,
    },

    /// Resolve channel references and persist the channel map
    Resolve,

    /// Show watermarks and the channel map
    Status,

    /// Reset watermarks
    Reset {
        /// Channel id to reset
        #[arg(short, long, conflicts_with = "all")]
        channel: Option<String>,

        /// Reset every channel
        #[arg(long)]
        all: bool,
    },
}

/// Generates a new correlation ID for the session
fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs);

    let correlation_id = generate_correlation_id();
    let span = tracing::info_span!("session", correlation_id = %correlation_id);

    match run(cli).instrument(span).await {
        Err(e) if matches!(e.downcast_ref::<IngestionError>(), Some(IngestionError::MissingApiKey)) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(2);
        }
        other => other,
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Starting Lumens ingestion");

    let mut config = Config::load()?;
    if let Some(api_key) = cli.api_key {
        config.yt_api_key = Some(api_key);
    }
    if let Some(channels) = cli.channels {
        config.channels_csv = channels;
    }

    match cli.command {
        Commands::Ingest {
            out,
            limit,
            no_enrich,
            full,
            sink,
            collection,
        } => {
            if let Some(out) = out {
                config.out_prefix = out;
            }
            if let Some(limit) = limit {
                config.limit_per_source = limit;
            }
            if no_enrich {
                config.enrich = false;
            }
            if full {
                config.incremental = false;
            }
            if let Some(sink) = sink {
                config.sink_type = sink;
            }
            if let Some(collection) = collection {
                config.collection = collection;
            }
            config.validate()?;
            ingest(&config).await
        }
        Commands::Resolve => {
            config.validate()?;
            resolve(&config).await
        }
        Commands::Status => show_status(&config).await,
        Commands::Reset { channel, all } => reset_watermark(&config, channel.as_deref(), all).await,
    }
}

async fn ingest(config: &Config) -> Result<()> {
    info!(
        channels = %config.channels_csv.display(),
        limit = config.limit_per_source,
        enrich = config.enrich,
        incremental = config.incremental,
        sink = %config.sink_type,
        "Configuration loaded"
    );

    let summary = run_ingest(config).await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &IngestSummary) {
    let Some(output) = &summary.output else {
        println!("No sources found");
        return;
    };

    println!(
        "Wrote {} records → {} and {}",
        output.count,
        output.ndjson_path.display(),
        output.text_path.display()
    );

    for report in &summary.sources {
        match &report.outcome {
            SourceOutcome::Ingested { new_records, .. } => {
                println!("  ✅ {}: {} new", report.name, new_records)
            }
            SourceOutcome::Skipped { reason } => println!("  ⏭  {}: skipped ({})", report.name, reason),
            SourceOutcome::Failed { error, .. } => println!("  ❌ {}: failed ({})", report.name, error),
        }
    }

    if let Some(stored) = summary.stored {
        println!("Stored {} documents", stored);
    }
    if let Some(error) = &summary.sink_error {
        println!("⚠️  Storage failed: {}", error);
    }
    if !summary.watermark_saved {
        println!("⚠️  Watermark not saved");
    }
    println!(
        "Quota: {} units over {} calls",
        summary.quota.total_units(),
        summary.quota.total_calls()
    );
}

async fn resolve(config: &Config) -> Result<()> {
    let map = run_resolve(config).await?;
    println!(
        "Resolved {} references → {}",
        map.len(),
        config.state_dir.join("channel_map.json").display()
    );
    Ok(())
}

/// Shows persisted state
async fn show_status(config: &Config) -> Result<()> {
    let checkpoint = CheckpointManager::with_dir(&config.state_dir);

    println!("\n📡 Lumens Ingestion Status");
    println!("==========================\n");

    println!("API key:  {}", if config.api_key().is_ok() { "✅" } else { "❌ (not set)" });
    println!("Sources:  {}", config.channels_csv.display());
    println!("State:    {}", config.state_dir.display());
    println!("Sink:     {}", config.sink_type);

    println!("\nWatermarks:");
    match checkpoint.load_watermark().await {
        Ok(watermark) if watermark.is_empty() => println!("  No watermarks yet"),
        Ok(watermark) => {
            for (channel_id, video_id) in watermark.iter() {
                println!("  - {}: {}", channel_id, video_id);
            }
        }
        Err(e) => println!("  ❌ {}", e),
    }

    let cache = checkpoint.load_channel_cache().await;
    println!("\nChannel map: {} entries", cache.len());

    Ok(())
}

/// Resets watermarks for one channel or all of them
async fn reset_watermark(config: &Config, channel: Option<&str>, all: bool) -> Result<()> {
    let checkpoint = CheckpointManager::with_dir(&config.state_dir);

    match (channel, all) {
        (_, true) => {
            checkpoint.reset_watermark(None).await?;
            println!("✅ Reset all watermarks");
        }
        (Some(channel_id), false) => {
            if checkpoint.reset_watermark(Some(channel_id)).await? {
                println!("✅ Reset watermark for channel: {}", channel_id);
            } else {
                warn!(channel_id = %channel_id, "No watermark for channel");
                println!("No watermark for channel: {}", channel_id);
            }
        }
        (None, false) => anyhow::bail!("pass --channel <id> or --all"),
    }
    Ok(())
}
